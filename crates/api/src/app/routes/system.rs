use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use eafoods_preorders::ActorKind;

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    let kind = match principal.actor().kind {
        ActorKind::Customer => "customer",
        ActorKind::Staff => "staff",
    };
    Json(serde_json::json!({
        "user_id": principal.user_id().to_string(),
        "kind": kind,
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
    }))
}
