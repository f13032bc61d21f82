use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use eafoods_auth::Permission;
use eafoods_infra::{Services, Store};
use eafoods_preorders::SlotId;

use crate::app::routes::common::{guard, parse_id, CmdAuth};
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub async fn list_slot_labels<S: Store + Clone>(
    Extension(services): Extension<Arc<Services<S>>>,
) -> axum::response::Response {
    let items = services
        .preorders
        .slot_labels()
        .into_iter()
        .map(dto::slot_label_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// Slot for a label on the delivery date the current time implies.
pub async fn resolve_slot<S: Store + Clone>(
    Extension(services): Extension<Arc<Services<S>>>,
    Json(body): Json<dto::ResolveSlotRequest>,
) -> axum::response::Response {
    match services.preorders.resolve_slot(&body.label, Utc::now()).await {
        Ok(slot) => (StatusCode::OK, Json(dto::slot_to_json(&slot))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_slot_preorders<S: Store + Clone>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::SlotPreordersQuery>,
) -> axum::response::Response {
    let slot_id: SlotId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let slot_id = match guard(&principal, CmdAuth::new(slot_id, Permission::SLOTS_LIST)) {
        Ok(v) => v,
        Err(res) => return res,
    };

    let slot = match services.preorders.get_slot(slot_id).await {
        Ok(slot) => slot,
        Err(e) => return errors::service_error_to_response(e),
    };
    match services.preorders.list_by_slot(slot_id, query.include_cancelled).await {
        Ok(preorders) => {
            let items = preorders.iter().map(dto::preorder_to_json).collect::<Vec<_>>();
            (
                StatusCode::OK,
                Json(serde_json::json!({ "slot": dto::slot_to_json(&slot), "items": items })),
            )
                .into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
