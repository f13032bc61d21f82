use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};

use eafoods_auth::Permission;
use eafoods_infra::{NewPreorder, ProductMatch, Services, Store};
use eafoods_preorders::{PreorderId, SlotId};
use eafoods_products::ProductId;

use crate::app::routes::common::{guard, json_body, parse_id, CmdAuth};
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub async fn create_preorder<S: Store + Clone>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<dto::CreatePreorderRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match json_body(payload) {
        Ok(body) => body,
        Err(res) => return res,
    };
    let body = match guard(&principal, CmdAuth::new(body, Permission::PREORDERS_CREATE)) {
        Ok(body) => body,
        Err(res) => return res,
    };
    let now = Utc::now();

    let product_id = match resolve_product(&services, &body).await {
        Ok(id) => id,
        Err(res) => return res,
    };
    let quantity = match parse_quantity(body.quantity.as_ref()) {
        Ok(q) => q,
        Err(res) => return res,
    };
    let slot_id = match resolve_slot(&services, &body, now).await {
        Ok(id) => id,
        Err(res) => return res,
    };

    let input = NewPreorder {
        customer_id: principal.user_id(),
        product_id,
        slot_id,
        quantity,
        delivery_address: body.delivery_address,
    };
    match services.preorders.create_preorder(input, now).await {
        Ok(preorder) => {
            (StatusCode::CREATED, Json(dto::preorder_to_json(&preorder))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Integer or numeric string. A missing quantity is 0 and fails the positivity check later.
fn parse_quantity(raw: Option<&serde_json::Value>) -> Result<i64, axum::response::Response> {
    let parsed = match raw {
        None | Some(serde_json::Value::Null) => Some(0),
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        Some(_) => None,
    };
    parsed.ok_or_else(|| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "quantity must be a valid number",
        )
    })
}

/// Product by id, or by name with 300 and suggestions when the name is ambiguous.
async fn resolve_product<S: Store + Clone>(
    services: &Services<S>,
    body: &dto::CreatePreorderRequest,
) -> Result<ProductId, axum::response::Response> {
    if let Some(id) = &body.product_id {
        return parse_id(id);
    }
    let Some(name) = &body.product_name else {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "product_id or product_name is required",
        ));
    };

    match services.ledger.find_product_by_name(name).await {
        Ok(ProductMatch::Exact(product)) => Ok(product.id),
        Ok(ProductMatch::Suggestions(candidates)) => Err((
            StatusCode::MULTIPLE_CHOICES,
            Json(serde_json::json!({
                "error": "ambiguous_product",
                "message": format!("no exact match for '{}'", name.trim()),
                "suggestions": candidates.iter().map(dto::product_ref_to_json).collect::<Vec<_>>(),
            })),
        )
            .into_response()),
        Err(e) => Err(errors::service_error_to_response(e)),
    }
}

async fn resolve_slot<S: Store + Clone>(
    services: &Services<S>,
    body: &dto::CreatePreorderRequest,
    now: DateTime<Utc>,
) -> Result<SlotId, axum::response::Response> {
    if let Some(id) = &body.slot_id {
        return parse_id(id);
    }
    let Some(label) = &body.slot else {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "slot_id or slot is required",
        ));
    };

    services
        .preorders
        .resolve_slot(label, now)
        .await
        .map(|slot| slot.id_typed())
        .map_err(errors::service_error_to_response)
}

pub async fn get_preorder<S: Store + Clone>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let preorder_id: PreorderId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .preorders
        .get_preorder(preorder_id, principal.actor())
        .await
    {
        Ok(p) => (StatusCode::OK, Json(dto::preorder_to_json(&p))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn preorder_history<S: Store + Clone>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let preorder_id: PreorderId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .preorders
        .preorder_history(preorder_id, principal.actor())
        .await
    {
        Ok(history) => {
            let items = history.iter().map(dto::history_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn confirm_preorder<S: Store + Clone>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let preorder_id: PreorderId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let preorder_id = match guard(&principal, CmdAuth::new(preorder_id, Permission::PREORDERS_CONFIRM)) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .preorders
        .confirm_preorder(preorder_id, principal.actor(), Utc::now())
        .await
    {
        Ok(p) => (StatusCode::OK, Json(dto::preorder_to_json(&p))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn cancel_preorder<S: Store + Clone>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let preorder_id: PreorderId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let preorder_id = match guard(&principal, CmdAuth::new(preorder_id, Permission::PREORDERS_CANCEL)) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .preorders
        .cancel_preorder(preorder_id, principal.actor(), Utc::now())
        .await
    {
        Ok(p) => (StatusCode::OK, Json(dto::preorder_to_json(&p))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
