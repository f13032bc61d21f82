use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use eafoods_auth::Permission;
use eafoods_infra::{NewProduct, Services, Store};
use eafoods_products::ProductId;

use crate::app::routes::common::{guard, parse_id, CmdAuth};
use crate::app::{dto, errors};
use crate::context::PrincipalContext;

pub async fn list_products<S: Store + Clone>(
    Extension(services): Extension<Arc<Services<S>>>,
) -> axum::response::Response {
    match services.ledger.list_products().await {
        Ok(products) => {
            let items = products.iter().map(dto::product_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_product<S: Store + Clone>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let input = NewProduct {
        name: body.name,
        description: body.description,
        unit_price: body.unit_price,
        initial_stock: body.initial_stock,
    };
    let input = match guard(&principal, CmdAuth::new(input, Permission::PRODUCTS_CREATE)) {
        Ok(input) => input,
        Err(res) => return res,
    };

    match services.ledger.register_product(input, Utc::now()).await {
        Ok(product) => (StatusCode::CREATED, Json(dto::product_to_json(&product))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_stock<S: Store + Clone>(
    Extension(services): Extension<Arc<Services<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.ledger.stock_level(product_id).await {
        Ok(level) => (StatusCode::OK, Json(dto::stock_level_to_json(&level))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_stock<S: Store + Clone>(
    Extension(services): Extension<Arc<Services<S>>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateStockRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match parse_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let quantity = match guard(&principal, CmdAuth::new(body.quantity, Permission::STOCK_UPDATE)) {
        Ok(q) => q,
        Err(res) => return res,
    };

    match services
        .ledger
        .update_stock(product_id, quantity, Utc::now())
        .await
    {
        Ok(product) => (StatusCode::OK, Json(dto::product_to_json(&product))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
