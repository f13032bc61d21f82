use axum::{
    Router,
    routing::{get, post, put},
};

use eafoods_infra::Store;

pub mod common;
pub mod preorders;
pub mod products;
pub mod reports;
pub mod slots;
pub mod system;

/// Endpoints reachable without a token.
pub fn public_router<S: Store + Clone>() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/products", get(products::list_products::<S>))
        .route("/slots", get(slots::list_slot_labels::<S>))
}

/// Endpoints that require a bearer token.
pub fn protected_router<S: Store + Clone>() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/products", post(products::create_product::<S>))
        .route(
            "/products/:id/stock",
            get(products::get_stock::<S>).put(products::update_stock::<S>),
        )
        .route("/slots/resolve", post(slots::resolve_slot::<S>))
        .route("/slots/:id/preorders", get(slots::list_slot_preorders::<S>))
        .route("/preorders", post(preorders::create_preorder::<S>))
        .route("/preorders/:id", get(preorders::get_preorder::<S>))
        .route("/preorders/:id/history", get(preorders::preorder_history::<S>))
        .route("/preorders/:id/confirm", post(preorders::confirm_preorder::<S>))
        .route("/preorders/:id/cancel", post(preorders::cancel_preorder::<S>))
        .route("/reports/top-products", get(reports::top_products::<S>))
}
