//! Product catalogue and stock quantities.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use eafoods_core::DomainError;
use eafoods_core::aggregate::execute;
use eafoods_preorders::Availability;
use eafoods_products::{
    Product, ProductCommand, ProductEvent, ProductId, ProductSnapshot, RegisterProduct,
    StockUpdateWindow, UpdateStock,
};

use super::{PRODUCT_AGGREGATE, record_history};
use crate::error::{ServiceError, ServiceResult};
use crate::store::{Store, Transaction};

/// Input of [`StockLedger::register_product`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub unit_price: u64,
    pub initial_stock: i64,
}

/// Result of a lookup by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductMatch {
    Exact(ProductSnapshot),
    /// No exact match; these names contain the query.
    Suggestions(Vec<ProductSnapshot>),
}

/// Stock plus what active preorders have already claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub stock: i64,
    pub reserved: i64,
    pub available: i64,
}

#[derive(Debug, Clone)]
pub struct StockLedger<S> {
    store: S,
    window: StockUpdateWindow,
}

impl<S: Store> StockLedger<S> {
    pub fn new(store: S, window: StockUpdateWindow) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> &StockUpdateWindow {
        &self.window
    }

    #[instrument(skip(self, input), fields(name = %input.name), err)]
    pub async fn register_product(
        &self,
        input: NewProduct,
        request_time: DateTime<Utc>,
    ) -> ServiceResult<ProductSnapshot> {
        let mut tx = self.store.begin().await?;

        if tx.product_by_name(&input.name).await?.is_some() {
            return Err(DomainError::conflict(format!(
                "product '{}' already exists",
                input.name.trim()
            ))
            .into());
        }

        let product_id = ProductId::generate();
        let mut product = Product::empty(product_id);
        let events = execute(
            &mut product,
            &ProductCommand::RegisterProduct(RegisterProduct {
                product_id,
                name: input.name,
                description: input.description,
                unit_price: input.unit_price,
                initial_stock: input.initial_stock,
                occurred_at: request_time,
            }),
        )?;

        let snapshot = persist(&mut tx, &product, &events).await?;
        tx.commit().await?;

        tracing::info!(product_id = %product_id, stock = snapshot.stock, "product registered");
        Ok(snapshot)
    }

    /// Replace the stock quantity of a product.
    ///
    /// The time window is checked first, so a request outside the window is
    /// rejected even if the product is unknown or the quantity is invalid.
    #[instrument(skip(self), err)]
    pub async fn update_stock(
        &self,
        product_id: ProductId,
        quantity: i64,
        request_time: DateTime<Utc>,
    ) -> ServiceResult<ProductSnapshot> {
        self.window.check(request_time)?;

        let mut tx = self.store.begin().await?;
        let current = tx
            .lock_product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))?;

        let mut product = Product::restore(current);
        let events = execute(
            &mut product,
            &ProductCommand::UpdateStock(UpdateStock {
                product_id,
                quantity,
                occurred_at: request_time,
            }),
        )?;

        let snapshot = persist(&mut tx, &product, &events).await?;
        tx.commit().await?;

        tracing::info!(product_id = %product_id, stock = quantity, "stock updated");
        Ok(snapshot)
    }

    pub async fn get_stock(&self, product_id: ProductId) -> ServiceResult<i64> {
        Ok(self.get_product(product_id).await?.stock)
    }

    pub async fn get_product(&self, product_id: ProductId) -> ServiceResult<ProductSnapshot> {
        let mut tx = self.store.begin().await?;
        tx.product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")).into())
    }

    /// Stock together with the derived availability.
    pub async fn stock_level(&self, product_id: ProductId) -> ServiceResult<StockLevel> {
        let mut tx = self.store.begin().await?;
        let product = tx
            .product(product_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("product {product_id}")))?;
        let preorders = tx.preorders_for_product(product_id).await?;
        let availability = Availability::from_preorders(product.stock, &preorders);

        Ok(StockLevel {
            product_id,
            stock: availability.stock,
            reserved: availability.reserved,
            available: availability.available(),
        })
    }

    pub async fn list_products(&self) -> ServiceResult<Vec<ProductSnapshot>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.products().await?)
    }

    /// Exact case-insensitive match, otherwise substring suggestions.
    pub async fn find_product_by_name(&self, name: &str) -> ServiceResult<ProductMatch> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("product name cannot be empty").into());
        }

        let mut tx = self.store.begin().await?;
        if let Some(product) = tx.product_by_name(name).await? {
            return Ok(ProductMatch::Exact(product));
        }

        let suggestions = tx.products_matching(name).await?;
        if suggestions.is_empty() {
            return Err(DomainError::not_found(format!("product '{name}'")).into());
        }
        Ok(ProductMatch::Suggestions(suggestions))
    }
}

async fn persist<T: Transaction>(
    tx: &mut T,
    product: &Product,
    events: &[ProductEvent],
) -> ServiceResult<ProductSnapshot> {
    let snapshot = product
        .snapshot()
        .ok_or_else(|| ServiceError::from(DomainError::not_found("product")))?;
    tx.save_product(&snapshot).await?;
    record_history(
        tx,
        snapshot.id.aggregate_id(),
        PRODUCT_AGGREGATE,
        product,
        events,
    )
    .await?;
    Ok(snapshot)
}
