use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use eafoods_core::DomainError;
use eafoods_preorders::Preorder;
use eafoods_products::ProductId;
use eafoods_reporting::{ReportPolicy, top_selling};

use crate::error::ServiceResult;
use crate::store::{Store, Transaction};

/// A report row with the product name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopSellingProduct {
    pub product_id: ProductId,
    pub product_name: String,
    pub total_quantity: i64,
    pub order_count: u64,
}

#[derive(Debug, Clone)]
pub struct Reports<S> {
    store: S,
    policy: ReportPolicy,
}

impl<S: Store> Reports<S> {
    pub fn new(store: S, policy: ReportPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ReportPolicy {
        self.policy
    }

    /// Best sellers among preorders created in `since..=now`.
    ///
    /// `policy` overrides the configured one for this call.
    #[instrument(skip(self), err)]
    pub async fn top_selling_products(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
        limit: usize,
        policy: Option<ReportPolicy>,
    ) -> ServiceResult<Vec<TopSellingProduct>> {
        if limit == 0 {
            return Err(DomainError::validation("limit must be at least 1").into());
        }
        if since > now {
            return Ok(Vec::new());
        }

        let mut tx = self.store.begin().await?;
        let preorders: Vec<Preorder> = tx
            .preorders_created_between(since, now)
            .await?
            .into_iter()
            .map(Preorder::restore)
            .collect();
        let rows = top_selling(&preorders, since, now, limit, policy.unwrap_or(self.policy))?;

        let names: HashMap<ProductId, String> = tx
            .products()
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        Ok(rows
            .into_iter()
            .map(|row| TopSellingProduct {
                product_name: names.get(&row.product_id).cloned().unwrap_or_default(),
                product_id: row.product_id,
                total_quantity: row.total_quantity,
                order_count: row.order_count,
            })
            .collect())
    }
}
