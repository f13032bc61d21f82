use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eafoods_core::{DomainError, DomainResult};
use eafoods_preorders::{Preorder, PreorderStatus};
use eafoods_products::ProductId;

/// Which preorder statuses count as "sold".
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPolicy {
    #[default]
    ConfirmedOnly,
    ConfirmedAndPending,
}

impl ReportPolicy {
    pub fn counts(&self, status: PreorderStatus) -> bool {
        match (self, status) {
            (_, PreorderStatus::Confirmed) => true,
            (ReportPolicy::ConfirmedAndPending, PreorderStatus::Pending) => true,
            _ => false,
        }
    }
}

/// One row of the top-selling report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopSeller {
    pub product_id: ProductId,
    pub total_quantity: i64,
    pub order_count: u64,
}

/// Top `limit` products by ordered quantity for preorders created in
/// `since..=now`.
///
/// Sorted by total quantity descending, ties broken by product id ascending.
pub fn top_selling<'a>(
    preorders: impl IntoIterator<Item = &'a Preorder>,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
    limit: usize,
    policy: ReportPolicy,
) -> DomainResult<Vec<TopSeller>> {
    if limit == 0 {
        return Err(DomainError::validation("limit must be at least 1"));
    }
    if since > now {
        return Ok(Vec::new());
    }

    let mut totals: HashMap<ProductId, (i64, u64)> = HashMap::new();
    for preorder in preorders {
        let (Some(product_id), Some(created_at)) = (preorder.product_id(), preorder.created_at())
        else {
            continue;
        };
        if created_at < since || created_at > now || !policy.counts(preorder.status()) {
            continue;
        }
        let entry = totals.entry(product_id).or_default();
        entry.0 += preorder.quantity();
        entry.1 += 1;
    }

    let mut rows: Vec<TopSeller> = totals
        .into_iter()
        .map(|(product_id, (total_quantity, order_count))| TopSeller {
            product_id,
            total_quantity,
            order_count,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_quantity
            .cmp(&a.total_quantity)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
    rows.truncate(limit);
    Ok(rows)
}
