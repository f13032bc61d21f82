//! Application services.
//!
//! Each operation follows the same pipeline:
//!
//! ```text
//! begin → load (lock) snapshot → restore aggregate → handle + apply
//!       → save snapshot → append history → commit
//! ```
//!
//! Any error before `commit` drops the transaction, which rolls it back.

use serde::Serialize;

use eafoods_core::{Aggregate, AggregateId};
use eafoods_events::{Event, EventEnvelope};

use crate::config::AppConfig;
use crate::error::StoreError;
use crate::store::{Store, Transaction};

pub mod preorder_lifecycle;
pub mod reports;
pub mod stock_ledger;

pub use preorder_lifecycle::{NewPreorder, PreorderLifecycle};
pub use reports::{Reports, TopSellingProduct};
pub use stock_ledger::{NewProduct, ProductMatch, StockLedger, StockLevel};

pub const PRODUCT_AGGREGATE: &str = "products.product";
pub const PREORDER_AGGREGATE: &str = "preorders.preorder";

/// All services over one store.
#[derive(Debug, Clone)]
pub struct Services<S> {
    pub ledger: StockLedger<S>,
    pub preorders: PreorderLifecycle<S>,
    pub reports: Reports<S>,
}

impl<S> Services<S>
where
    S: Store + Clone,
{
    pub fn from_config(store: S, config: &AppConfig) -> Self {
        Self {
            ledger: StockLedger::new(store.clone(), config.stock_window.clone()),
            preorders: PreorderLifecycle::new(store.clone(), config.delivery_schedule),
            reports: Reports::new(store, config.report_policy),
        }
    }
}

/// Append `events`, just applied to `aggregate`, to its history.
///
/// Sequence numbers continue from the version the aggregate had before the
/// events were applied.
pub(crate) async fn record_history<A, T>(
    tx: &mut T,
    aggregate_id: AggregateId,
    aggregate_type: &str,
    aggregate: &A,
    events: &[A::Event],
) -> Result<(), StoreError>
where
    A: Aggregate,
    A::Event: Event + Serialize,
    T: Transaction,
{
    let first = aggregate.version() + 1 - events.len() as u64;
    let records = events
        .iter()
        .enumerate()
        .map(|(i, event)| {
            EventEnvelope::from_typed(aggregate_id, aggregate_type, first + i as u64, event)
        })
        .collect::<Result<Vec<_>, _>>()?;
    tx.append_history(&records).await
}
