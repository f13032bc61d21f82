use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use eafoods_core::AggregateId;
use eafoods_events::EventEnvelope;
use eafoods_preorders::{DeliverySlot, PreorderId, PreorderSnapshot, SlotId, SlotLabel};
use eafoods_products::{ProductId, ProductSnapshot};

use crate::error::StoreError;

/// Source of scoped transactions.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: Transaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// One unit of work against the store.
///
/// `lock_*` variants additionally hold the row until commit or rollback, so a
/// check-then-write on that row cannot interleave with another transaction.
#[async_trait]
pub trait Transaction: Send {
    // products

    async fn product(&mut self, id: ProductId) -> Result<Option<ProductSnapshot>, StoreError>;

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<ProductSnapshot>, StoreError>;

    /// All products ordered by name.
    async fn products(&mut self) -> Result<Vec<ProductSnapshot>, StoreError>;

    /// Exact, case-insensitive name match.
    async fn product_by_name(&mut self, name: &str) -> Result<Option<ProductSnapshot>, StoreError>;

    /// Case-insensitive substring match, ordered by name.
    async fn products_matching(&mut self, fragment: &str) -> Result<Vec<ProductSnapshot>, StoreError>;

    /// Insert or replace. A duplicate name is a [`StoreError::Conflict`].
    async fn save_product(&mut self, product: &ProductSnapshot) -> Result<(), StoreError>;

    // delivery slots

    async fn slot(&mut self, id: SlotId) -> Result<Option<DeliverySlot>, StoreError>;

    async fn slot_by(
        &mut self,
        date: NaiveDate,
        label: SlotLabel,
    ) -> Result<Option<DeliverySlot>, StoreError>;

    /// Insert a new slot. An existing `(date, label)` is a [`StoreError::Conflict`].
    async fn insert_slot(&mut self, slot: &DeliverySlot) -> Result<(), StoreError>;

    // preorders

    async fn preorder(&mut self, id: PreorderId) -> Result<Option<PreorderSnapshot>, StoreError>;

    async fn lock_preorder(&mut self, id: PreorderId)
    -> Result<Option<PreorderSnapshot>, StoreError>;

    async fn save_preorder(&mut self, preorder: &PreorderSnapshot) -> Result<(), StoreError>;

    async fn preorders_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<PreorderSnapshot>, StoreError>;

    /// Ordered by creation time, ties by id.
    async fn preorders_for_slot(&mut self, slot_id: SlotId)
    -> Result<Vec<PreorderSnapshot>, StoreError>;

    /// Preorders with `since <= created_at <= until`.
    async fn preorders_created_between(
        &mut self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<PreorderSnapshot>, StoreError>;

    // history

    /// Append history records. A reused `(aggregate_id, sequence_number)` is a
    /// [`StoreError::Conflict`].
    async fn append_history(&mut self, records: &[EventEnvelope]) -> Result<(), StoreError>;

    /// History of one aggregate in sequence order.
    async fn history(&mut self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> Store for std::sync::Arc<S>
where
    S: Store + ?Sized,
{
    type Tx = S::Tx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        (**self).begin().await
    }
}
