use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use eafoods_core::AggregateId;
use eafoods_events::EventEnvelope;
use eafoods_preorders::{DeliverySlot, PreorderId, PreorderSnapshot, SlotId, SlotLabel};
use eafoods_products::{ProductId, ProductSnapshot};

use super::r#trait::{Store, Transaction};
use crate::error::StoreError;

#[derive(Debug, Clone, Default)]
struct State {
    products: HashMap<ProductId, ProductSnapshot>,
    slots: HashMap<SlotId, DeliverySlot>,
    preorders: HashMap<PreorderId, PreorderSnapshot>,
    history: HashMap<AggregateId, Vec<EventEnvelope>>,
}

/// In-memory store for tests/dev.
///
/// Transactions are fully serialized: `begin` waits for the previous
/// transaction to finish. Each transaction works on a private copy that
/// replaces the shared state on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction { guard, working })
    }
}

pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<State>,
    working: State,
}

fn by_name(products: &mut [ProductSnapshot]) {
    products.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn product(&mut self, id: ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
        self.product(id).await
    }

    async fn products(&mut self) -> Result<Vec<ProductSnapshot>, StoreError> {
        let mut all: Vec<_> = self.working.products.values().cloned().collect();
        by_name(&mut all);
        Ok(all)
    }

    async fn product_by_name(&mut self, name: &str) -> Result<Option<ProductSnapshot>, StoreError> {
        let wanted = name.trim().to_lowercase();
        Ok(self
            .working
            .products
            .values()
            .find(|p| p.name.to_lowercase() == wanted)
            .cloned())
    }

    async fn products_matching(&mut self, fragment: &str) -> Result<Vec<ProductSnapshot>, StoreError> {
        let wanted = fragment.trim().to_lowercase();
        let mut found: Vec<_> = self
            .working
            .products
            .values()
            .filter(|p| p.name.to_lowercase().contains(&wanted))
            .cloned()
            .collect();
        by_name(&mut found);
        Ok(found)
    }

    async fn save_product(&mut self, product: &ProductSnapshot) -> Result<(), StoreError> {
        let name = product.name.to_lowercase();
        if self
            .working
            .products
            .values()
            .any(|p| p.id != product.id && p.name.to_lowercase() == name)
        {
            return Err(StoreError::Conflict(format!(
                "product name '{}' already taken",
                product.name
            )));
        }
        self.working.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn slot(&mut self, id: SlotId) -> Result<Option<DeliverySlot>, StoreError> {
        Ok(self.working.slots.get(&id).cloned())
    }

    async fn slot_by(
        &mut self,
        date: NaiveDate,
        label: SlotLabel,
    ) -> Result<Option<DeliverySlot>, StoreError> {
        Ok(self
            .working
            .slots
            .values()
            .find(|s| s.date() == date && s.label() == label)
            .cloned())
    }

    async fn insert_slot(&mut self, slot: &DeliverySlot) -> Result<(), StoreError> {
        if self.slot_by(slot.date(), slot.label()).await?.is_some() {
            return Err(StoreError::Conflict(format!(
                "slot {} {} already exists",
                slot.date(),
                slot.label()
            )));
        }
        self.working.slots.insert(slot.id_typed(), slot.clone());
        Ok(())
    }

    async fn preorder(&mut self, id: PreorderId) -> Result<Option<PreorderSnapshot>, StoreError> {
        Ok(self.working.preorders.get(&id).cloned())
    }

    async fn lock_preorder(
        &mut self,
        id: PreorderId,
    ) -> Result<Option<PreorderSnapshot>, StoreError> {
        self.preorder(id).await
    }

    async fn save_preorder(&mut self, preorder: &PreorderSnapshot) -> Result<(), StoreError> {
        self.working.preorders.insert(preorder.id, preorder.clone());
        Ok(())
    }

    async fn preorders_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<PreorderSnapshot>, StoreError> {
        Ok(self
            .working
            .preorders
            .values()
            .filter(|p| p.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn preorders_for_slot(
        &mut self,
        slot_id: SlotId,
    ) -> Result<Vec<PreorderSnapshot>, StoreError> {
        let mut found: Vec<_> = self
            .working
            .preorders
            .values()
            .filter(|p| p.slot_id == slot_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn preorders_created_between(
        &mut self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<PreorderSnapshot>, StoreError> {
        Ok(self
            .working
            .preorders
            .values()
            .filter(|p| since <= p.created_at && p.created_at <= until)
            .cloned()
            .collect())
    }

    async fn append_history(&mut self, records: &[EventEnvelope]) -> Result<(), StoreError> {
        for record in records {
            let stream = self
                .working
                .history
                .entry(record.aggregate_id())
                .or_default();
            let current = stream.last().map(EventEnvelope::sequence_number).unwrap_or(0);
            if record.sequence_number() != current + 1 {
                return Err(StoreError::Conflict(format!(
                    "history of {} is at {current}, got sequence {}",
                    record.aggregate_id(),
                    record.sequence_number()
                )));
            }
            stream.push(record.clone());
        }
        Ok(())
    }

    async fn history(&mut self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>, StoreError> {
        Ok(self
            .working
            .history
            .get(&aggregate_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn commit(self) -> Result<(), StoreError> {
        let Self { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(name: &str) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::generate(),
            name: name.to_string(),
            description: None,
            unit_price: 100,
            stock: 5,
            updated_at: Utc::now(),
            version: 1,
        }
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemoryStore::new();
        let apple = product("Apple");

        {
            let mut tx = store.begin().await.unwrap();
            tx.save_product(&apple).await.unwrap();
        }

        let mut tx = store.begin().await.unwrap();
        assert!(tx.product(apple.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = InMemoryStore::new();
        let apple = product("Apple");

        let mut tx = store.begin().await.unwrap();
        tx.save_product(&apple).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.product(apple.id).await.unwrap(), Some(apple));
    }

    #[tokio::test]
    async fn names_are_unique_and_searchable_case_insensitively() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.save_product(&product("Banana")).await.unwrap();
        tx.save_product(&product("Apple")).await.unwrap();
        tx.save_product(&product("Pineapple")).await.unwrap();

        assert!(matches!(
            tx.save_product(&product("APPLE")).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(
            tx.product_by_name(" apple ").await.unwrap().map(|p| p.name),
            Some("Apple".to_string())
        );

        let names: Vec<String> = tx
            .products_matching("APP")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Apple", "Pineapple"]);

        let all: Vec<String> = tx.products().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(all, vec!["Apple", "Banana", "Pineapple"]);
    }

    #[tokio::test]
    async fn duplicate_slot_is_a_conflict() {
        let store = InMemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        let mut tx = store.begin().await.unwrap();

        tx.insert_slot(&DeliverySlot::new(SlotId::generate(), date, SlotLabel::Morning))
            .await
            .unwrap();
        assert!(matches!(
            tx.insert_slot(&DeliverySlot::new(SlotId::generate(), date, SlotLabel::Morning))
                .await,
            Err(StoreError::Conflict(_))
        ));
        assert!(tx.slot_by(date, SlotLabel::Evening).await.unwrap().is_none());
    }
}
