//! End-to-end tests of the services over the in-memory store.
//!
//! Covers: stock window, derived availability, the preorder lifecycle,
//! concurrent last-unit orders, rollback and history.

use chrono::{DateTime, Duration, TimeZone, Utc};

use eafoods_core::{DomainError, UserId};
use eafoods_preorders::{Actor, DeliverySchedule, PreorderStatus, SlotId, SlotLabel};
use eafoods_products::{ProductId, ProductSnapshot, StockUpdateWindow};
use eafoods_reporting::ReportPolicy;

use crate::error::ServiceError;
use crate::services::{NewPreorder, NewProduct, PreorderLifecycle, ProductMatch, Reports, StockLedger};
use crate::store::{InMemoryStore, Store, Transaction};

struct Fixture {
    store: InMemoryStore,
    ledger: StockLedger<InMemoryStore>,
    preorders: PreorderLifecycle<InMemoryStore>,
    reports: Reports<InMemoryStore>,
}

fn fixture() -> Fixture {
    let store = InMemoryStore::new();
    Fixture {
        ledger: StockLedger::new(store.clone(), StockUpdateWindow::default()),
        preorders: PreorderLifecycle::new(store.clone(), DeliverySchedule::default()),
        reports: Reports::new(store.clone(), ReportPolicy::ConfirmedOnly),
        store,
    }
}

/// 09:00 UTC, inside the default morning window.
fn in_window() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

fn out_of_window() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap()
}

fn domain(err: ServiceError) -> DomainError {
    match err {
        ServiceError::Domain(e) => e,
        other => panic!("expected domain error, got {other:?}"),
    }
}

async fn product(f: &Fixture, name: &str, stock: i64) -> ProductSnapshot {
    f.ledger
        .register_product(
            NewProduct {
                name: name.to_string(),
                description: None,
                unit_price: 100,
                initial_stock: stock,
            },
            in_window(),
        )
        .await
        .unwrap()
}

async fn morning(f: &Fixture) -> SlotId {
    f.preorders
        .resolve_slot("morning", in_window())
        .await
        .unwrap()
        .id_typed()
}

fn order(customer: UserId, product_id: ProductId, slot_id: SlotId, quantity: i64) -> NewPreorder {
    NewPreorder {
        customer_id: customer,
        product_id,
        slot_id,
        quantity,
        delivery_address: "12 Market Street, Nairobi".to_string(),
    }
}

#[tokio::test]
async fn stock_update_inside_window_replaces_quantity() {
    let f = fixture();
    let apple = product(&f, "Apple", 10).await;

    let updated = f.ledger.update_stock(apple.id, 25, in_window()).await.unwrap();
    assert_eq!(updated.stock, 25);
    assert_eq!(f.ledger.get_stock(apple.id).await.unwrap(), 25);
}

#[tokio::test]
async fn window_is_checked_before_existence_and_quantity() {
    let f = fixture();

    let err = f
        .ledger
        .update_stock(ProductId::generate(), -5, out_of_window())
        .await
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::OutsideWindow(_)));

    let err = f
        .ledger
        .update_stock(ProductId::generate(), 5, in_window())
        .await
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::NotFound(_)));

    let apple = product(&f, "Apple", 10).await;
    let err = f.ledger.update_stock(apple.id, -1, in_window()).await.unwrap_err();
    assert!(matches!(domain(err), DomainError::Validation(_)));
    assert_eq!(f.ledger.get_stock(apple.id).await.unwrap(), 10);
}

#[tokio::test]
async fn duplicate_product_names_conflict_case_insensitively() {
    let f = fixture();
    product(&f, "Milk", 5).await;

    let err = f
        .ledger
        .register_product(
            NewProduct {
                name: " milk ".to_string(),
                description: None,
                unit_price: 1,
                initial_stock: 1,
            },
            in_window(),
        )
        .await
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::Conflict(_)));
}

#[tokio::test]
async fn find_by_name_returns_exact_match_or_suggestions() {
    let f = fixture();
    product(&f, "Apple", 1).await;
    product(&f, "Pineapple", 1).await;

    match f.ledger.find_product_by_name("APPLE").await.unwrap() {
        ProductMatch::Exact(p) => assert_eq!(p.name, "Apple"),
        other => panic!("expected exact match, got {other:?}"),
    }
    match f.ledger.find_product_by_name("pple").await.unwrap() {
        ProductMatch::Suggestions(list) => assert_eq!(list.len(), 2),
        other => panic!("expected suggestions, got {other:?}"),
    }
    let err = f.ledger.find_product_by_name("kiwi").await.unwrap_err();
    assert!(matches!(domain(err), DomainError::NotFound(_)));
}

#[tokio::test]
async fn orders_cannot_exceed_available_stock() {
    let f = fixture();
    let apple = product(&f, "Apple", 10).await;
    let slot = morning(&f).await;
    let customer = UserId::new();

    f.preorders
        .create_preorder(order(customer, apple.id, slot, 10), in_window())
        .await
        .unwrap();

    let err = f
        .preorders
        .create_preorder(order(customer, apple.id, slot, 1), in_window())
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::insufficient_stock(1, 0));

    // Stock itself is untouched; only availability shrinks.
    let level = f.ledger.stock_level(apple.id).await.unwrap();
    assert_eq!((level.stock, level.reserved, level.available), (10, 10, 0));
}

#[tokio::test]
async fn cancelling_frees_capacity() {
    let f = fixture();
    let apple = product(&f, "Apple", 5).await;
    let slot = morning(&f).await;
    let customer = UserId::new();

    let first = f
        .preorders
        .create_preorder(order(customer, apple.id, slot, 5), in_window())
        .await
        .unwrap();
    f.preorders
        .cancel_preorder(first.id, Actor::customer(customer), in_window())
        .await
        .unwrap();

    let second = f
        .preorders
        .create_preorder(order(customer, apple.id, slot, 5), in_window())
        .await
        .unwrap();
    assert_eq!(second.status, PreorderStatus::Pending);
}

#[tokio::test]
async fn lifecycle_rules_are_enforced() {
    let f = fixture();
    let apple = product(&f, "Apple", 5).await;
    let slot = morning(&f).await;
    let customer = UserId::new();
    let staff = Actor::staff(UserId::new());

    let placed = f
        .preorders
        .create_preorder(order(customer, apple.id, slot, 2), in_window())
        .await
        .unwrap();

    let err = f
        .preorders
        .confirm_preorder(placed.id, Actor::customer(customer), in_window())
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::Unauthorized);

    let confirmed = f
        .preorders
        .confirm_preorder(placed.id, staff, in_window())
        .await
        .unwrap();
    assert_eq!(confirmed.status, PreorderStatus::Confirmed);

    let err = f
        .preorders
        .confirm_preorder(placed.id, staff, in_window())
        .await
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::InvalidTransition(_)));

    f.preorders
        .cancel_preorder(placed.id, Actor::customer(customer), in_window())
        .await
        .unwrap();
    let err = f
        .preorders
        .cancel_preorder(placed.id, staff, in_window())
        .await
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::InvalidTransition(_)));
}

#[tokio::test]
async fn other_customers_cannot_see_or_cancel() {
    let f = fixture();
    let apple = product(&f, "Apple", 5).await;
    let slot = morning(&f).await;
    let owner = UserId::new();
    let stranger = Actor::customer(UserId::new());

    let placed = f
        .preorders
        .create_preorder(order(owner, apple.id, slot, 1), in_window())
        .await
        .unwrap();

    let err = f
        .preorders
        .cancel_preorder(placed.id, stranger, in_window())
        .await
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::NotFound(_)));

    let err = f.preorders.get_preorder(placed.id, stranger).await.unwrap_err();
    assert!(matches!(domain(err), DomainError::NotFound(_)));

    let seen = f
        .preorders
        .get_preorder(placed.id, Actor::customer(owner))
        .await
        .unwrap();
    assert_eq!(seen.status, PreorderStatus::Pending);
}

#[tokio::test]
async fn invalid_orders_are_rejected() {
    let f = fixture();
    let apple = product(&f, "Apple", 5).await;
    let slot = morning(&f).await;
    let customer = UserId::new();

    for quantity in [0, -3] {
        let err = f
            .preorders
            .create_preorder(order(customer, apple.id, slot, quantity), in_window())
            .await
            .unwrap_err();
        assert!(matches!(domain(err), DomainError::Validation(_)));
    }

    let mut bad_address = order(customer, apple.id, slot, 1);
    bad_address.delivery_address = "<script>".to_string();
    let err = f
        .preorders
        .create_preorder(bad_address, in_window())
        .await
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::Validation(_)));

    let err = f
        .preorders
        .create_preorder(order(customer, ProductId::generate(), slot, 1), in_window())
        .await
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::NotFound(_)));

    let err = f
        .preorders
        .create_preorder(order(customer, apple.id, SlotId::generate(), 1), in_window())
        .await
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::NotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_for_the_last_unit_admit_exactly_one() {
    let f = fixture();
    let apple = product(&f, "Apple", 1).await;
    let slot = morning(&f).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let preorders = f.preorders.clone();
            let input = order(UserId::new(), apple.id, slot, 1);
            tokio::spawn(async move { preorders.create_preorder(input, in_window()).await })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(e) => assert!(matches!(domain(e), DomainError::InsufficientStock { .. })),
        }
    }
    assert_eq!(admitted, 1);
    assert_eq!(f.ledger.stock_level(apple.id).await.unwrap().available, 0);
}

#[tokio::test]
async fn rejected_commands_leave_no_trace() {
    let f = fixture();
    let apple = product(&f, "Apple", 1).await;
    let slot = morning(&f).await;

    let err = f
        .preorders
        .create_preorder(order(UserId::new(), apple.id, slot, 2), in_window())
        .await
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::InsufficientStock { .. }));
    assert!(f.preorders.list_by_slot(slot, false).await.unwrap().is_empty());

    let mut tx = f.store.begin().await.unwrap();
    assert_eq!(tx.history(apple.id.aggregate_id()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn history_records_every_transition_in_order() {
    let f = fixture();
    let apple = product(&f, "Apple", 5).await;
    let slot = morning(&f).await;
    let customer = UserId::new();
    let staff = Actor::staff(UserId::new());

    let placed = f
        .preorders
        .create_preorder(order(customer, apple.id, slot, 1), in_window())
        .await
        .unwrap();
    f.preorders
        .confirm_preorder(placed.id, staff, in_window())
        .await
        .unwrap();
    f.preorders
        .cancel_preorder(placed.id, staff, in_window())
        .await
        .unwrap();

    let history = f
        .preorders
        .preorder_history(placed.id, Actor::customer(customer))
        .await
        .unwrap();
    let entries: Vec<(u64, &str)> = history
        .iter()
        .map(|e| (e.sequence_number(), e.event_type()))
        .collect();
    assert_eq!(
        entries,
        vec![
            (1, "preorders.preorder.placed"),
            (2, "preorders.preorder.confirmed"),
            (3, "preorders.preorder.cancelled"),
        ]
    );
}

#[tokio::test]
async fn slots_are_resolved_once_per_date_and_label() {
    let f = fixture();

    let first = f.preorders.resolve_slot("Morning", in_window()).await.unwrap();
    let again = f.preorders.resolve_slot("MORNING", in_window()).await.unwrap();
    assert_eq!(first, again);
    assert_eq!(first.label(), SlotLabel::Morning);
    // Before the 18:00 cut-off, delivery is the next day.
    assert_eq!(first.date(), in_window().date_naive() + Duration::days(1));

    let late = Utc.with_ymd_and_hms(2025, 6, 2, 19, 0, 0).unwrap();
    let evening = f.preorders.resolve_slot("evening", late).await.unwrap();
    assert_eq!(evening.date(), in_window().date_naive() + Duration::days(2));

    let err = f.preorders.resolve_slot("midnight", in_window()).await.unwrap_err();
    assert!(matches!(domain(err), DomainError::Validation(_)));

    let err = f.preorders.list_by_slot(SlotId::generate(), false).await.unwrap_err();
    assert!(matches!(domain(err), DomainError::NotFound(_)));
}

#[tokio::test]
async fn slot_listing_skips_cancelled_preorders() {
    let f = fixture();
    let apple = product(&f, "Apple", 20).await;
    let slot = morning(&f).await;
    let customer = UserId::new();

    let mut placed = Vec::new();
    for minutes in 0..3 {
        let preorder = f
            .preorders
            .create_preorder(
                order(customer, apple.id, slot, 2),
                in_window() + Duration::minutes(minutes),
            )
            .await
            .unwrap();
        placed.push(preorder.id);
    }
    f.preorders
        .cancel_preorder(placed[1], Actor::customer(customer), in_window() + Duration::minutes(5))
        .await
        .unwrap();

    let listed: Vec<_> = f
        .preorders
        .list_by_slot(slot, false)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(listed, vec![placed[0], placed[2]]);

    let all = f.preorders.list_by_slot(slot, true).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[1].status, PreorderStatus::Cancelled);
}

#[tokio::test]
async fn report_ranks_confirmed_quantities() {
    let f = fixture();
    let apple = product(&f, "Apple", 50).await;
    let bread = product(&f, "Bread", 50).await;
    let milk = product(&f, "Milk", 50).await;
    let slot = morning(&f).await;
    let customer = UserId::new();
    let staff = Actor::staff(UserId::new());

    for (product_id, quantity) in [(apple.id, 3), (bread.id, 7), (apple.id, 2), (milk.id, 9)] {
        let placed = f
            .preorders
            .create_preorder(order(customer, product_id, slot, quantity), in_window())
            .await
            .unwrap();
        // Milk stays pending.
        if product_id != milk.id {
            f.preorders
                .confirm_preorder(placed.id, staff, in_window())
                .await
                .unwrap();
        }
    }

    let since = in_window() - Duration::days(7);
    let now = in_window() + Duration::hours(1);

    let rows = f.reports.top_selling_products(since, now, 5, None).await.unwrap();
    let ranked: Vec<(&str, i64, u64)> = rows
        .iter()
        .map(|r| (r.product_name.as_str(), r.total_quantity, r.order_count))
        .collect();
    assert_eq!(ranked, vec![("Bread", 7, 1), ("Apple", 5, 2)]);

    let rows = f
        .reports
        .top_selling_products(since, now, 1, Some(ReportPolicy::ConfirmedAndPending))
        .await
        .unwrap();
    assert_eq!(rows[0].product_name, "Milk");

    assert!(f.reports.top_selling_products(now, since, 5, None).await.unwrap().is_empty());
    let err = f.reports.top_selling_products(since, now, 0, None).await.unwrap_err();
    assert!(matches!(domain(err), DomainError::Validation(_)));
}

#[tokio::test]
async fn demo_seed_is_idempotent() {
    let f = fixture();
    product(&f, "apple", 3).await;

    assert_eq!(crate::seed::seed_demo_catalog(&f.ledger, in_window()).await.unwrap(), 6);
    assert_eq!(crate::seed::seed_demo_catalog(&f.ledger, in_window()).await.unwrap(), 0);
    assert_eq!(f.ledger.list_products().await.unwrap().len(), 7);
}

/// A store whose slot lookups miss until the next insert, as if another
/// transaction created the slot in between.
mod slot_race {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use eafoods_core::AggregateId;
    use eafoods_events::EventEnvelope;
    use eafoods_preorders::{DeliverySlot, PreorderId, PreorderSnapshot};

    use super::*;
    use crate::error::StoreError;
    use crate::store::in_memory::InMemoryTransaction;

    #[derive(Clone)]
    struct StaleSlots {
        inner: InMemoryStore,
        stale: Arc<AtomicBool>,
    }

    struct StaleTx {
        inner: InMemoryTransaction,
        stale: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Store for StaleSlots {
        type Tx = StaleTx;

        async fn begin(&self) -> Result<StaleTx, StoreError> {
            Ok(StaleTx {
                inner: self.inner.begin().await?,
                stale: self.stale.clone(),
            })
        }
    }

    #[async_trait]
    impl Transaction for StaleTx {
        async fn product(&mut self, id: ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
            self.inner.product(id).await
        }

        async fn lock_product(
            &mut self,
            id: ProductId,
        ) -> Result<Option<ProductSnapshot>, StoreError> {
            self.inner.lock_product(id).await
        }

        async fn products(&mut self) -> Result<Vec<ProductSnapshot>, StoreError> {
            self.inner.products().await
        }

        async fn product_by_name(
            &mut self,
            name: &str,
        ) -> Result<Option<ProductSnapshot>, StoreError> {
            self.inner.product_by_name(name).await
        }

        async fn products_matching(
            &mut self,
            fragment: &str,
        ) -> Result<Vec<ProductSnapshot>, StoreError> {
            self.inner.products_matching(fragment).await
        }

        async fn save_product(&mut self, product: &ProductSnapshot) -> Result<(), StoreError> {
            self.inner.save_product(product).await
        }

        async fn slot(&mut self, id: SlotId) -> Result<Option<DeliverySlot>, StoreError> {
            self.inner.slot(id).await
        }

        async fn slot_by(
            &mut self,
            date: NaiveDate,
            label: SlotLabel,
        ) -> Result<Option<DeliverySlot>, StoreError> {
            if self.stale.load(Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.slot_by(date, label).await
        }

        async fn insert_slot(&mut self, slot: &DeliverySlot) -> Result<(), StoreError> {
            self.stale.store(false, Ordering::SeqCst);
            self.inner.insert_slot(slot).await
        }

        async fn preorder(
            &mut self,
            id: PreorderId,
        ) -> Result<Option<PreorderSnapshot>, StoreError> {
            self.inner.preorder(id).await
        }

        async fn lock_preorder(
            &mut self,
            id: PreorderId,
        ) -> Result<Option<PreorderSnapshot>, StoreError> {
            self.inner.lock_preorder(id).await
        }

        async fn save_preorder(&mut self, preorder: &PreorderSnapshot) -> Result<(), StoreError> {
            self.inner.save_preorder(preorder).await
        }

        async fn preorders_for_product(
            &mut self,
            product_id: ProductId,
        ) -> Result<Vec<PreorderSnapshot>, StoreError> {
            self.inner.preorders_for_product(product_id).await
        }

        async fn preorders_for_slot(
            &mut self,
            slot_id: SlotId,
        ) -> Result<Vec<PreorderSnapshot>, StoreError> {
            self.inner.preorders_for_slot(slot_id).await
        }

        async fn preorders_created_between(
            &mut self,
            since: DateTime<Utc>,
            until: DateTime<Utc>,
        ) -> Result<Vec<PreorderSnapshot>, StoreError> {
            self.inner.preorders_created_between(since, until).await
        }

        async fn append_history(&mut self, records: &[EventEnvelope]) -> Result<(), StoreError> {
            self.inner.append_history(records).await
        }

        async fn history(
            &mut self,
            aggregate_id: AggregateId,
        ) -> Result<Vec<EventEnvelope>, StoreError> {
            self.inner.history(aggregate_id).await
        }

        async fn commit(self) -> Result<(), StoreError> {
            self.inner.commit().await
        }
    }

    #[tokio::test]
    async fn losing_a_slot_insert_race_returns_the_winner() {
        let store = StaleSlots {
            inner: InMemoryStore::new(),
            stale: Arc::new(AtomicBool::new(false)),
        };
        let preorders = PreorderLifecycle::new(store.clone(), DeliverySchedule::default());
        let winner = preorders.resolve_slot("afternoon", in_window()).await.unwrap();

        store.stale.store(true, Ordering::SeqCst);
        let resolved = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            preorders.resolve_slot("afternoon", in_window()),
        )
        .await
        .expect("slot resolution must not wait on its own transaction")
        .unwrap();

        assert_eq!(resolved, winner);
        assert!(!store.stale.load(Ordering::SeqCst));
    }
}
