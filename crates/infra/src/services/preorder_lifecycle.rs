//! Preorder creation, confirmation and cancellation, plus slot resolution.

use chrono::{DateTime, Utc};
use tracing::instrument;

use eafoods_core::aggregate::execute;
use eafoods_core::{DomainError, UserId};
use eafoods_events::EventEnvelope;
use eafoods_preorders::{
    Actor, Availability, CancelPreorder, ConfirmPreorder, DeliveryAddress, DeliverySchedule,
    DeliverySlot, PlacePreorder, Preorder, PreorderCommand, PreorderEvent, PreorderId,
    PreorderSnapshot, SlotId, SlotLabel,
};
use eafoods_products::ProductId;

use super::{PREORDER_AGGREGATE, record_history};
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::store::{Store, Transaction};

/// Input of [`PreorderLifecycle::create_preorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPreorder {
    pub customer_id: UserId,
    pub product_id: ProductId,
    pub slot_id: SlotId,
    pub quantity: i64,
    pub delivery_address: String,
}

#[derive(Debug, Clone)]
pub struct PreorderLifecycle<S> {
    store: S,
    schedule: DeliverySchedule,
}

impl<S: Store> PreorderLifecycle<S> {
    pub fn new(store: S, schedule: DeliverySchedule) -> Self {
        Self { store, schedule }
    }

    pub fn schedule(&self) -> &DeliverySchedule {
        &self.schedule
    }

    /// Place a PENDING preorder if enough stock is still available.
    ///
    /// The product row stays locked until commit, so concurrent creates for
    /// the same product see each other's reservations.
    #[instrument(
        skip(self, input),
        fields(product_id = %input.product_id, quantity = input.quantity),
        err
    )]
    pub async fn create_preorder(
        &self,
        input: NewPreorder,
        request_time: DateTime<Utc>,
    ) -> ServiceResult<PreorderSnapshot> {
        if input.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive").into());
        }
        let delivery_address = DeliveryAddress::parse(&input.delivery_address)?;

        let mut tx = self.store.begin().await?;
        let product = tx
            .lock_product(input.product_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("product {}", input.product_id)))?;
        tx.slot(input.slot_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("slot {}", input.slot_id)))?;

        let existing = tx.preorders_for_product(input.product_id).await?;
        let availability = Availability::from_preorders(product.stock, &existing);

        let preorder_id = PreorderId::generate();
        let mut preorder = Preorder::empty(preorder_id);
        let events = execute(
            &mut preorder,
            &PreorderCommand::PlacePreorder(PlacePreorder {
                preorder_id,
                customer_id: input.customer_id,
                product_id: input.product_id,
                slot_id: input.slot_id,
                quantity: input.quantity,
                delivery_address,
                availability,
                occurred_at: request_time,
            }),
        )?;

        let snapshot = persist(&mut tx, &preorder, &events).await?;
        tx.commit().await?;

        tracing::info!(
            preorder_id = %preorder_id,
            customer_id = %input.customer_id,
            remaining = availability.available() - input.quantity,
            "preorder created"
        );
        Ok(snapshot)
    }

    #[instrument(skip(self), err)]
    pub async fn confirm_preorder(
        &self,
        preorder_id: PreorderId,
        actor: Actor,
        request_time: DateTime<Utc>,
    ) -> ServiceResult<PreorderSnapshot> {
        let snapshot = self
            .transition(preorder_id, |preorder_id| {
                PreorderCommand::ConfirmPreorder(ConfirmPreorder {
                    preorder_id,
                    actor,
                    occurred_at: request_time,
                })
            })
            .await?;
        tracing::info!(preorder_id = %preorder_id, by = %actor.id, "preorder confirmed");
        Ok(snapshot)
    }

    /// Cancel a preorder. Capacity is freed because availability is derived.
    #[instrument(skip(self), err)]
    pub async fn cancel_preorder(
        &self,
        preorder_id: PreorderId,
        actor: Actor,
        request_time: DateTime<Utc>,
    ) -> ServiceResult<PreorderSnapshot> {
        let snapshot = self
            .transition(preorder_id, |preorder_id| {
                PreorderCommand::CancelPreorder(CancelPreorder {
                    preorder_id,
                    actor,
                    occurred_at: request_time,
                })
            })
            .await?;
        tracing::info!(preorder_id = %preorder_id, by = %actor.id, "preorder cancelled");
        Ok(snapshot)
    }

    async fn transition<F>(
        &self,
        preorder_id: PreorderId,
        command: F,
    ) -> ServiceResult<PreorderSnapshot>
    where
        F: FnOnce(PreorderId) -> PreorderCommand + Send,
    {
        let mut tx = self.store.begin().await?;
        let current = tx
            .lock_preorder(preorder_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("preorder {preorder_id}")))?;

        let mut preorder = Preorder::restore(current);
        let events = execute(&mut preorder, &command(preorder_id))?;

        let snapshot = persist(&mut tx, &preorder, &events).await?;
        tx.commit().await?;
        Ok(snapshot)
    }

    /// Owner or staff only; anyone else gets `NotFound`.
    pub async fn get_preorder(
        &self,
        preorder_id: PreorderId,
        actor: Actor,
    ) -> ServiceResult<PreorderSnapshot> {
        let mut tx = self.store.begin().await?;
        visible(tx.preorder(preorder_id).await?, preorder_id, &actor)
    }

    pub async fn preorder_history(
        &self,
        preorder_id: PreorderId,
        actor: Actor,
    ) -> ServiceResult<Vec<EventEnvelope>> {
        let mut tx = self.store.begin().await?;
        let preorder = visible(tx.preorder(preorder_id).await?, preorder_id, &actor)?;
        Ok(tx.history(preorder.id.aggregate_id()).await?)
    }

    /// Pending and confirmed preorders of a slot, oldest first.
    ///
    /// Cancelled preorders are only listed with `include_cancelled`.
    pub async fn list_by_slot(
        &self,
        slot_id: SlotId,
        include_cancelled: bool,
    ) -> ServiceResult<Vec<PreorderSnapshot>> {
        let mut tx = self.store.begin().await?;
        tx.slot(slot_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("slot {slot_id}")))?;
        let mut preorders = tx.preorders_for_slot(slot_id).await?;
        if !include_cancelled {
            preorders.retain(|p| p.status.is_active());
        }
        Ok(preorders)
    }

    pub async fn get_slot(&self, slot_id: SlotId) -> ServiceResult<DeliverySlot> {
        let mut tx = self.store.begin().await?;
        tx.slot(slot_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("slot {slot_id}")).into())
    }

    /// Slot for `label` on the delivery date implied by `request_time`,
    /// created on first use.
    #[instrument(skip(self), err)]
    pub async fn resolve_slot(
        &self,
        label: &str,
        request_time: DateTime<Utc>,
    ) -> ServiceResult<DeliverySlot> {
        let label: SlotLabel = label.parse()?;
        let date = self.schedule.delivery_date(request_time)?;

        let mut tx = self.store.begin().await?;
        if let Some(slot) = tx.slot_by(date, label).await? {
            return Ok(slot);
        }

        let slot = DeliverySlot::new(SlotId::generate(), date, label);
        match tx.insert_slot(&slot).await {
            Ok(()) => {
                tx.commit().await?;
                tracing::info!(slot_id = %slot.id_typed(), %date, %label, "delivery slot created");
                Ok(slot)
            }
            // Another transaction created it first.
            Err(StoreError::Conflict(_)) => {
                drop(tx);
                let mut tx = self.store.begin().await?;
                tx.slot_by(date, label)
                    .await?
                    .ok_or_else(|| DomainError::not_found(format!("slot {date} {label}")).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn slot_labels(&self) -> [SlotLabel; 3] {
        SlotLabel::ALL
    }
}

fn visible(
    found: Option<PreorderSnapshot>,
    preorder_id: PreorderId,
    actor: &Actor,
) -> ServiceResult<PreorderSnapshot> {
    found
        .filter(|p| Preorder::restore(p.clone()).is_visible_to(actor))
        .ok_or_else(|| {
            DomainError::not_found(format!("preorder {preorder_id} not found or not authorized"))
                .into()
        })
}

async fn persist<T: Transaction>(
    tx: &mut T,
    preorder: &Preorder,
    events: &[PreorderEvent],
) -> ServiceResult<PreorderSnapshot> {
    let snapshot = preorder
        .snapshot()
        .ok_or_else(|| ServiceError::from(DomainError::not_found("preorder")))?;
    tx.save_preorder(&snapshot).await?;
    record_history(
        tx,
        snapshot.id.aggregate_id(),
        PREORDER_AGGREGATE,
        preorder,
        events,
    )
    .await?;
    Ok(snapshot)
}
