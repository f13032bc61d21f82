use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eafoods_core::{Aggregate, AggregateRoot, DomainError, UserId, typed_id};
use eafoods_events::Event;
use eafoods_products::ProductId;

use crate::actor::Actor;
use crate::address::DeliveryAddress;
use crate::availability::Availability;
use crate::slot::SlotId;

typed_id!(
    /// Preorder identifier.
    PreorderId
);

/// Preorder status lifecycle.
///
/// `PENDING → CONFIRMED`, `PENDING | CONFIRMED → CANCELLED`. Nothing leaves
/// `CANCELLED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreorderStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl PreorderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreorderStatus::Pending => "PENDING",
            PreorderStatus::Confirmed => "CONFIRMED",
            PreorderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Whether the quantity still counts against availability.
    pub fn is_active(&self) -> bool {
        !matches!(self, PreorderStatus::Cancelled)
    }
}

impl core::fmt::Display for PreorderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for PreorderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PreorderStatus::Pending),
            "CONFIRMED" => Ok(PreorderStatus::Confirmed),
            "CANCELLED" => Ok(PreorderStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown preorder status '{other}'"
            ))),
        }
    }
}

/// Aggregate root: Preorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preorder {
    id: PreorderId,
    customer_id: Option<UserId>,
    product_id: Option<ProductId>,
    slot_id: Option<SlotId>,
    quantity: i64,
    delivery_address: Option<DeliveryAddress>,
    status: PreorderStatus,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
}

/// Persisted form of a [`Preorder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreorderSnapshot {
    pub id: PreorderId,
    pub customer_id: UserId,
    pub product_id: ProductId,
    pub slot_id: SlotId,
    pub quantity: i64,
    pub delivery_address: DeliveryAddress,
    pub status: PreorderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Preorder {
    /// Create an empty, not-yet-placed instance.
    pub fn empty(id: PreorderId) -> Self {
        Self {
            id,
            customer_id: None,
            product_id: None,
            slot_id: None,
            quantity: 0,
            delivery_address: None,
            status: PreorderStatus::Pending,
            created_at: None,
            updated_at: None,
            version: 0,
        }
    }

    pub fn restore(snapshot: PreorderSnapshot) -> Self {
        Self {
            id: snapshot.id,
            customer_id: Some(snapshot.customer_id),
            product_id: Some(snapshot.product_id),
            slot_id: Some(snapshot.slot_id),
            quantity: snapshot.quantity,
            delivery_address: Some(snapshot.delivery_address),
            status: snapshot.status,
            created_at: Some(snapshot.created_at),
            updated_at: Some(snapshot.updated_at),
            version: snapshot.version,
        }
    }

    /// Persisted form. `None` until the preorder has been placed.
    pub fn snapshot(&self) -> Option<PreorderSnapshot> {
        Some(PreorderSnapshot {
            id: self.id,
            customer_id: self.customer_id?,
            product_id: self.product_id?,
            slot_id: self.slot_id?,
            quantity: self.quantity,
            delivery_address: self.delivery_address.clone()?,
            status: self.status,
            created_at: self.created_at?,
            updated_at: self.updated_at?,
            version: self.version,
        })
    }

    pub fn id_typed(&self) -> PreorderId {
        self.id
    }

    pub fn customer_id(&self) -> Option<UserId> {
        self.customer_id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn slot_id(&self) -> Option<SlotId> {
        self.slot_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn delivery_address(&self) -> Option<&DeliveryAddress> {
        self.delivery_address.as_ref()
    }

    pub fn status(&self) -> PreorderStatus {
        self.status
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_placed(&self) -> bool {
        self.customer_id.is_some()
    }

    /// Customers only see their own preorders; staff see all of them.
    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        actor.is_staff() || self.customer_id == Some(actor.id)
    }
}

impl AggregateRoot for Preorder {
    type Id = PreorderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlacePreorder.
///
/// `availability` is computed by the caller from the locked product row and the
/// product's active preorders, so the decision here stays pure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacePreorder {
    pub preorder_id: PreorderId,
    pub customer_id: UserId,
    pub product_id: ProductId,
    pub slot_id: SlotId,
    pub quantity: i64,
    pub delivery_address: DeliveryAddress,
    pub availability: Availability,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmPreorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPreorder {
    pub preorder_id: PreorderId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelPreorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPreorder {
    pub preorder_id: PreorderId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreorderCommand {
    PlacePreorder(PlacePreorder),
    ConfirmPreorder(ConfirmPreorder),
    CancelPreorder(CancelPreorder),
}

/// Event: PreorderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreorderPlaced {
    pub preorder_id: PreorderId,
    pub customer_id: UserId,
    pub product_id: ProductId,
    pub slot_id: SlotId,
    pub quantity: i64,
    pub delivery_address: DeliveryAddress,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PreorderConfirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreorderConfirmed {
    pub preorder_id: PreorderId,
    pub confirmed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PreorderCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreorderCancelled {
    pub preorder_id: PreorderId,
    pub cancelled_by: UserId,
    pub previous_status: PreorderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreorderEvent {
    PreorderPlaced(PreorderPlaced),
    PreorderConfirmed(PreorderConfirmed),
    PreorderCancelled(PreorderCancelled),
}

impl Event for PreorderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PreorderEvent::PreorderPlaced(_) => "preorders.preorder.placed",
            PreorderEvent::PreorderConfirmed(_) => "preorders.preorder.confirmed",
            PreorderEvent::PreorderCancelled(_) => "preorders.preorder.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PreorderEvent::PreorderPlaced(e) => e.occurred_at,
            PreorderEvent::PreorderConfirmed(e) => e.occurred_at,
            PreorderEvent::PreorderCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Preorder {
    type Command = PreorderCommand;
    type Event = PreorderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PreorderEvent::PreorderPlaced(e) => {
                self.id = e.preorder_id;
                self.customer_id = Some(e.customer_id);
                self.product_id = Some(e.product_id);
                self.slot_id = Some(e.slot_id);
                self.quantity = e.quantity;
                self.delivery_address = Some(e.delivery_address.clone());
                self.status = PreorderStatus::Pending;
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
            }
            PreorderEvent::PreorderConfirmed(e) => {
                self.status = PreorderStatus::Confirmed;
                self.updated_at = Some(e.occurred_at);
            }
            PreorderEvent::PreorderCancelled(e) => {
                self.status = PreorderStatus::Cancelled;
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PreorderCommand::PlacePreorder(cmd) => self.handle_place(cmd),
            PreorderCommand::ConfirmPreorder(cmd) => self.handle_confirm(cmd),
            PreorderCommand::CancelPreorder(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Preorder {
    fn ensure_placed(&self, preorder_id: PreorderId) -> Result<(), DomainError> {
        if !self.is_placed() || self.id != preorder_id {
            return Err(DomainError::not_found(format!("preorder {preorder_id}")));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlacePreorder) -> Result<Vec<PreorderEvent>, DomainError> {
        if self.is_placed() {
            return Err(DomainError::conflict("preorder already exists"));
        }
        if cmd.quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        cmd.availability.ensure(cmd.quantity)?;

        Ok(vec![PreorderEvent::PreorderPlaced(PreorderPlaced {
            preorder_id: cmd.preorder_id,
            customer_id: cmd.customer_id,
            product_id: cmd.product_id,
            slot_id: cmd.slot_id,
            quantity: cmd.quantity,
            delivery_address: cmd.delivery_address.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm(&self, cmd: &ConfirmPreorder) -> Result<Vec<PreorderEvent>, DomainError> {
        self.ensure_placed(cmd.preorder_id)?;
        if !cmd.actor.is_staff() {
            return Err(DomainError::Unauthorized);
        }
        if self.status != PreorderStatus::Pending {
            return Err(DomainError::invalid_transition(format!(
                "cannot confirm a {} preorder",
                self.status
            )));
        }

        Ok(vec![PreorderEvent::PreorderConfirmed(PreorderConfirmed {
            preorder_id: cmd.preorder_id,
            confirmed_by: cmd.actor.id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelPreorder) -> Result<Vec<PreorderEvent>, DomainError> {
        self.ensure_placed(cmd.preorder_id)?;
        if !self.is_visible_to(&cmd.actor) {
            return Err(DomainError::not_found(format!(
                "preorder {} not found or not authorized",
                cmd.preorder_id
            )));
        }
        if self.status == PreorderStatus::Cancelled {
            return Err(DomainError::invalid_transition("preorder is already cancelled"));
        }

        Ok(vec![PreorderEvent::PreorderCancelled(PreorderCancelled {
            preorder_id: cmd.preorder_id,
            cancelled_by: cmd.actor.id,
            previous_status: self.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eafoods_core::aggregate::execute;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn place(customer: UserId, quantity: i64, availability: Availability) -> Result<Preorder, DomainError> {
        let preorder_id = PreorderId::generate();
        let mut preorder = Preorder::empty(preorder_id);
        execute(
            &mut preorder,
            &PreorderCommand::PlacePreorder(PlacePreorder {
                preorder_id,
                customer_id: customer,
                product_id: ProductId::generate(),
                slot_id: SlotId::generate(),
                quantity,
                delivery_address: DeliveryAddress::parse("456 Street").unwrap(),
                availability,
                occurred_at: test_time(),
            }),
        )?;
        Ok(preorder)
    }

    fn confirm(preorder: &mut Preorder, actor: Actor) -> Result<Vec<PreorderEvent>, DomainError> {
        let preorder_id = preorder.id_typed();
        execute(
            preorder,
            &PreorderCommand::ConfirmPreorder(ConfirmPreorder {
                preorder_id,
                actor,
                occurred_at: test_time(),
            }),
        )
    }

    fn cancel(preorder: &mut Preorder, actor: Actor) -> Result<Vec<PreorderEvent>, DomainError> {
        let preorder_id = preorder.id_typed();
        execute(
            preorder,
            &PreorderCommand::CancelPreorder(CancelPreorder {
                preorder_id,
                actor,
                occurred_at: test_time(),
            }),
        )
    }

    #[test]
    fn place_starts_pending() {
        let customer = UserId::new();
        let preorder = place(customer, 3, Availability::new(10, 0)).unwrap();

        assert_eq!(preorder.status(), PreorderStatus::Pending);
        assert_eq!(preorder.customer_id(), Some(customer));
        assert_eq!(preorder.quantity(), 3);
        assert_eq!(preorder.version(), 1);
        assert_eq!(preorder.created_at(), preorder.updated_at());
    }

    #[test]
    fn place_rejects_non_positive_quantity() {
        for quantity in [0, -2] {
            assert!(matches!(
                place(UserId::new(), quantity, Availability::new(10, 0)),
                Err(DomainError::Validation(_))
            ));
        }
    }

    #[test]
    fn place_rejects_more_than_available() {
        let err = place(UserId::new(), 5, Availability::new(10, 7)).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                requested: 5,
                available: 3
            }
        );
        assert!(place(UserId::new(), 3, Availability::new(10, 7)).is_ok());
    }

    #[test]
    fn staff_confirms_pending_once() {
        let mut preorder = place(UserId::new(), 2, Availability::new(5, 0)).unwrap();
        let staff = Actor::staff(UserId::new());

        confirm(&mut preorder, staff).unwrap();
        assert_eq!(preorder.status(), PreorderStatus::Confirmed);

        assert!(matches!(
            confirm(&mut preorder, staff),
            Err(DomainError::InvalidTransition(_))
        ));
    }

    #[test]
    fn customer_cannot_confirm() {
        let customer = UserId::new();
        let mut preorder = place(customer, 2, Availability::new(5, 0)).unwrap();
        assert_eq!(
            confirm(&mut preorder, Actor::customer(customer)),
            Err(DomainError::Unauthorized)
        );
        assert_eq!(preorder.status(), PreorderStatus::Pending);
    }

    #[test]
    fn owner_cancels_and_second_cancel_fails() {
        let customer = UserId::new();
        let mut preorder = place(customer, 2, Availability::new(5, 0)).unwrap();

        let events = cancel(&mut preorder, Actor::customer(customer)).unwrap();
        match &events[0] {
            PreorderEvent::PreorderCancelled(e) => {
                assert_eq!(e.previous_status, PreorderStatus::Pending);
                assert_eq!(e.cancelled_by, customer);
            }
            _ => panic!("Expected PreorderCancelled event"),
        }
        assert_eq!(preorder.status(), PreorderStatus::Cancelled);

        assert!(matches!(
            cancel(&mut preorder, Actor::customer(customer)),
            Err(DomainError::InvalidTransition(_))
        ));
    }

    #[test]
    fn other_customer_sees_not_found() {
        let mut preorder = place(UserId::new(), 2, Availability::new(5, 0)).unwrap();
        assert!(matches!(
            cancel(&mut preorder, Actor::customer(UserId::new())),
            Err(DomainError::NotFound(_))
        ));
        assert_eq!(preorder.status(), PreorderStatus::Pending);
    }

    #[test]
    fn staff_cancels_confirmed() {
        let mut preorder = place(UserId::new(), 2, Availability::new(5, 0)).unwrap();
        let staff = Actor::staff(UserId::new());
        confirm(&mut preorder, staff).unwrap();
        cancel(&mut preorder, staff).unwrap();

        assert_eq!(preorder.status(), PreorderStatus::Cancelled);
        assert!(matches!(
            confirm(&mut preorder, staff),
            Err(DomainError::InvalidTransition(_))
        ));
    }

    #[test]
    fn unplaced_preorder_is_not_found() {
        let mut preorder = Preorder::empty(PreorderId::generate());
        assert!(matches!(
            cancel(&mut preorder, Actor::staff(UserId::new())),
            Err(DomainError::NotFound(_))
        ));
        assert!(preorder.snapshot().is_none());
    }

    #[test]
    fn snapshot_restore_preserves_state() {
        let mut preorder = place(UserId::new(), 4, Availability::new(5, 0)).unwrap();
        confirm(&mut preorder, Actor::staff(UserId::new())).unwrap();

        let snapshot = preorder.snapshot().unwrap();
        let restored = Preorder::restore(snapshot.clone());
        assert_eq!(restored, preorder);
        assert_eq!(restored.snapshot(), Some(snapshot));
    }

    #[test]
    fn status_parses_and_displays_upper_case() {
        assert_eq!("confirmed".parse::<PreorderStatus>().unwrap(), PreorderStatus::Confirmed);
        assert_eq!(PreorderStatus::Cancelled.to_string(), "CANCELLED");
        assert!("shipped".parse::<PreorderStatus>().is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Step {
            Place(i64),
            Confirm(usize),
            Cancel(usize),
        }

        fn step() -> impl Strategy<Value = Step> {
            prop_oneof![
                (-2i64..8).prop_map(Step::Place),
                (0usize..16).prop_map(Step::Confirm),
                (0usize..16).prop_map(Step::Cancel),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 300,
                ..ProptestConfig::default()
            })]

            /// Property: whatever sequence of lifecycle operations is accepted,
            /// active preorder quantities never exceed stock.
            #[test]
            fn active_quantity_never_exceeds_stock(
                stock in 0i64..30,
                steps in proptest::collection::vec(step(), 0..40),
            ) {
                let staff = Actor::staff(UserId::new());
                let mut preorders: Vec<Preorder> = Vec::new();

                for step in steps {
                    match step {
                        Step::Place(quantity) => {
                            let placed: Vec<PreorderSnapshot> =
                                preorders.iter().filter_map(Preorder::snapshot).collect();
                            let availability = Availability::from_preorders(stock, &placed);
                            if let Ok(p) = place(UserId::new(), quantity, availability) {
                                preorders.push(p);
                            }
                        }
                        Step::Confirm(i) if !preorders.is_empty() => {
                            let n = preorders.len();
                            let _ = confirm(&mut preorders[i % n], staff);
                        }
                        Step::Cancel(i) if !preorders.is_empty() => {
                            let n = preorders.len();
                            let _ = cancel(&mut preorders[i % n], staff);
                        }
                        _ => {}
                    }

                    let active: i64 = preorders
                        .iter()
                        .filter(|p| p.status().is_active())
                        .map(Preorder::quantity)
                        .sum();
                    prop_assert!(active <= stock);
                    prop_assert!(preorders.iter().all(|p| p.quantity() > 0));
                }
            }
        }
    }
}
