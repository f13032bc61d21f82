//! Preorders domain module.
//!
//! Customer preorders against a delivery slot, with the
//! `PENDING → CONFIRMED → CANCELLED` lifecycle. Availability is derived
//! (stock minus active preorder quantities); stock is never decremented here.

pub mod actor;
pub mod address;
pub mod availability;
pub mod preorder;
pub mod slot;

pub use actor::{Actor, ActorKind};
pub use address::DeliveryAddress;
pub use availability::Availability;
pub use preorder::{
    CancelPreorder, ConfirmPreorder, PlacePreorder, Preorder, PreorderCancelled, PreorderCommand,
    PreorderConfirmed, PreorderEvent, PreorderId, PreorderPlaced, PreorderSnapshot, PreorderStatus,
};
pub use slot::{DeliverySchedule, DeliverySlot, SlotId, SlotLabel};
