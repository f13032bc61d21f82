//! Domain events and the envelopes they are recorded in.
//!
//! Products and preorders are persisted as snapshots; every accepted change is
//! additionally appended to an audit history as an [`EventEnvelope`].

pub mod envelope;
pub mod event;

pub use envelope::{EnvelopeError, EventEnvelope};
pub use event::Event;
