//! Persistence boundary.
//!
//! Services open one [`Transaction`] per operation. A transaction that is
//! dropped without [`Transaction::commit`] rolls back, so an early `?` return
//! leaves no partial writes.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use r#trait::{Store, Transaction};
