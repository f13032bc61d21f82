//! Products domain module: catalog records and the stock ledger rules.
//!
//! Pure, deterministic domain logic (no IO, no HTTP, no storage). The stock
//! quantity of a product may only be replaced inside the configured
//! [`StockUpdateWindow`].

pub mod product;
pub mod window;

pub use product::{
    Product, ProductCommand, ProductEvent, ProductId, ProductRegistered, ProductSnapshot,
    RegisterProduct, StockUpdated, UpdateStock,
};
pub use window::{StockUpdateWindow, TimeRange, parse_utc_offset};
