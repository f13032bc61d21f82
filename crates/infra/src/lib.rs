//! Infrastructure layer: storage backends, configuration and the
//! application services that tie the domain crates together.

pub mod config;
pub mod error;
pub mod seed;
pub mod services;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::{ServiceError, ServiceResult, StoreError};
pub use services::{
    NewPreorder, NewProduct, PreorderLifecycle, ProductMatch, Reports, Services, StockLedger,
    StockLevel, TopSellingProduct,
};
pub use store::{InMemoryStore, PostgresStore, Store, Transaction};

#[cfg(test)]
mod integration_tests;
