//! Reporting module.
//!
//! Read-only aggregations over preorders. Nothing here touches storage; callers
//! pass in the preorders of the reporting period.

pub mod top_selling;

pub use top_selling::{ReportPolicy, TopSeller, top_selling};
