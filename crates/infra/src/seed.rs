//! Demo catalogue for local runs.

use chrono::{DateTime, Utc};

use crate::error::ServiceResult;
use crate::services::{NewProduct, StockLedger};
use crate::store::Store;

pub const DEMO_PRODUCTS: [(&str, u64); 7] = [
    ("Apple", 120),
    ("Banana", 60),
    ("Carrot", 80),
    ("Tomato", 150),
    ("Milk", 250),
    ("Bread", 300),
    ("Eggs", 400),
];

pub const DEMO_STOCK: i64 = 50;

/// Register the demo products that do not exist yet. Returns how many were added.
pub async fn seed_demo_catalog<S: Store>(
    ledger: &StockLedger<S>,
    now: DateTime<Utc>,
) -> ServiceResult<usize> {
    let existing: Vec<String> = ledger
        .list_products()
        .await?
        .into_iter()
        .map(|p| p.name.to_lowercase())
        .collect();

    let mut added = 0;
    for (name, unit_price) in DEMO_PRODUCTS {
        if existing.contains(&name.to_lowercase()) {
            continue;
        }
        ledger
            .register_product(
                NewProduct {
                    name: name.to_string(),
                    description: None,
                    unit_price,
                    initial_stock: DEMO_STOCK,
                },
                now,
            )
            .await?;
        added += 1;
    }

    tracing::info!(added, "demo catalogue seeded");
    Ok(added)
}
