//! Postgres-backed store.
//!
//! Every [`Transaction`] wraps one `sqlx` transaction. `lock_*` reads use
//! `SELECT ... FOR UPDATE`. Dropping an uncommitted `sqlx::Transaction` rolls
//! it back.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any other | `Backend` |
//! | Decode / ColumnNotFound | N/A | `Corrupt` |
//! | Other | N/A | `Backend` |

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row};
use tracing::instrument;
use uuid::Uuid;

use eafoods_core::{AggregateId, UserId};
use eafoods_events::EventEnvelope;
use eafoods_preorders::{
    DeliveryAddress, DeliverySlot, PreorderId, PreorderSnapshot, PreorderStatus, SlotId, SlotLabel,
};
use eafoods_products::{ProductId, ProductSnapshot};

use super::r#trait::{Store, Transaction};
use crate::error::StoreError;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        unit_price BIGINT NOT NULL CHECK (unit_price >= 0),
        stock BIGINT NOT NULL CHECK (stock >= 0),
        updated_at TIMESTAMPTZ NOT NULL,
        version BIGINT NOT NULL
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS products_name_key ON products (lower(name))",
    r#"
    CREATE TABLE IF NOT EXISTS delivery_slots (
        id UUID PRIMARY KEY,
        delivery_date DATE NOT NULL,
        label TEXT NOT NULL,
        UNIQUE (delivery_date, label)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS preorders (
        id UUID PRIMARY KEY,
        customer_id UUID NOT NULL,
        product_id UUID NOT NULL REFERENCES products (id),
        slot_id UUID NOT NULL REFERENCES delivery_slots (id),
        quantity BIGINT NOT NULL CHECK (quantity > 0),
        delivery_address TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        version BIGINT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS preorders_product_idx ON preorders (product_id)",
    "CREATE INDEX IF NOT EXISTS preorders_slot_idx ON preorders (slot_id, created_at)",
    "CREATE INDEX IF NOT EXISTS preorders_created_idx ON preorders (created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS history (
        event_id UUID PRIMARY KEY,
        aggregate_id UUID NOT NULL,
        aggregate_type TEXT NOT NULL,
        sequence_number BIGINT NOT NULL CHECK (sequence_number > 0),
        event_type TEXT NOT NULL,
        event_version INTEGER NOT NULL,
        occurred_at TIMESTAMPTZ NOT NULL,
        payload JSONB NOT NULL,
        UNIQUE (aggregate_id, sequence_number)
    )
    "#,
];

const PRODUCT_COLUMNS: &str = "id, name, description, unit_price, stock, updated_at, version";
const PREORDER_COLUMNS: &str = "id, customer_id, product_id, slot_id, quantity, delivery_address, \
                                status, created_at, updated_at, version";

/// Postgres-backed [`Store`].
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if missing.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PostgresTransaction { tx })
    }
}

pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn fetch_products(
        &mut self,
        operation: &str,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<ProductSnapshot>, StoreError> {
        let rows = query
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(product_from_row).collect()
    }

    async fn fetch_preorders(
        &mut self,
        operation: &str,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<PreorderSnapshot>, StoreError> {
        let rows = query
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(preorder_from_row).collect()
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn product(&mut self, id: ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let found = self
            .fetch_products("product", sqlx::query(&sql).bind(*id.0.as_uuid()))
            .await?;
        Ok(found.into_iter().next())
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<ProductSnapshot>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let found = self
            .fetch_products("lock_product", sqlx::query(&sql).bind(*id.0.as_uuid()))
            .await?;
        Ok(found.into_iter().next())
    }

    async fn products(&mut self) -> Result<Vec<ProductSnapshot>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY lower(name), id");
        self.fetch_products("products", sqlx::query(&sql)).await
    }

    async fn product_by_name(&mut self, name: &str) -> Result<Option<ProductSnapshot>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE lower(name) = lower($1)");
        let found = self
            .fetch_products("product_by_name", sqlx::query(&sql).bind(name.trim()))
            .await?;
        Ok(found.into_iter().next())
    }

    async fn products_matching(&mut self, fragment: &str) -> Result<Vec<ProductSnapshot>, StoreError> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE strpos(lower(name), lower($1)) > 0 ORDER BY lower(name), id"
        );
        self.fetch_products("products_matching", sqlx::query(&sql).bind(fragment.trim()))
            .await
    }

    async fn save_product(&mut self, product: &ProductSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, unit_price, stock, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                unit_price = EXCLUDED.unit_price,
                stock = EXCLUDED.stock,
                updated_at = EXCLUDED.updated_at,
                version = EXCLUDED.version
            "#,
        )
        .bind(*product.id.0.as_uuid())
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(to_i64("unit_price", product.unit_price)?)
        .bind(product.stock)
        .bind(product.updated_at)
        .bind(to_i64("version", product.version)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_product", e))?;
        Ok(())
    }

    async fn slot(&mut self, id: SlotId) -> Result<Option<DeliverySlot>, StoreError> {
        let row = sqlx::query("SELECT id, delivery_date, label FROM delivery_slots WHERE id = $1")
            .bind(*id.0.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("slot", e))?;
        row.as_ref().map(slot_from_row).transpose()
    }

    async fn slot_by(
        &mut self,
        date: NaiveDate,
        label: SlotLabel,
    ) -> Result<Option<DeliverySlot>, StoreError> {
        let row = sqlx::query(
            "SELECT id, delivery_date, label FROM delivery_slots \
             WHERE delivery_date = $1 AND label = $2",
        )
        .bind(date)
        .bind(label.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("slot_by", e))?;
        row.as_ref().map(slot_from_row).transpose()
    }

    async fn insert_slot(&mut self, slot: &DeliverySlot) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO delivery_slots (id, delivery_date, label) VALUES ($1, $2, $3) \
             ON CONFLICT (delivery_date, label) DO NOTHING",
        )
        .bind(*slot.id_typed().0.as_uuid())
        .bind(slot.date())
        .bind(slot.label().as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_slot", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "slot {} {} already exists",
                slot.date(),
                slot.label()
            )));
        }
        Ok(())
    }

    async fn preorder(&mut self, id: PreorderId) -> Result<Option<PreorderSnapshot>, StoreError> {
        let sql = format!("SELECT {PREORDER_COLUMNS} FROM preorders WHERE id = $1");
        let found = self
            .fetch_preorders("preorder", sqlx::query(&sql).bind(*id.0.as_uuid()))
            .await?;
        Ok(found.into_iter().next())
    }

    async fn lock_preorder(
        &mut self,
        id: PreorderId,
    ) -> Result<Option<PreorderSnapshot>, StoreError> {
        let sql = format!("SELECT {PREORDER_COLUMNS} FROM preorders WHERE id = $1 FOR UPDATE");
        let found = self
            .fetch_preorders("lock_preorder", sqlx::query(&sql).bind(*id.0.as_uuid()))
            .await?;
        Ok(found.into_iter().next())
    }

    async fn save_preorder(&mut self, preorder: &PreorderSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO preorders (
                id, customer_id, product_id, slot_id, quantity, delivery_address,
                status, created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at,
                version = EXCLUDED.version
            "#,
        )
        .bind(*preorder.id.0.as_uuid())
        .bind(*preorder.customer_id.as_uuid())
        .bind(*preorder.product_id.0.as_uuid())
        .bind(*preorder.slot_id.0.as_uuid())
        .bind(preorder.quantity)
        .bind(preorder.delivery_address.as_str())
        .bind(preorder.status.as_str())
        .bind(preorder.created_at)
        .bind(preorder.updated_at)
        .bind(to_i64("version", preorder.version)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_preorder", e))?;
        Ok(())
    }

    async fn preorders_for_product(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<PreorderSnapshot>, StoreError> {
        let sql = format!("SELECT {PREORDER_COLUMNS} FROM preorders WHERE product_id = $1");
        self.fetch_preorders(
            "preorders_for_product",
            sqlx::query(&sql).bind(*product_id.0.as_uuid()),
        )
        .await
    }

    async fn preorders_for_slot(
        &mut self,
        slot_id: SlotId,
    ) -> Result<Vec<PreorderSnapshot>, StoreError> {
        let sql = format!(
            "SELECT {PREORDER_COLUMNS} FROM preorders WHERE slot_id = $1 ORDER BY created_at, id"
        );
        self.fetch_preorders("preorders_for_slot", sqlx::query(&sql).bind(*slot_id.0.as_uuid()))
            .await
    }

    async fn preorders_created_between(
        &mut self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<PreorderSnapshot>, StoreError> {
        let sql = format!(
            "SELECT {PREORDER_COLUMNS} FROM preorders WHERE created_at BETWEEN $1 AND $2"
        );
        self.fetch_preorders(
            "preorders_created_between",
            sqlx::query(&sql).bind(since).bind(until),
        )
        .await
    }

    async fn append_history(&mut self, records: &[EventEnvelope]) -> Result<(), StoreError> {
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO history (
                    event_id, aggregate_id, aggregate_type, sequence_number,
                    event_type, event_version, occurred_at, payload
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(record.event_id())
            .bind(*record.aggregate_id().as_uuid())
            .bind(record.aggregate_type())
            .bind(to_i64("sequence_number", record.sequence_number())?)
            .bind(record.event_version() as i32)
            .bind(record.occurred_at())
            .bind(record.payload())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("append_history", e))?;
        }
        Ok(())
    }

    async fn history(&mut self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, aggregate_id, aggregate_type, sequence_number,
                   event_type, event_version, occurred_at, payload
            FROM history
            WHERE aggregate_id = $1
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(*aggregate_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("history", e))?;

        rows.iter()
            .map(|row| {
                let row = HistoryRow::from_row(row)
                    .map_err(|e| StoreError::Corrupt(format!("history row: {e}")))?;
                EventEnvelope::try_from(row)
            })
            .collect()
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }
}

struct HistoryRow {
    event_id: Uuid,
    aggregate_id: Uuid,
    aggregate_type: String,
    sequence_number: i64,
    event_type: String,
    event_version: i32,
    occurred_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl<'r> FromRow<'r, PgRow> for HistoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            event_id: row.try_get("event_id")?,
            aggregate_id: row.try_get("aggregate_id")?,
            aggregate_type: row.try_get("aggregate_type")?,
            sequence_number: row.try_get("sequence_number")?,
            event_type: row.try_get("event_type")?,
            event_version: row.try_get("event_version")?,
            occurred_at: row.try_get("occurred_at")?,
            payload: row.try_get("payload")?,
        })
    }
}

impl TryFrom<HistoryRow> for EventEnvelope {
    type Error = StoreError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        Ok(EventEnvelope::from_parts(
            row.event_id,
            AggregateId::from_uuid(row.aggregate_id),
            row.aggregate_type,
            from_i64("sequence_number", row.sequence_number)?,
            row.event_type,
            u32::try_from(row.event_version)
                .map_err(|_| StoreError::Corrupt(format!("event_version {}", row.event_version)))?,
            row.occurred_at,
            row.payload,
        ))
    }
}

fn product_from_row(row: &PgRow) -> Result<ProductSnapshot, StoreError> {
    let corrupt = |e: sqlx::Error| StoreError::Corrupt(format!("product row: {e}"));
    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    Ok(ProductSnapshot {
        id: ProductId::new(AggregateId::from_uuid(id)),
        name: row.try_get("name").map_err(corrupt)?,
        description: row.try_get("description").map_err(corrupt)?,
        unit_price: from_i64("unit_price", row.try_get("unit_price").map_err(corrupt)?)?,
        stock: row.try_get("stock").map_err(corrupt)?,
        updated_at: row.try_get("updated_at").map_err(corrupt)?,
        version: from_i64("version", row.try_get("version").map_err(corrupt)?)?,
    })
}

fn slot_from_row(row: &PgRow) -> Result<DeliverySlot, StoreError> {
    let corrupt = |e: sqlx::Error| StoreError::Corrupt(format!("slot row: {e}"));
    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let label: String = row.try_get("label").map_err(corrupt)?;
    Ok(DeliverySlot::new(
        SlotId::new(AggregateId::from_uuid(id)),
        row.try_get("delivery_date").map_err(corrupt)?,
        label
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("slot label: {e}")))?,
    ))
}

fn preorder_from_row(row: &PgRow) -> Result<PreorderSnapshot, StoreError> {
    let corrupt = |e: sqlx::Error| StoreError::Corrupt(format!("preorder row: {e}"));
    let id: Uuid = row.try_get("id").map_err(corrupt)?;
    let customer_id: Uuid = row.try_get("customer_id").map_err(corrupt)?;
    let product_id: Uuid = row.try_get("product_id").map_err(corrupt)?;
    let slot_id: Uuid = row.try_get("slot_id").map_err(corrupt)?;
    let address: String = row.try_get("delivery_address").map_err(corrupt)?;
    let status: String = row.try_get("status").map_err(corrupt)?;

    Ok(PreorderSnapshot {
        id: PreorderId::new(AggregateId::from_uuid(id)),
        customer_id: UserId::from_uuid(customer_id),
        product_id: ProductId::new(AggregateId::from_uuid(product_id)),
        slot_id: SlotId::new(AggregateId::from_uuid(slot_id)),
        quantity: row.try_get("quantity").map_err(corrupt)?,
        delivery_address: DeliveryAddress::parse(&address)
            .map_err(|e| StoreError::Corrupt(format!("delivery address: {e}")))?,
        status: status
            .parse::<PreorderStatus>()
            .map_err(|e| StoreError::Corrupt(format!("preorder status: {e}")))?,
        created_at: row.try_get("created_at").map_err(corrupt)?,
        updated_at: row.try_get("updated_at").map_err(corrupt)?,
        version: from_i64("version", row.try_get("version").map_err(corrupt)?)?,
    })
}

fn to_i64(column: &str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} {value} out of range")))
}

fn from_i64(column: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} {value} is negative")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("{operation}: {err}"))
        }
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
