use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use eafoods_events::EventEnvelope;
use eafoods_infra::{StockLevel, TopSellingProduct};
use eafoods_preorders::{DeliverySlot, PreorderSnapshot, SlotLabel};
use eafoods_products::ProductSnapshot;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub unit_price: u64,
    #[serde(default)]
    pub initial_stock: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStockRequest {
    pub quantity: i64,
}

/// The product is given by id or by name, the slot by id or by label.
#[derive(Debug, Deserialize)]
pub struct CreatePreorderRequest {
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub slot_id: Option<String>,
    pub slot: Option<String>,
    /// An integer or a numeric string; missing means 0.
    pub quantity: Option<Value>,
    #[serde(default)]
    pub delivery_address: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SlotPreordersQuery {
    #[serde(default)]
    pub include_cancelled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResolveSlotRequest {
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct TopProductsQuery {
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub include_pending: Option<bool>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn product_to_json(p: &ProductSnapshot) -> Value {
    json!({
        "id": p.id.to_string(),
        "name": p.name,
        "description": p.description,
        "unit_price": p.unit_price,
        "stock": p.stock,
        "updated_at": p.updated_at,
        "version": p.version,
    })
}

pub fn product_ref_to_json(p: &ProductSnapshot) -> Value {
    json!({ "id": p.id.to_string(), "name": p.name })
}

pub fn stock_level_to_json(level: &StockLevel) -> Value {
    json!({
        "product_id": level.product_id.to_string(),
        "stock": level.stock,
        "reserved": level.reserved,
        "available": level.available,
    })
}

pub fn preorder_to_json(p: &PreorderSnapshot) -> Value {
    json!({
        "id": p.id.to_string(),
        "customer_id": p.customer_id.to_string(),
        "product_id": p.product_id.to_string(),
        "slot_id": p.slot_id.to_string(),
        "quantity": p.quantity,
        "delivery_address": p.delivery_address.as_str(),
        "status": p.status.as_str(),
        "created_at": p.created_at,
        "updated_at": p.updated_at,
    })
}

pub fn slot_to_json(slot: &DeliverySlot) -> Value {
    json!({
        "id": slot.id_typed().to_string(),
        "date": slot.date(),
        "label": slot.label().as_str(),
        "hours": slot.label().hours(),
    })
}

pub fn slot_label_to_json(label: SlotLabel) -> Value {
    json!({ "label": label.as_str(), "hours": label.hours() })
}

pub fn history_to_json(e: &EventEnvelope) -> Value {
    json!({
        "event_id": e.event_id().to_string(),
        "sequence_number": e.sequence_number(),
        "event_type": e.event_type(),
        "event_version": e.event_version(),
        "occurred_at": e.occurred_at(),
        "payload": e.payload(),
    })
}

pub fn top_product_to_json(row: &TopSellingProduct) -> Value {
    json!({
        "product_id": row.product_id.to_string(),
        "product_name": row.product_name,
        "total_quantity": row.total_quantity,
        "order_count": row.order_count,
    })
}
