use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use eafoods_core::{Aggregate, AggregateRoot, DomainError, typed_id};
use eafoods_events::Event;

typed_id!(
    /// Product identifier.
    ProductId
);

/// Aggregate root: Product (catalog record + current stock quantity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    description: Option<String>,
    unit_price: u64,
    stock: i64,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    registered: bool,
}

/// Persisted form of a [`Product`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
    pub stock: i64,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Product {
    /// Create an empty, not-yet-registered instance.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            name: String::new(),
            description: None,
            unit_price: 0,
            stock: 0,
            updated_at: None,
            version: 0,
            registered: false,
        }
    }

    /// Rebuild a registered product from storage.
    pub fn restore(snapshot: ProductSnapshot) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name,
            description: snapshot.description,
            unit_price: snapshot.unit_price,
            stock: snapshot.stock,
            updated_at: Some(snapshot.updated_at),
            version: snapshot.version,
            registered: true,
        }
    }

    /// Persisted form. `None` until the product has been registered.
    pub fn snapshot(&self) -> Option<ProductSnapshot> {
        if !self.registered {
            return None;
        }
        Some(ProductSnapshot {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            unit_price: self.unit_price,
            stock: self.stock,
            updated_at: self.updated_at.unwrap_or_default(),
            version: self.version,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn unit_price(&self) -> u64 {
        self.unit_price
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterProduct {
    pub product_id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: u64,
    pub initial_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateStock (replace the quantity).
///
/// The time-window rule is enforced by the ledger before the product is loaded;
/// this command only validates the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStock {
    pub product_id: ProductId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    RegisterProduct(RegisterProduct),
    UpdateStock(UpdateStock),
}

/// Event: ProductRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRegistered {
    pub product_id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: u64,
    pub initial_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdated {
    pub product_id: ProductId,
    pub previous: i64,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductRegistered(ProductRegistered),
    StockUpdated(StockUpdated),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductRegistered(_) => "products.product.registered",
            ProductEvent::StockUpdated(_) => "products.product.stock_updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductRegistered(e) => e.occurred_at,
            ProductEvent::StockUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductRegistered(e) => {
                self.id = e.product_id;
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.unit_price = e.unit_price;
                self.stock = e.initial_stock;
                self.updated_at = Some(e.occurred_at);
                self.registered = true;
            }
            ProductEvent::StockUpdated(e) => {
                self.stock = e.quantity;
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::RegisterProduct(cmd) => self.handle_register(cmd),
            ProductCommand::UpdateStock(cmd) => self.handle_update_stock(cmd),
        }
    }
}

impl Product {
    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::validation("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.registered {
            return Err(DomainError::conflict("product already exists"));
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.initial_stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }

        let description = cmd
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Ok(vec![ProductEvent::ProductRegistered(ProductRegistered {
            product_id: cmd.product_id,
            name: name.to_string(),
            description,
            unit_price: cmd.unit_price,
            initial_stock: cmd.initial_stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_stock(&self, cmd: &UpdateStock) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.registered {
            return Err(DomainError::not_found(format!("product {}", cmd.product_id)));
        }
        self.ensure_product_id(cmd.product_id)?;

        if cmd.quantity < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }

        Ok(vec![ProductEvent::StockUpdated(StockUpdated {
            product_id: cmd.product_id,
            previous: self.stock,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }
}
