//! Relational order store.
//!
//! All access goes through a [`UnitOfWork`]: one database transaction that
//! either commits every change made through it or none of them. Dropping a
//! unit of work without calling [`UnitOfWork::commit`] rolls it back.

pub mod schema;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use novus_core::{ClientId, OrderId, ProductId};
use novus_inventory::Material;
use novus_orders::{Client, HistoryEntry, OrderRecord, OrderStatus};
use novus_products::{Product, ProductStatus};

pub use sqlite::SqliteStore;

/// Persistence failure. Any of these aborts the surrounding unit of work.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error in {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A uniqueness constraint rejected the write (e.g. material name).
    #[error("duplicate {0}")]
    Duplicate(String),

    /// A row targeted by an update does not exist.
    #[error("{0} does not exist")]
    Missing(String),

    /// A CHECK constraint rejected the write (e.g. stock below zero).
    #[error("constraint violated in {operation}: {message}")]
    Constraint {
        operation: &'static str,
        message: String,
    },

    /// A stored value could not be decoded into its domain type.
    #[error("corrupt {table} row: {detail}")]
    Corrupt { table: &'static str, detail: String },

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate(format!("{operation}: {}", db_err.message()));
        }
        if db_err.is_check_violation() || db_err.is_foreign_key_violation() {
            return StoreError::Constraint {
                operation,
                message: db_err.message().to_string(),
            };
        }
    }
    StoreError::Database {
        operation,
        source: err,
    }
}

/// Factory for units of work.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Open a new transaction.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}

/// Operations available inside one transaction.
#[async_trait]
pub trait UnitOfWork: Send {
    // Orders

    async fn get_order(&mut self, id: OrderId) -> Result<Option<OrderRecord>, StoreError>;

    /// Orders, newest first, optionally restricted to one status.
    async fn list_orders(
        &mut self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderRecord>, StoreError>;

    async fn insert_order(&mut self, order: &OrderRecord) -> Result<(), StoreError>;

    /// Overwrite name, quantity, deadline, snapshot and status.
    async fn update_order(&mut self, order: &OrderRecord) -> Result<(), StoreError>;

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus)
    -> Result<(), StoreError>;

    async fn delete_order(&mut self, id: OrderId) -> Result<(), StoreError>;

    // History

    async fn insert_history(&mut self, entry: &HistoryEntry) -> Result<(), StoreError>;

    /// History of one order, newest first.
    async fn list_history(&mut self, id: OrderId) -> Result<Vec<HistoryEntry>, StoreError>;

    async fn has_delivery_record(&mut self, id: OrderId) -> Result<bool, StoreError>;

    // Products

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Raw "materials per unit" text of a product.
    async fn get_product_materials(&mut self, id: ProductId)
    -> Result<Option<String>, StoreError>;

    async fn list_products(&mut self) -> Result<Vec<Product>, StoreError>;

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;

    async fn set_product_status(
        &mut self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<(), StoreError>;

    // Clients

    async fn get_client(&mut self, id: ClientId) -> Result<Option<Client>, StoreError>;

    async fn list_clients(&mut self) -> Result<Vec<Client>, StoreError>;

    async fn insert_client(&mut self, client: &Client) -> Result<(), StoreError>;

    // Materials

    async fn get_material(&mut self, name: &str) -> Result<Option<Material>, StoreError>;

    async fn list_materials(&mut self) -> Result<Vec<Material>, StoreError>;

    async fn insert_material(&mut self, material: &Material) -> Result<(), StoreError>;

    /// Available stock of a material; `None` when it has no inventory row.
    async fn get_stock(&mut self, material: &str) -> Result<Option<f64>, StoreError>;

    /// Decrement stock. Fails if the row is missing or would go negative.
    async fn deduct_stock(&mut self, material: &str, amount: f64) -> Result<(), StoreError>;

    async fn set_stock(&mut self, material: &str, available: f64) -> Result<(), StoreError>;

    // Completion

    /// Dropping a unit of work without committing rolls it back.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
