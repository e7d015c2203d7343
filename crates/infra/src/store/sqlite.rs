//! SQLite-backed order store.
//!
//! ## Transactions
//!
//! Every [`SqliteUnitOfWork`] wraps one `sqlx` transaction. `sqlx` rolls a
//! transaction back when it is dropped uncommitted, so an error returned
//! half-way through an operation never leaves partial writes behind.
//!
//! ## In-memory databases
//!
//! Each SQLite connection to `:memory:` gets its own private database, so
//! in-memory stores are pinned to a single long-lived connection.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::instrument;

use novus_core::{ClientId, MaterialId, OrderId, ProductId, UserId};
use novus_inventory::{Material, Quantity, RequiredMaterials};
use novus_orders::{Client, HistoryEntry, OrderRecord, OrderStatus};
use novus_products::{Product, ProductStatus};

use super::schema::MIGRATIONS;
use super::{Repository, StoreError, UnitOfWork, map_sqlx_error};

const DEADLINE_FORMAT: &str = "%Y-%m-%d";

/// SQLite connection pool plus schema management.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and apply the schema.
    #[instrument(skip_all, fields(url = %url), err)]
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| map_sqlx_error("parse_database_url", e))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if is_in_memory(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections.max(1))
                .connect_with(options)
                .await
        }
        .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::debug!("sqlite store ready");
        Ok(store)
    }

    /// Fresh private database, used by tests and `--database sqlite::memory:`.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Apply the schema. Safe to run repeatedly.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_migration", e))?;
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_migration", e))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub(crate) fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[async_trait]
impl Repository for SqliteStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(SqliteUnitOfWork { tx }))
    }
}

/// One open SQLite transaction.
pub struct SqliteUnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn get_order(&mut self, id: OrderId) -> Result<Option<OrderRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT order_id, name, product_id, client_id, quantity, deadline,
                   required, status, created_at
            FROM orders
            WHERE order_id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_order", e))?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn list_orders(
        &mut self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, name, product_id, client_id, quantity, deadline,
                   required, status, created_at
            FROM orders
            WHERE ?1 IS NULL OR status = ?1
            ORDER BY created_at DESC, order_id DESC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;

        rows.iter().map(order_from_row).collect()
    }

    async fn insert_order(&mut self, order: &OrderRecord) -> Result<(), StoreError> {
        let required = order
            .required
            .to_json()
            .map_err(|source| StoreError::Serialize {
                what: "required materials",
                source,
            })?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                order_id, name, product_id, client_id, quantity, deadline,
                required, status, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(order.id.to_string())
        .bind(&order.name)
        .bind(order.product_id.to_string())
        .bind(order.client_id.to_string())
        .bind(i64::from(order.quantity.get()))
        .bind(order.deadline.format(DEADLINE_FORMAT).to_string())
        .bind(required)
        .bind(order.status.as_str())
        .bind(format_timestamp(order.created_at))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        Ok(())
    }

    async fn update_order(&mut self, order: &OrderRecord) -> Result<(), StoreError> {
        let required = order
            .required
            .to_json()
            .map_err(|source| StoreError::Serialize {
                what: "required materials",
                source,
            })?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET name = ?2, product_id = ?3, client_id = ?4, quantity = ?5, deadline = ?6,
                required = ?7, status = ?8
            WHERE order_id = ?1
            "#,
        )
        .bind(order.id.to_string())
        .bind(&order.name)
        .bind(order.product_id.to_string())
        .bind(order.client_id.to_string())
        .bind(i64::from(order.quantity.get()))
        .bind(order.deadline.format(DEADLINE_FORMAT).to_string())
        .bind(required)
        .bind(order.status.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;

        ensure_one_row(result.rows_affected(), || format!("order {}", order.id))
    }

    async fn set_order_status(
        &mut self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE orders SET status = ?2 WHERE order_id = ?1")
            .bind(id.to_string())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_order_status", e))?;

        ensure_one_row(result.rows_affected(), || format!("order {id}"))
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM orders WHERE order_id = ?1")
            .bind(id.to_string())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_order", e))?;

        ensure_one_row(result.rows_affected(), || format!("order {id}"))
    }

    async fn insert_history(&mut self, entry: &HistoryEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO order_history
                (order_id, status, changed_by, changed_by_name, notes, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(entry.order_id.to_string())
        .bind(entry.status.as_str())
        .bind(entry.changed_by.to_string())
        .bind(&entry.changed_by_name)
        .bind(&entry.notes)
        .bind(format_timestamp(entry.recorded_at))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_history", e))?;

        Ok(())
    }

    async fn list_history(&mut self, id: OrderId) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, status, changed_by, changed_by_name, notes, recorded_at
            FROM order_history
            WHERE order_id = ?1
            ORDER BY recorded_at DESC, history_id DESC
            "#,
        )
        .bind(id.to_string())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_history", e))?;

        rows.iter().map(history_from_row).collect()
    }

    async fn has_delivery_record(&mut self, id: OrderId) -> Result<bool, StoreError> {
        let found: i64 = sqlx::query_scalar::<Sqlite, i64>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM order_history WHERE order_id = ?1 AND status = 'Delivered'
            )
            "#,
        )
        .bind(id.to_string())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("has_delivery_record", e))?;

        Ok(found != 0)
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            "SELECT product_id, name, materials, status FROM products WHERE product_id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn get_product_materials(
        &mut self,
        id: ProductId,
    ) -> Result<Option<String>, StoreError> {
        sqlx::query_scalar::<Sqlite, String>("SELECT materials FROM products WHERE product_id = ?1")
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_product_materials", e))
    }

    async fn list_products(&mut self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            "SELECT product_id, name, materials, status FROM products ORDER BY name, product_id",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        use novus_core::Entity;

        sqlx::query(
            "INSERT INTO products (product_id, name, materials, status) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(product.id().to_string())
        .bind(product.name())
        .bind(product.materials())
        .bind(product.status().as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        Ok(())
    }

    async fn set_product_status(
        &mut self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE products SET status = ?2 WHERE product_id = ?1")
            .bind(id.to_string())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_product_status", e))?;

        ensure_one_row(result.rows_affected(), || format!("product {id}"))
    }

    async fn get_client(&mut self, id: ClientId) -> Result<Option<Client>, StoreError> {
        let row = sqlx::query("SELECT client_id, name FROM clients WHERE client_id = ?1")
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_client", e))?;

        row.as_ref().map(client_from_row).transpose()
    }

    async fn list_clients(&mut self) -> Result<Vec<Client>, StoreError> {
        let rows = sqlx::query("SELECT client_id, name FROM clients ORDER BY name, client_id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_clients", e))?;

        rows.iter().map(client_from_row).collect()
    }

    async fn insert_client(&mut self, client: &Client) -> Result<(), StoreError> {
        use novus_core::Entity;

        sqlx::query("INSERT INTO clients (client_id, name) VALUES (?1, ?2)")
            .bind(client.id().to_string())
            .bind(client.name())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_client", e))?;

        Ok(())
    }

    async fn get_material(&mut self, name: &str) -> Result<Option<Material>, StoreError> {
        let row = sqlx::query("SELECT material_id, name, available FROM materials WHERE name = ?1")
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_material", e))?;

        row.as_ref().map(material_from_row).transpose()
    }

    async fn list_materials(&mut self) -> Result<Vec<Material>, StoreError> {
        let rows = sqlx::query("SELECT material_id, name, available FROM materials ORDER BY name")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_materials", e))?;

        rows.iter().map(material_from_row).collect()
    }

    async fn insert_material(&mut self, material: &Material) -> Result<(), StoreError> {
        use novus_core::Entity;

        sqlx::query("INSERT INTO materials (material_id, name, available) VALUES (?1, ?2, ?3)")
            .bind(material.id().to_string())
            .bind(material.name())
            .bind(material.available())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_material", e))?;

        Ok(())
    }

    async fn get_stock(&mut self, material: &str) -> Result<Option<f64>, StoreError> {
        sqlx::query_scalar::<Sqlite, f64>("SELECT available FROM materials WHERE name = ?1")
            .bind(material)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_stock", e))
    }

    async fn deduct_stock(&mut self, material: &str, amount: f64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE materials SET available = available - ?2 WHERE name = ?1")
            .bind(material)
            .bind(amount)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("deduct_stock", e))?;

        ensure_one_row(result.rows_affected(), || format!("material '{material}'"))
    }

    async fn set_stock(&mut self, material: &str, available: f64) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE materials SET available = ?2 WHERE name = ?1")
            .bind(material)
            .bind(available)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_stock", e))?;

        ensure_one_row(result.rows_affected(), || format!("material '{material}'"))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

fn ensure_one_row(rows_affected: u64, what: impl FnOnce() -> String) -> Result<(), StoreError> {
    if rows_affected == 0 {
        return Err(StoreError::Missing(what()));
    }
    Ok(())
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn corrupt(table: &'static str, detail: impl core::fmt::Display) -> StoreError {
    StoreError::Corrupt {
        table,
        detail: detail.to_string(),
    }
}

fn get<'r, T>(row: &'r SqliteRow, table: &'static str, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(column)
        .map_err(|e| corrupt(table, format!("column {column}: {e}")))
}

fn parse_timestamp(table: &'static str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(table, format!("timestamp '{raw}': {e}")))
}

fn order_from_row(row: &SqliteRow) -> Result<OrderRecord, StoreError> {
    const TABLE: &str = "orders";

    let id: String = get(row, TABLE, "order_id")?;
    let product_id: String = get(row, TABLE, "product_id")?;
    let client_id: String = get(row, TABLE, "client_id")?;
    let quantity: i64 = get(row, TABLE, "quantity")?;
    let deadline: String = get(row, TABLE, "deadline")?;
    let required: String = get(row, TABLE, "required")?;
    let status: String = get(row, TABLE, "status")?;
    let created_at: String = get(row, TABLE, "created_at")?;

    let quantity = u32::try_from(quantity)
        .map_err(|e| corrupt(TABLE, e))
        .and_then(|q| Quantity::new(q).map_err(|e| corrupt(TABLE, e)))?;

    Ok(OrderRecord {
        id: OrderId::from_str(&id).map_err(|e| corrupt(TABLE, e))?,
        name: get(row, TABLE, "name")?,
        product_id: ProductId::from_str(&product_id).map_err(|e| corrupt(TABLE, e))?,
        client_id: ClientId::from_str(&client_id).map_err(|e| corrupt(TABLE, e))?,
        quantity,
        deadline: NaiveDate::parse_from_str(&deadline, DEADLINE_FORMAT)
            .map_err(|e| corrupt(TABLE, format!("deadline '{deadline}': {e}")))?,
        required: RequiredMaterials::from_json(&required)
            .map_err(|e| corrupt(TABLE, format!("required materials: {e}")))?,
        status: OrderStatus::from_str(&status).map_err(|e| corrupt(TABLE, e))?,
        created_at: parse_timestamp(TABLE, &created_at)?,
    })
}

fn history_from_row(row: &SqliteRow) -> Result<HistoryEntry, StoreError> {
    const TABLE: &str = "order_history";

    let order_id: String = get(row, TABLE, "order_id")?;
    let status: String = get(row, TABLE, "status")?;
    let changed_by: String = get(row, TABLE, "changed_by")?;
    let recorded_at: String = get(row, TABLE, "recorded_at")?;

    Ok(HistoryEntry {
        order_id: OrderId::from_str(&order_id).map_err(|e| corrupt(TABLE, e))?,
        status: OrderStatus::from_str(&status).map_err(|e| corrupt(TABLE, e))?,
        changed_by: UserId::from_str(&changed_by).map_err(|e| corrupt(TABLE, e))?,
        changed_by_name: get(row, TABLE, "changed_by_name")?,
        notes: get(row, TABLE, "notes")?,
        recorded_at: parse_timestamp(TABLE, &recorded_at)?,
    })
}

fn product_from_row(row: &SqliteRow) -> Result<Product, StoreError> {
    const TABLE: &str = "products";

    let id: String = get(row, TABLE, "product_id")?;
    let status: String = get(row, TABLE, "status")?;

    Ok(Product::restore(
        ProductId::from_str(&id).map_err(|e| corrupt(TABLE, e))?,
        get(row, TABLE, "name")?,
        get(row, TABLE, "materials")?,
        ProductStatus::from_str(&status).map_err(|e| corrupt(TABLE, e))?,
    ))
}

fn client_from_row(row: &SqliteRow) -> Result<Client, StoreError> {
    const TABLE: &str = "clients";

    let id: String = get(row, TABLE, "client_id")?;
    Ok(Client::restore(
        ClientId::from_str(&id).map_err(|e| corrupt(TABLE, e))?,
        get(row, TABLE, "name")?,
    ))
}

fn material_from_row(row: &SqliteRow) -> Result<Material, StoreError> {
    const TABLE: &str = "materials";

    let id: String = get(row, TABLE, "material_id")?;
    Ok(Material::restore(
        MaterialId::from_str(&id).map_err(|e| corrupt(TABLE, e))?,
        get(row, TABLE, "name")?,
        get(row, TABLE, "available")?,
    ))
}
