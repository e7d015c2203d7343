//! Database schema, applied idempotently at startup.

/// Statements run in order by [`crate::store::SqliteStore::migrate`].
pub const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS materials (
        material_id  TEXT PRIMARY KEY,
        name         TEXT NOT NULL UNIQUE,
        available    REAL NOT NULL CHECK (available >= 0)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        product_id   TEXT PRIMARY KEY,
        name         TEXT NOT NULL,
        materials    TEXT NOT NULL,
        status       TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS clients (
        client_id    TEXT PRIMARY KEY,
        name         TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        order_id       TEXT PRIMARY KEY,
        name           TEXT NOT NULL,
        product_id     TEXT NOT NULL REFERENCES products(product_id),
        client_id      TEXT NOT NULL REFERENCES clients(client_id),
        quantity       INTEGER NOT NULL CHECK (quantity > 0),
        deadline       TEXT NOT NULL,
        required       TEXT NOT NULL,
        status         TEXT NOT NULL,
        created_at     TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_history (
        history_id   INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id     TEXT NOT NULL REFERENCES orders(order_id) ON DELETE CASCADE,
        status       TEXT NOT NULL,
        changed_by   TEXT NOT NULL,
        changed_by_name TEXT NOT NULL DEFAULT '',
        notes        TEXT NOT NULL,
        recorded_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS order_history_one_delivery
        ON order_history (order_id) WHERE status = 'Delivered'
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS orders_by_status ON orders (status, created_at)
    "#,
];
