//! Infrastructure layer: SQLite order store, configuration, and the
//! application services that run domain decisions inside transactions.

pub mod config;
pub mod service;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use service::{CatalogService, NewOrder, OrderChanges, OrderService, ServiceError};
pub use store::{Repository, SqliteStore, StoreError, UnitOfWork};
