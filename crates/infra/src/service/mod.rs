//! Application services.
//!
//! Each operation authorizes the session, opens one unit of work, lets the
//! domain decide, writes the outcome and commits. An error at any step drops
//! the unit of work, which rolls everything back.

pub mod catalog;
pub mod orders;

use thiserror::Error;

use novus_auth::AuthzError;
use novus_core::{DomainError, Shortage};

use crate::store::StoreError;

pub use catalog::CatalogService;
pub use orders::{NewOrder, OrderChanges, OrderService};

/// User-visible failure of a service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("not enough materials in stock: {}", list_shortages(.0))]
    InsufficientStock(Vec<Shortage>),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Store(StoreError),
}

fn list_shortages(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ServiceError {
    /// Short machine-readable kind, used for log fields and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation",
            ServiceError::InsufficientStock(_) => "insufficient_stock",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::InvalidTransition(_) => "invalid_transition",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Unauthorized(_) => "unauthorized",
            ServiceError::Store(_) => "store",
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                ServiceError::Validation(msg)
            }
            DomainError::InsufficientStock(shortages) => ServiceError::InsufficientStock(shortages),
            DomainError::InvalidTransition(msg) => ServiceError::InvalidTransition(msg),
            DomainError::NotFound(what) => ServiceError::NotFound(what),
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::Unauthorized(msg) => ServiceError::Unauthorized(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Missing(what) => ServiceError::NotFound(what),
            StoreError::Duplicate(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Store(other),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        ServiceError::Unauthorized(value.to_string())
    }
}
