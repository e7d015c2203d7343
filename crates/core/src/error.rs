//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// One material that cannot cover an order's requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortage {
    pub material: String,
    pub required: f64,
    /// `None` when the material has no inventory record at all.
    pub available: Option<f64>,
}

impl core::fmt::Display for Shortage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.available {
            Some(have) => write!(f, "{}: need {}, have {}", self.material, self.required, have),
            None => write!(f, "{}: not found in inventory", self.material),
        }
    }
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// lifecycle rules, stock). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Missing or malformed user input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Approval rejected; lists every short material.
    #[error("insufficient materials: {}", format_shortages(.0))]
    InsufficientStock(Vec<Shortage>),

    /// The requested lifecycle transition is not allowed from the current state.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced order/product/client/material does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation was already applied (e.g. duplicate delivery).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The acting session lacks the required permission.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

fn format_shortages(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
}
