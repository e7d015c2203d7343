//! Raw material entity.

use serde::{Deserialize, Serialize};

use novus_core::{DomainError, DomainResult, Entity, MaterialId};

/// A raw material and its available stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    id: MaterialId,
    name: String,
    available: f64,
}

impl Material {
    /// Register a new material with an opening stock level.
    pub fn new(id: MaterialId, name: &str, available: f64) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("material name cannot be empty"));
        }
        ensure_stock_value(available)?;
        Ok(Self {
            id,
            name: name.to_string(),
            available,
        })
    }

    /// Rebuild from a stored row (values already validated on the way in).
    pub fn restore(id: MaterialId, name: String, available: f64) -> Self {
        Self {
            id,
            name,
            available,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn available(&self) -> f64 {
        self.available
    }

    /// Add received stock.
    pub fn restock(&mut self, amount: f64) -> DomainResult<()> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(DomainError::validation("restock amount must be positive"));
        }
        let total = self.available + amount;
        ensure_stock_value(total)?;
        self.available = total;
        Ok(())
    }
}

impl Entity for Material {
    type Id = MaterialId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

fn ensure_stock_value(value: f64) -> DomainResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::validation("stock must be a finite, non-negative amount"));
    }
    Ok(())
}
