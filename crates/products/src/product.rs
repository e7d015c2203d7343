use core::str::FromStr;

use serde::{Deserialize, Serialize};

use novus_core::{DomainError, DomainResult, Entity, ProductId};
use novus_inventory::{Quantity, RequiredMaterials, requirements_from_text};

/// Product review status. Only approved products can go into production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    Pending,
    Approved,
    Cancelled,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Pending => "Pending",
            ProductStatus::Approved => "Approved",
            ProductStatus::Cancelled => "Cancelled",
        }
    }

    /// Orders for a product may only be approved once the product is.
    pub fn allows_production(self) -> bool {
        self == ProductStatus::Approved
    }
}

impl core::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ProductStatus::Pending),
            "approved" => Ok(ProductStatus::Approved),
            "cancelled" | "canceled" => Ok(ProductStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown product status '{other}' (expected pending, approved or cancelled)"
            ))),
        }
    }
}

/// A manufactured product.
///
/// The materials field is kept as entered and parsed on demand, so edits to
/// it never touch orders that were already placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    materials: String,
    status: ProductStatus,
}

impl Product {
    /// Register a new product; it starts out Pending review.
    pub fn new(id: ProductId, name: &str, materials: &str) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        Ok(Self {
            id,
            name: name.to_string(),
            materials: materials.trim().to_string(),
            status: ProductStatus::Pending,
        })
    }

    pub fn restore(id: ProductId, name: String, materials: String, status: ProductStatus) -> Self {
        Self {
            id,
            name,
            materials,
            status,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw "materials per unit" text.
    pub fn materials(&self) -> &str {
        &self.materials
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    /// Total materials needed to build `quantity` units of this product.
    pub fn requirements(&self, quantity: Quantity) -> DomainResult<RequiredMaterials> {
        requirements_from_text(&self.materials, quantity)
    }

    pub fn set_status(&mut self, status: ProductStatus) {
        self.status = status;
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chair() -> Product {
        Product::new(ProductId::new(), "Chair", "Wood - 4; Screws - 12; Glue - 1").unwrap()
    }

    #[test]
    fn new_product_is_pending_and_not_producible() {
        let product = chair();
        assert_eq!(product.status(), ProductStatus::Pending);
        assert!(!product.status().allows_production());
    }

    #[test]
    fn only_approved_products_are_producible() {
        let mut product = chair();
        product.set_status(ProductStatus::Approved);
        assert!(product.status().allows_production());
        product.set_status(ProductStatus::Cancelled);
        assert!(!product.status().allows_production());
    }

    #[test]
    fn requirements_scale_with_quantity() {
        let required = chair().requirements(Quantity::new(3).unwrap()).unwrap();
        assert_eq!(required.get("Wood"), Some(12.0));
        assert_eq!(required.get("Screws"), Some(36.0));
        assert_eq!(required.get("Glue"), Some(3.0));
    }

    #[test]
    fn product_without_materials_cannot_be_calculated() {
        let product = Product::new(ProductId::new(), "Mystery", "").unwrap();
        let err = product.requirements(Quantity::new(1).unwrap()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn empty_name_is_rejected() {
        assert!(Product::new(ProductId::new(), "  ", "Wood - 1").is_err());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("APPROVED".parse::<ProductStatus>().unwrap(), ProductStatus::Approved);
        assert_eq!("canceled".parse::<ProductStatus>().unwrap(), ProductStatus::Cancelled);
        assert!("retired".parse::<ProductStatus>().is_err());
    }
}
