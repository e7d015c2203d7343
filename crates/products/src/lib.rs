//! Products domain module: what an order produces and the materials one
//! unit consumes.

pub mod product;

pub use product::{Product, ProductStatus};

/// Selection handle for a product.
pub type ProductRef = novus_core::EntityRef<novus_core::ProductId>;
