//! Inventory domain module: raw materials, stock levels and the
//! materials-requirement calculation.
//!
//! Pure domain logic (no IO, no storage).

pub mod material;
pub mod parse;
pub mod requirement;
pub mod stock;

pub use material::Material;
pub use parse::{PerUnitMaterials, parse_materials};
pub use requirement::{Quantity, RequiredMaterials, required_materials, requirements_from_text};
pub use stock::StockLevels;
