//! Materials-requirement calculation: per-unit materials × order quantity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use novus_core::{DomainError, DomainResult};

use crate::parse::{PerUnitMaterials, parse_materials};

/// Order quantity: a positive whole number of units.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(units: u32) -> DomainResult<Self> {
        if units == 0 {
            return Err(DomainError::validation("quantity must be a positive whole number"));
        }
        Ok(Self(units))
    }

    /// Parse user input (surrounding whitespace ignored).
    pub fn parse(input: &str) -> DomainResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(DomainError::validation("please enter a quantity"));
        }
        let units: i64 = input
            .parse()
            .map_err(|_| DomainError::validation("quantity must be a positive whole number"))?;
        if units <= 0 {
            return Err(DomainError::validation("quantity must be a positive whole number"));
        }
        let units = u32::try_from(units)
            .map_err(|_| DomainError::validation(format!("quantity {units} is too large")))?;
        Ok(Self(units))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Quantity {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Total materials an order needs, keyed by material name.
///
/// This is the snapshot persisted with an order at creation time. It is
/// serialized as a flat JSON object, e.g. `{"Glue":5.0,"Steel":10.0}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequiredMaterials(BTreeMap<String, f64>);

impl RequiredMaterials {
    pub fn get(&self, material: &str) -> Option<f64> {
        self.0.get(material).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, qty)| (name.as_str(), *qty))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

impl FromIterator<(String, f64)> for RequiredMaterials {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Multiply every per-unit quantity by the order quantity.
pub fn required_materials(per_unit: &PerUnitMaterials, quantity: Quantity) -> RequiredMaterials {
    let units = f64::from(quantity.get());
    per_unit
        .iter()
        .map(|(name, unit_qty)| (name.to_string(), unit_qty as f64 * units))
        .collect()
}

/// Full calculation from a product's raw materials string.
///
/// Fails when the product has no materials text or nothing could be read
/// from it.
pub fn requirements_from_text(
    materials_text: &str,
    quantity: Quantity,
) -> DomainResult<RequiredMaterials> {
    if materials_text.trim().is_empty() {
        return Err(DomainError::validation("no materials found for this product"));
    }
    let per_unit = parse_materials(materials_text);
    if per_unit.is_empty() {
        return Err(DomainError::validation("materials format not recognized"));
    }
    Ok(required_materials(&per_unit, quantity))
}
