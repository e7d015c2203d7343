//! Point-in-time stock levels and shortage detection.

use std::collections::BTreeMap;

use novus_core::Shortage;

use crate::requirement::RequiredMaterials;

/// Available quantity per material name, as read at one moment.
///
/// A material absent from the map has no inventory record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StockLevels(BTreeMap<String, f64>);

impl StockLevels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, material: impl Into<String>, available: f64) {
        self.0.insert(material.into(), available);
    }

    pub fn get(&self, material: &str) -> Option<f64> {
        self.0.get(material).copied()
    }

    /// Every material whose stock cannot cover the requirement, in name order.
    pub fn shortages(&self, required: &RequiredMaterials) -> Vec<Shortage> {
        required
            .iter()
            .filter_map(|(material, needed)| match self.get(material) {
                Some(have) if have >= needed => None,
                available => Some(Shortage {
                    material: material.to_string(),
                    required: needed,
                    available,
                }),
            })
            .collect()
    }
}

impl FromIterator<(String, f64)> for StockLevels {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
