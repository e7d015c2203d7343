//! Parser for a product's free-text "materials per unit" field.
//!
//! The field is typed by hand, e.g. `"Steel - 2; Glue - 1"` or
//! `"Wood: 4, Nails: 12"`. Parsing never fails: an entry without a readable
//! quantity is kept under its full text with quantity 0 so it still shows up
//! in requirement listings.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// `name - qty` or `name: qty`, matched as a prefix of the entry.
static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s*[-:]\s*([0-9]+)").expect("materials entry pattern is valid")
});

/// Mapping of material name to quantity consumed by one unit of product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerUnitMaterials(BTreeMap<String, u64>);

impl PerUnitMaterials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, material: impl Into<String>, quantity: u64) {
        self.0.insert(material.into(), quantity);
    }

    pub fn get(&self, material: &str) -> Option<u64> {
        self.0.get(material).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(name, qty)| (name.as_str(), *qty))
    }
}

impl FromIterator<(String, u64)> for PerUnitMaterials {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parse a materials string into a per-unit mapping.
///
/// Entries are separated by `;` or `,`. Blank entries are skipped and a
/// repeated name keeps the last quantity seen.
pub fn parse_materials(input: &str) -> PerUnitMaterials {
    let mut materials = PerUnitMaterials::new();

    for entry in input.split([';', ',']) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        match parse_entry(entry) {
            Some((name, quantity)) => materials.insert(name, quantity),
            None => materials.insert(entry, 0),
        }
    }

    materials
}

fn parse_entry(entry: &str) -> Option<(&str, u64)> {
    let caps = ENTRY.captures(entry)?;
    let name = caps.get(1)?.as_str().trim();
    // The capture is all digits, so overflow is the only way parsing can fail.
    let quantity = caps.get(2)?.as_str().parse::<u64>().unwrap_or(u64::MAX);
    Some((name, quantity))
}
