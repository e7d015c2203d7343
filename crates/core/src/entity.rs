//! Entities and the structured references that point at them.

use serde::{Deserialize, Serialize};

/// An object with identity and a human-readable label.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Name shown to users when picking this entity.
    fn label(&self) -> &str;

    /// Structured reference (id and label kept apart, never `"Name (ID)"`).
    fn reference(&self) -> EntityRef<Self::Id> {
        EntityRef {
            id: *self.id(),
            label: self.label().to_string(),
        }
    }
}

/// Selection handle for an entity: an id plus the label it was chosen by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef<Id> {
    pub id: Id,
    pub label: String,
}

impl<Id: core::fmt::Display> core::fmt::Display for EntityRef<Id> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} [{}]", self.label, self.id)
    }
}
