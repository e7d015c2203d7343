use serde::{Deserialize, Serialize};

use novus_core::{ClientId, DomainError, DomainResult, Entity, EntityRef};

/// Selection handle for a client.
pub type ClientRef = EntityRef<ClientId>;

/// A customer that orders are produced for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    id: ClientId,
    name: String,
}

impl Client {
    pub fn new(id: ClientId, name: &str) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("client name cannot be empty"));
        }
        Ok(Self {
            id,
            name: name.to_string(),
        })
    }

    pub fn restore(id: ClientId, name: String) -> Self {
        Self { id, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for Client {
    type Id = ClientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}
