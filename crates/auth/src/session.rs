use serde::{Deserialize, Serialize};

use novus_core::UserId;

use crate::Role;

/// The acting user for one interactive session.
///
/// Replaces ambient "current user" state: every service call receives the
/// session it runs under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub display_name: String,
    pub role: Role,
}

impl Session {
    pub fn new(user_id: UserId, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            role,
        }
    }
}
