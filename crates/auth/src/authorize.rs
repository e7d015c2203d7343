use thiserror::Error;

use crate::{Permission, Role, Session};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' lacks permission '{permission}'")]
    Forbidden { role: String, permission: String },
}

/// Baseline granted to any signed-in user.
const BASELINE: &[Permission] = &[Permission::ORDERS_READ, Permission::ORDERS_CREATE];

/// Order handling without catalog upkeep.
const ORDER_DESK: &[Permission] = &[
    Permission::ORDERS_READ,
    Permission::ORDERS_CREATE,
    Permission::ORDERS_UPDATE,
    Permission::ORDERS_APPROVE,
    Permission::ORDERS_CANCEL,
    Permission::ORDERS_DELIVER,
    Permission::ORDERS_DELETE,
];

/// Permissions a role carries.
///
/// Admins and owners hold the wildcard; managers run the order desk and the
/// catalog; suppliers run the order desk only. Any other role gets the
/// baseline.
pub fn permissions_for(role: &Role) -> Vec<Permission> {
    match role.as_str() {
        "admin" | "owner" => vec![Permission::WILDCARD],
        "manager" => {
            let mut perms = ORDER_DESK.to_vec();
            perms.push(Permission::CATALOG_MANAGE);
            perms
        }
        "supplier" => ORDER_DESK.to_vec(),
        _ => BASELINE.to_vec(),
    }
}

/// Check that the session may perform an action requiring `required`.
///
/// - No IO
/// - No panics
pub fn authorize(session: &Session, required: &Permission) -> Result<(), AuthzError> {
    let granted = permissions_for(&session.role)
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %session.user_id,
            role = %session.role,
            permission = %required,
            "authorization denied"
        );
        Err(AuthzError::Forbidden {
            role: session.role.to_string(),
            permission: required.to_string(),
        })
    }
}
