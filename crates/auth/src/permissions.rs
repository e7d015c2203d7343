use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier (e.g. "orders.approve").
///
/// The wildcard `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const ORDERS_READ: Permission = Permission(Cow::Borrowed("orders.read"));
    pub const ORDERS_CREATE: Permission = Permission(Cow::Borrowed("orders.create"));
    pub const ORDERS_UPDATE: Permission = Permission(Cow::Borrowed("orders.update"));
    pub const ORDERS_APPROVE: Permission = Permission(Cow::Borrowed("orders.approve"));
    pub const ORDERS_CANCEL: Permission = Permission(Cow::Borrowed("orders.cancel"));
    pub const ORDERS_DELIVER: Permission = Permission(Cow::Borrowed("orders.deliver"));
    pub const ORDERS_DELETE: Permission = Permission(Cow::Borrowed("orders.delete"));
    pub const CATALOG_MANAGE: Permission = Permission(Cow::Borrowed("catalog.manage"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
