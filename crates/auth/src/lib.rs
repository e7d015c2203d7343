//! `novus-auth` — who is acting, and what they may do.
//!
//! Decoupled from storage and presentation: callers build a [`Session`] once
//! and pass it explicitly to every operation.

pub mod authorize;
pub mod permissions;
pub mod roles;
pub mod session;

pub use authorize::{AuthzError, authorize, permissions_for};
pub use permissions::Permission;
pub use roles::Role;
pub use session::Session;
