use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier, e.g. `"inventory.read"`.
///
/// The wildcard `"*"` grants everything; it is only handed out by the
/// administrator role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const ALL: Permission = Permission::named("*");

    pub const ACCOUNTS_MANAGE: Permission = Permission::named("accounts.manage");

    pub const INVENTORY_READ: Permission = Permission::named("inventory.read");
    pub const INVENTORY_WRITE: Permission = Permission::named("inventory.write");
    pub const INVENTORY_MOVE: Permission = Permission::named("inventory.move");

    pub const CLIENTS_READ: Permission = Permission::named("clients.read");
    pub const CLIENTS_WRITE: Permission = Permission::named("clients.write");

    pub const ORDERS_READ: Permission = Permission::named("orders.read");
    pub const ORDERS_WRITE: Permission = Permission::named("orders.write");
    pub const ORDERS_PROGRESS: Permission = Permission::named("orders.progress");
    pub const ORDERS_PARTS: Permission = Permission::named("orders.parts");

    pub const VISITS_READ: Permission = Permission::named("visits.read");
    pub const VISITS_WRITE: Permission = Permission::named("visits.write");

    pub const AUDIT_READ: Permission = Permission::named("audit.read");
    pub const AUDIT_WRITE: Permission = Permission::named("audit.write");

    const fn named(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

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
