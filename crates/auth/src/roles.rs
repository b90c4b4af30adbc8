//! Roles: the opaque token role plus the workshop's fixed profile roles.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use workshop_core::DomainError;

use crate::Permission;

/// Role name as carried in a token's `roles` claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ProfileRole> for Role {
    fn from(value: ProfileRole) -> Self {
        Role::new(value.as_str())
    }
}

/// Role held by a workshop user profile.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileRole {
    Administrator,
    #[default]
    Worker,
    Technician,
}

impl ProfileRole {
    pub const ALL: [ProfileRole; 3] = [
        ProfileRole::Administrator,
        ProfileRole::Worker,
        ProfileRole::Technician,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileRole::Administrator => "administrator",
            ProfileRole::Worker => "worker",
            ProfileRole::Technician => "technician",
        }
    }

    /// Human-readable label used in profile display strings.
    pub fn label(&self) -> &'static str {
        match self {
            ProfileRole::Administrator => "Administrator",
            ProfileRole::Worker => "Worker",
            ProfileRole::Technician => "Technician",
        }
    }

    /// Permissions granted to holders of this role.
    pub fn permissions(&self) -> Vec<Permission> {
        match self {
            ProfileRole::Administrator => vec![Permission::ALL],
            ProfileRole::Worker => vec![
                Permission::INVENTORY_READ,
                Permission::INVENTORY_WRITE,
                Permission::INVENTORY_MOVE,
                Permission::CLIENTS_READ,
                Permission::CLIENTS_WRITE,
                Permission::ORDERS_READ,
                Permission::ORDERS_WRITE,
                Permission::ORDERS_PROGRESS,
                Permission::ORDERS_PARTS,
                Permission::VISITS_READ,
                Permission::VISITS_WRITE,
                Permission::AUDIT_READ,
            ],
            ProfileRole::Technician => vec![
                Permission::INVENTORY_READ,
                Permission::CLIENTS_READ,
                Permission::ORDERS_READ,
                Permission::ORDERS_PROGRESS,
                Permission::ORDERS_PARTS,
                Permission::VISITS_READ,
                Permission::VISITS_WRITE,
            ],
        }
    }
}

impl core::fmt::Display for ProfileRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileRole {
    type Err = DomainError;

    /// Accepts the wire names plus the legacy Spanish names
    /// (`administrador`, `trabajador`, `tecnico`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "administrator" | "admin" | "administrador" => Ok(ProfileRole::Administrator),
            "worker" | "trabajador" => Ok(ProfileRole::Worker),
            "technician" | "tecnico" => Ok(ProfileRole::Technician),
            other => Err(DomainError::field(
                "role",
                format!("'{other}' is not a valid choice"),
            )),
        }
    }
}

/// Effective permissions for a set of token roles. Unknown roles grant nothing.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut out = BTreeSet::new();
    for role in roles {
        if let Ok(role) = role.as_str().parse::<ProfileRole>() {
            out.extend(role.permissions());
        }
    }
    out.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_role_is_worker() {
        assert_eq!(ProfileRole::default(), ProfileRole::Worker);
    }

    #[test]
    fn parses_wire_and_legacy_names() {
        assert_eq!("technician".parse::<ProfileRole>().unwrap(), ProfileRole::Technician);
        assert_eq!("Trabajador".parse::<ProfileRole>().unwrap(), ProfileRole::Worker);
        assert_eq!("admin".parse::<ProfileRole>().unwrap(), ProfileRole::Administrator);
        assert!("owner".parse::<ProfileRole>().is_err());
    }

    #[test]
    fn administrator_gets_wildcard() {
        let perms = permissions_for_roles(&[Role::new("administrator")]);
        assert_eq!(perms, vec![Permission::ALL]);
    }

    #[test]
    fn technician_cannot_write_inventory() {
        let perms = permissions_for_roles(&[Role::new("technician")]);
        assert!(perms.contains(&Permission::ORDERS_PARTS));
        assert!(!perms.contains(&Permission::INVENTORY_WRITE));
        assert!(!perms.contains(&Permission::INVENTORY_MOVE));
    }

    #[test]
    fn roles_are_merged_and_unknown_roles_ignored() {
        let perms = permissions_for_roles(&[
            Role::new("technician"),
            Role::new("worker"),
            Role::new("auditor"),
        ]);
        assert!(perms.contains(&Permission::INVENTORY_MOVE));
        assert!(perms.contains(&Permission::AUDIT_READ));
        assert!(!perms.contains(&Permission::ACCOUNTS_MANAGE));
        let unique: BTreeSet<_> = perms.iter().collect();
        assert_eq!(unique.len(), perms.len());
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&ProfileRole::Technician).unwrap();
        assert_eq!(json, "\"technician\"");
        assert_eq!(ProfileRole::Technician.to_string(), "technician");
    }
}
