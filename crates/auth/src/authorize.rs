use thiserror::Error;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Command-side authorization contract, checked before dispatch.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

/// Authorize a principal within its active tenant. Pure policy check.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    let granted = principal
        .membership
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, TenantMembership};
    use workshop_core::{TenantId, UserId};

    fn principal_with(roles: &[&'static str]) -> Principal {
        let tenant_id = TenantId::new();
        Principal {
            user_id: UserId::new(),
            active_tenant_id: tenant_id,
            membership: TenantMembership::from_roles(
                tenant_id,
                roles.iter().map(|r| Role::new(*r)).collect(),
            ),
        }
    }

    #[test]
    fn administrator_is_allowed_everything() {
        let p = principal_with(&["administrator"]);
        assert!(authorize(&p, &Permission::ACCOUNTS_MANAGE).is_ok());
        assert!(authorize(&p, &Permission::AUDIT_WRITE).is_ok());
    }

    #[test]
    fn worker_cannot_manage_accounts() {
        let p = principal_with(&["worker"]);
        assert!(authorize(&p, &Permission::INVENTORY_MOVE).is_ok());
        assert_eq!(
            authorize(&p, &Permission::ACCOUNTS_MANAGE),
            Err(AuthzError::Forbidden("accounts.manage".into()))
        );
    }

    #[test]
    fn tenant_mismatch_is_rejected_before_permissions() {
        let mut p = principal_with(&["administrator"]);
        p.active_tenant_id = TenantId::new();
        assert_eq!(
            authorize(&p, &Permission::INVENTORY_READ),
            Err(AuthzError::TenantMismatch)
        );
    }

    #[test]
    fn no_roles_means_no_access() {
        let p = principal_with(&[]);
        assert!(authorize(&p, &Permission::INVENTORY_READ).is_err());
    }
}
