//! Authorization at the command boundary, before anything is dispatched.

use workshop_auth::{AuthzError, CommandAuthorization, Permission, Principal, TenantMembership, authorize};

use crate::context::{PrincipalContext, TenantContext};

/// A command (or query) paired with the permissions it needs.
#[derive(Debug)]
pub struct CmdAuth<C> {
    pub inner: C,
    pub required: Vec<Permission>,
}

impl<C> CmdAuth<C> {
    pub fn new(inner: C, required: &[Permission]) -> Self {
        Self {
            inner,
            required: required.to_vec(),
        }
    }
}

impl<C> CommandAuthorization for CmdAuth<C> {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// Check every permission `command` requires for the request's principal.
pub fn authorize_command<C: CommandAuthorization>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = Principal {
        user_id: principal.user_id(),
        active_tenant_id: tenant.tenant_id(),
        membership: TenantMembership::from_roles(tenant.tenant_id(), principal.roles().to_vec()),
    };

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }
    Ok(())
}

/// Permission check for handlers that carry no command (reads).
pub fn require(tenant: &TenantContext, principal: &PrincipalContext, permission: Permission) -> Result<(), AuthzError> {
    authorize_command(tenant, principal, &CmdAuth::new((), &[permission]))
}

#[cfg(test)]
mod tests {
    use workshop_auth::Role;
    use workshop_core::{TenantId, UserId};

    use super::*;

    fn ctx(roles: &[&'static str]) -> (TenantContext, PrincipalContext) {
        (
            TenantContext::new(TenantId::new()),
            PrincipalContext::new(UserId::new(), roles.iter().map(|r| Role::new(*r)).collect()),
        )
    }

    #[test]
    fn technician_can_progress_orders_but_not_edit_clients() {
        let (tenant, principal) = ctx(&["technician"]);
        assert!(require(&tenant, &principal, Permission::ORDERS_PROGRESS).is_ok());
        assert!(require(&tenant, &principal, Permission::CLIENTS_WRITE).is_err());
    }

    #[test]
    fn every_listed_permission_is_required() {
        let (tenant, principal) = ctx(&["worker"]);
        let cmd = CmdAuth::new((), &[Permission::INVENTORY_WRITE, Permission::ACCOUNTS_MANAGE]);
        assert_eq!(
            authorize_command(&tenant, &principal, &cmd),
            Err(AuthzError::Forbidden("accounts.manage".into()))
        );
    }
}
