//! User profile aggregate.
//!
//! One profile per user; the stream id is [`UserId::profile_stream_id`].
//! Profiles are normally created by the provisioner reacting to
//! `auth.user.registered`, with the default role.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use workshop_core::field;
use workshop_core::{Aggregate, AggregateRoot, DomainError, TenantId, UserId};
use workshop_events::Event;

use crate::ProfileRole;

pub const PHONE_MAX: usize = 20;

/// Message returned when provisioning an existing profile. The provisioner
/// matches on it to treat redelivery as success.
pub const PROFILE_EXISTS: &str = "profile already exists";

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
    pub role: ProfileRole,
    pub phone: Option<String>,
    pub active: bool,
    pub joined_on: Option<NaiveDate>,
    pub version: u64,
    pub created: bool,
}

impl UserProfile {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            tenant_id: None,
            role: ProfileRole::default(),
            phone: None,
            active: true,
            joined_on: None,
            version: 0,
            created: false,
        }
    }

    pub fn is_administrator(&self) -> bool {
        self.role == ProfileRole::Administrator
    }

    pub fn is_worker(&self) -> bool {
        self.role == ProfileRole::Worker
    }

    pub fn is_technician(&self) -> bool {
        self.role == ProfileRole::Technician
    }

    /// "<full name> - <role label>".
    pub fn display(&self, full_name: &str) -> String {
        format!("{full_name} - {}", self.role.label())
    }

    fn ensure_exists(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }
}

impl AggregateRoot for UserProfile {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.user_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionProfile {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    /// `None` provisions the default role.
    pub role: Option<ProfileRole>,
    pub phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRole {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: ProfileRole,
    pub occurred_at: DateTime<Utc>,
}

/// Sets the phone number; `None` or blank clears it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateContact {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivateProfile {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateProfile {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProfileCommand {
    Provision(ProvisionProfile),
    ChangeRole(ChangeRole),
    UpdateContact(UpdateContact),
    Deactivate(DeactivateProfile),
    Activate(ActivateProfile),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileProvisioned {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: ProfileRole,
    pub phone: Option<String>,
    pub joined_on: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChanged {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub previous: ProfileRole,
    pub role: ProfileRole,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub phone: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDeactivated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileActivated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileEvent {
    ProfileProvisioned(ProfileProvisioned),
    RoleChanged(RoleChanged),
    ContactUpdated(ContactUpdated),
    ProfileDeactivated(ProfileDeactivated),
    ProfileActivated(ProfileActivated),
}

impl ProfileEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            ProfileEvent::ProfileProvisioned(e) => e.tenant_id,
            ProfileEvent::RoleChanged(e) => e.tenant_id,
            ProfileEvent::ContactUpdated(e) => e.tenant_id,
            ProfileEvent::ProfileDeactivated(e) => e.tenant_id,
            ProfileEvent::ProfileActivated(e) => e.tenant_id,
        }
    }
}

impl Event for ProfileEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProfileEvent::ProfileProvisioned(_) => "auth.profile.provisioned",
            ProfileEvent::RoleChanged(_) => "auth.profile.role_changed",
            ProfileEvent::ContactUpdated(_) => "auth.profile.contact_updated",
            ProfileEvent::ProfileDeactivated(_) => "auth.profile.deactivated",
            ProfileEvent::ProfileActivated(_) => "auth.profile.activated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProfileEvent::ProfileProvisioned(e) => e.occurred_at,
            ProfileEvent::RoleChanged(e) => e.occurred_at,
            ProfileEvent::ContactUpdated(e) => e.occurred_at,
            ProfileEvent::ProfileDeactivated(e) => e.occurred_at,
            ProfileEvent::ProfileActivated(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate impl
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for UserProfile {
    type Command = ProfileCommand;
    type Event = ProfileEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProfileEvent::ProfileProvisioned(e) => {
                self.user_id = e.user_id;
                self.tenant_id = Some(e.tenant_id);
                self.role = e.role;
                self.phone = e.phone.clone();
                self.joined_on = Some(e.joined_on);
                self.active = true;
                self.created = true;
            }
            ProfileEvent::RoleChanged(e) => self.role = e.role,
            ProfileEvent::ContactUpdated(e) => self.phone = e.phone.clone(),
            ProfileEvent::ProfileDeactivated(_) => self.active = false,
            ProfileEvent::ProfileActivated(_) => self.active = true,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProfileCommand::Provision(cmd) => {
                if self.created {
                    return Err(DomainError::conflict(PROFILE_EXISTS));
                }
                if cmd.user_id != self.user_id {
                    return Err(DomainError::invariant("user_id mismatch"));
                }
                Ok(vec![ProfileEvent::ProfileProvisioned(ProfileProvisioned {
                    tenant_id: cmd.tenant_id,
                    user_id: cmd.user_id,
                    role: cmd.role.unwrap_or_default(),
                    phone: field::optional("phone", cmd.phone.as_deref(), PHONE_MAX)?,
                    joined_on: cmd.occurred_at.date_naive(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            ProfileCommand::ChangeRole(cmd) => {
                self.ensure_exists(cmd.tenant_id)?;
                if cmd.role == self.role {
                    return Ok(vec![]);
                }
                Ok(vec![ProfileEvent::RoleChanged(RoleChanged {
                    tenant_id: cmd.tenant_id,
                    user_id: cmd.user_id,
                    previous: self.role,
                    role: cmd.role,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ProfileCommand::UpdateContact(cmd) => {
                self.ensure_exists(cmd.tenant_id)?;
                let phone = field::optional("phone", cmd.phone.as_deref(), PHONE_MAX)?;
                if phone == self.phone {
                    return Ok(vec![]);
                }
                Ok(vec![ProfileEvent::ContactUpdated(ContactUpdated {
                    tenant_id: cmd.tenant_id,
                    user_id: cmd.user_id,
                    phone,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ProfileCommand::Deactivate(cmd) => {
                self.ensure_exists(cmd.tenant_id)?;
                if !self.active {
                    return Err(DomainError::conflict("profile is already inactive"));
                }
                Ok(vec![ProfileEvent::ProfileDeactivated(ProfileDeactivated {
                    tenant_id: cmd.tenant_id,
                    user_id: cmd.user_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ProfileCommand::Activate(cmd) => {
                self.ensure_exists(cmd.tenant_id)?;
                if self.active {
                    return Err(DomainError::conflict("profile is already active"));
                }
                Ok(vec![ProfileEvent::ProfileActivated(ProfileActivated {
                    tenant_id: cmd.tenant_id,
                    user_id: cmd.user_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}
