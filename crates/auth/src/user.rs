//! User account aggregate (event-sourced).
//!
//! The account is the identity other records point at (`created_by`,
//! movement user, assigned technician). Role and contact metadata live on the
//! one-to-one [`UserProfile`](crate::UserProfile).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workshop_core::field;
use workshop_core::{Aggregate, AggregateRoot, DomainError, TenantId, UserId};
use workshop_events::Event;

pub const USERNAME_MAX: usize = 150;
pub const NAME_MAX: usize = 150;

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: UserId,
    pub tenant_id: Option<TenantId>,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub joined_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub created: bool,
}

impl UserAccount {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            tenant_id: None,
            username: String::new(),
            first_name: None,
            last_name: None,
            email: None,
            joined_at: None,
            version: 0,
            created: false,
        }
    }

    /// "first last", falling back to the username when both are blank.
    pub fn full_name(&self) -> String {
        full_name(
            &self.username,
            self.first_name.as_deref(),
            self.last_name.as_deref(),
        )
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if self.created && self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }
}

/// Shared by read models that only hold the raw name parts.
pub fn full_name(username: &str, first: Option<&str>, last: Option<&str>) -> String {
    let joined = format!("{} {}", first.unwrap_or(""), last.unwrap_or(""));
    let joined = joined.trim();
    if joined.is_empty() {
        username.to_string()
    } else {
        joined.to_string()
    }
}

impl AggregateRoot for UserAccount {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Partial update. `None` keeps the current value, a blank string clears it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserCommand {
    Register(RegisterUser),
    Update(UpdateUser),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Carries the full post-update state of the mutable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    UserRegistered(UserRegistered),
    UserUpdated(UserUpdated),
}

impl UserEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            UserEvent::UserRegistered(e) => e.tenant_id,
            UserEvent::UserUpdated(e) => e.tenant_id,
        }
    }
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::UserRegistered(_) => "auth.user.registered",
            UserEvent::UserUpdated(_) => "auth.user.updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::UserRegistered(e) => e.occurred_at,
            UserEvent::UserUpdated(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate impl
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for UserAccount {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::UserRegistered(e) => {
                self.id = e.user_id;
                self.tenant_id = Some(e.tenant_id);
                self.username = e.username.clone();
                self.first_name = e.first_name.clone();
                self.last_name = e.last_name.clone();
                self.email = e.email.clone();
                self.joined_at = Some(e.occurred_at);
                self.created = true;
            }
            UserEvent::UserUpdated(e) => {
                self.first_name = e.first_name.clone();
                self.last_name = e.last_name.clone();
                self.email = e.email.clone();
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Register(cmd) => self.handle_register(cmd),
            UserCommand::Update(cmd) => self.handle_update(cmd),
        }
    }
}

impl UserAccount {
    fn handle_register(&self, cmd: &RegisterUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("user already exists"));
        }
        if cmd.user_id != self.id {
            return Err(DomainError::invariant("user_id mismatch"));
        }

        let username = field::required("username", &cmd.username, USERNAME_MAX)?;
        if username.chars().any(char::is_whitespace) {
            return Err(DomainError::field("username", "may not contain spaces"));
        }

        Ok(vec![UserEvent::UserRegistered(UserRegistered {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            username,
            first_name: field::optional("first_name", cmd.first_name.as_deref(), NAME_MAX)?,
            last_name: field::optional("last_name", cmd.last_name.as_deref(), NAME_MAX)?,
            email: field::optional_email("email", cmd.email.as_deref())?
                .map(|e| e.to_lowercase()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateUser) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_tenant(cmd.tenant_id)?;

        let first_name = match &cmd.first_name {
            Some(v) => field::optional("first_name", Some(v.as_str()), NAME_MAX)?,
            None => self.first_name.clone(),
        };
        let last_name = match &cmd.last_name {
            Some(v) => field::optional("last_name", Some(v.as_str()), NAME_MAX)?,
            None => self.last_name.clone(),
        };
        let email = match &cmd.email {
            Some(v) => field::optional_email("email", Some(v.as_str()))?.map(|e| e.to_lowercase()),
            None => self.email.clone(),
        };

        if first_name == self.first_name && last_name == self.last_name && email == self.email {
            return Ok(vec![]);
        }

        Ok(vec![UserEvent::UserUpdated(UserUpdated {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            first_name,
            last_name,
            email,
            occurred_at: cmd.occurred_at,
        })])
    }
}
