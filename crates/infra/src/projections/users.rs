//! User directory: account data joined with the one-to-one profile.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use workshop_auth::{full_name, ProfileEvent, ProfileRole, UserEvent};
use workshop_core::{TenantId, UserId};
use workshop_events::EventEnvelope;

use super::{decode, ensure_stream, Projection, ProjectionError, StreamCursors};
use crate::read_model::{contains_ci, Page, Pagination, TenantStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReadModel {
    pub user_id: UserId,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub full_name: String,
    pub joined_at: Option<DateTime<Utc>>,
    /// `None` until the profile is provisioned.
    pub role: Option<ProfileRole>,
    pub phone: Option<String>,
    pub active: bool,
    pub joined_on: Option<NaiveDate>,
    /// "<full name> - <Role>" once a profile exists.
    pub display: Option<String>,
}

impl UserReadModel {
    fn pending(user_id: UserId) -> Self {
        Self {
            user_id,
            username: String::new(),
            first_name: None,
            last_name: None,
            email: None,
            full_name: String::new(),
            joined_at: None,
            role: None,
            phone: None,
            active: false,
            joined_on: None,
            display: None,
        }
    }

    fn refresh_derived(&mut self) {
        self.full_name = full_name(&self.username, self.first_name.as_deref(), self.last_name.as_deref());
        self.display = self.role.map(|r| format!("{} - {}", self.full_name, r.label()));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserQuery {
    /// Matches username, names and email.
    pub search: Option<String>,
    pub role: Option<ProfileRole>,
    pub active: Option<bool>,
}

/// Projection that maintains the user directory per tenant.
#[derive(Debug)]
pub struct UsersProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::default(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, user_id: &UserId) -> Option<UserReadModel> {
        self.store.get(tenant_id, user_id)
    }

    /// Filtered, username-ordered page of users.
    pub fn list(&self, tenant_id: TenantId, query: &UserQuery, page: Pagination) -> Page<UserReadModel> {
        let mut users: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|u| !u.username.is_empty())
            .filter(|u| query.role.is_none() || u.role == query.role)
            .filter(|u| query.active.is_none_or(|a| u.active == a))
            .filter(|u| {
                contains_ci(
                    query.search.as_deref(),
                    [
                        Some(u.username.as_str()),
                        u.first_name.as_deref(),
                        u.last_name.as_deref(),
                        u.email.as_deref(),
                    ],
                )
            })
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        page.apply(users)
    }

    fn load(&self, tenant_id: TenantId, user_id: UserId) -> UserReadModel {
        self.store
            .get(tenant_id, &user_id)
            .unwrap_or_else(|| UserReadModel::pending(user_id))
    }

    fn save(&self, tenant_id: TenantId, mut model: UserReadModel) {
        model.refresh_derived();
        self.store.upsert(tenant_id, model.user_id, model);
    }

    fn apply_user(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let event: UserEvent = decode(envelope)?;
        let tenant_id = envelope.tenant_id();

        match event {
            UserEvent::UserRegistered(e) => {
                ensure_stream(envelope, e.tenant_id, e.user_id.into())?;
                let mut model = self.load(tenant_id, e.user_id);
                model.username = e.username;
                model.first_name = e.first_name;
                model.last_name = e.last_name;
                model.email = e.email;
                model.joined_at = Some(e.occurred_at);
                self.save(tenant_id, model);
            }
            UserEvent::UserUpdated(e) => {
                ensure_stream(envelope, e.tenant_id, e.user_id.into())?;
                let mut model = self.load(tenant_id, e.user_id);
                model.first_name = e.first_name;
                model.last_name = e.last_name;
                model.email = e.email;
                self.save(tenant_id, model);
            }
        }
        Ok(())
    }

    fn apply_profile(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let event: ProfileEvent = decode(envelope)?;
        let tenant_id = envelope.tenant_id();

        match event {
            ProfileEvent::ProfileProvisioned(e) => {
                ensure_stream(envelope, e.tenant_id, e.user_id.profile_stream_id())?;
                let mut model = self.load(tenant_id, e.user_id);
                model.role = Some(e.role);
                model.phone = e.phone;
                model.active = true;
                model.joined_on = Some(e.joined_on);
                self.save(tenant_id, model);
            }
            ProfileEvent::RoleChanged(e) => {
                ensure_stream(envelope, e.tenant_id, e.user_id.profile_stream_id())?;
                let mut model = self.load(tenant_id, e.user_id);
                model.role = Some(e.role);
                self.save(tenant_id, model);
            }
            ProfileEvent::ContactUpdated(e) => {
                ensure_stream(envelope, e.tenant_id, e.user_id.profile_stream_id())?;
                let mut model = self.load(tenant_id, e.user_id);
                model.phone = e.phone;
                self.save(tenant_id, model);
            }
            ProfileEvent::ProfileDeactivated(e) => {
                ensure_stream(envelope, e.tenant_id, e.user_id.profile_stream_id())?;
                let mut model = self.load(tenant_id, e.user_id);
                model.active = false;
                self.save(tenant_id, model);
            }
            ProfileEvent::ProfileActivated(e) => {
                ensure_stream(envelope, e.tenant_id, e.user_id.profile_stream_id())?;
                let mut model = self.load(tenant_id, e.user_id);
                model.active = true;
                self.save(tenant_id, model);
            }
        }
        Ok(())
    }
}

impl<S> Projection for UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    fn name(&self) -> &'static str {
        "users"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        match envelope.aggregate_type() {
            streams::USER => self.cursors.track(envelope, || self.apply_user(envelope)),
            streams::PROFILE => self.cursors.track(envelope, || self.apply_profile(envelope)),
            _ => Ok(()),
        }
    }

    fn reset_tenant(&self, tenant_id: TenantId) {
        self.cursors.reset_tenant(tenant_id);
        self.store.clear_tenant(tenant_id);
    }
}
