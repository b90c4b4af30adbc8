//! Profile provisioning: every registered user gets exactly one profile.
//!
//! The provisioner subscribes to the bus and reacts to `auth.user.registered`.
//! Delivery is at-least-once, so an existing profile counts as success.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use workshop_auth::{
    ChangeRole, PROFILE_EXISTS, ProfileCommand, ProfileRole, ProvisionProfile, UpdateContact, UserEvent,
    UserProfile,
};
use workshop_core::{TenantId, UserId};
use workshop_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::streams;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Provisioned,
    /// The profile existed; role and phone were brought in line when given.
    AlreadyProvisioned,
}

#[derive(Debug)]
pub struct ProfileProvisioner<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
}

impl<S, B> ProfileProvisioner<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>) -> Self {
        Self { dispatcher }
    }

    /// React to one bus message. Anything but a user registration is ignored.
    pub fn handle_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), DispatchError> {
        if envelope.aggregate_type() != streams::USER {
            return Ok(());
        }
        let event: UserEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;

        if let UserEvent::UserRegistered(e) = event {
            let outcome = self.ensure_profile(e.tenant_id, e.user_id, None, None, e.occurred_at)?;
            debug!(tenant_id = %e.tenant_id, user_id = %e.user_id, ?outcome, "profile provisioning handled");
        }
        Ok(())
    }

    /// Create the user's profile, or align an existing one with `role`/`phone`.
    ///
    /// `role: None` means the default role on creation and "keep" otherwise.
    pub fn ensure_profile(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        role: Option<ProfileRole>,
        phone: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Result<ProvisionOutcome, DispatchError> {
        let provision = ProfileCommand::Provision(ProvisionProfile {
            tenant_id,
            user_id,
            role,
            phone: phone.clone(),
            occurred_at,
        });

        // A concurrent provisioning of the same user surfaces as a version
        // conflict; the retry then sees the existing profile.
        let mut result = self.dispatch(tenant_id, user_id, provision.clone());
        if matches!(result, Err(DispatchError::Concurrency(_))) {
            result = self.dispatch(tenant_id, user_id, provision);
        }

        match result {
            Ok(()) => {
                info!(%tenant_id, %user_id, role = role.unwrap_or_default().as_str(), "profile provisioned");
                Ok(ProvisionOutcome::Provisioned)
            }
            Err(DispatchError::Conflict(msg)) if msg == PROFILE_EXISTS => {
                if let Some(role) = role {
                    self.dispatch(
                        tenant_id,
                        user_id,
                        ProfileCommand::ChangeRole(ChangeRole { tenant_id, user_id, role, occurred_at }),
                    )?;
                }
                if phone.is_some() {
                    self.dispatch(
                        tenant_id,
                        user_id,
                        ProfileCommand::UpdateContact(UpdateContact { tenant_id, user_id, phone, occurred_at }),
                    )?;
                }
                Ok(ProvisionOutcome::AlreadyProvisioned)
            }
            Err(other) => Err(other),
        }
    }

    fn dispatch(&self, tenant_id: TenantId, user_id: UserId, command: ProfileCommand) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(tenant_id, user_id.profile_stream_id(), streams::PROFILE, command, move |_, _| {
                UserProfile::empty(user_id)
            })
            .map(|_| ())
    }
}
