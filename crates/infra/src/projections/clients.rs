use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use workshop_core::TenantId;
use workshop_events::EventEnvelope;
use workshop_service::{ClientEvent, ClientId, ContactInfo};

use super::{decode, ensure_stream, Projection, ProjectionError, StreamCursors};
use crate::read_model::{contains_ci, Page, Pagination, TenantStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientReadModel {
    pub client_id: ClientId,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientReadModel {
    fn set_contact(&mut self, contact: ContactInfo) {
        self.phone = contact.phone;
        self.email = contact.email;
        self.address = contact.address;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientQuery {
    /// Matches name, tax id, phone and email.
    pub search: Option<String>,
    pub active: Option<bool>,
}

/// Client directory per tenant.
#[derive(Debug)]
pub struct ClientsProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> ClientsProjection<S>
where
    S: TenantStore<ClientId, ClientReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::default(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, client_id: &ClientId) -> Option<ClientReadModel> {
        self.store.get(tenant_id, client_id)
    }

    pub fn list(&self, tenant_id: TenantId, query: &ClientQuery, page: Pagination) -> Page<ClientReadModel> {
        let mut clients: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|c| query.active.is_none_or(|a| c.active == a))
            .filter(|c| {
                contains_ci(
                    query.search.as_deref(),
                    [Some(c.name.as_str()), c.tax_id.as_deref(), c.phone.as_deref(), c.email.as_deref()],
                )
            })
            .collect();
        clients.sort_by_key(|c| c.name.to_lowercase());
        page.apply(clients)
    }

    fn set_active(&self, tenant_id: TenantId, client_id: ClientId, active: bool, at: DateTime<Utc>) {
        if let Some(mut client) = self.store.get(tenant_id, &client_id) {
            client.active = active;
            client.updated_at = at;
            self.store.upsert(tenant_id, client_id, client);
        }
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let event: ClientEvent = decode(envelope)?;
        let tenant_id = envelope.tenant_id();

        match event {
            ClientEvent::ClientRegistered(e) => {
                ensure_stream(envelope, e.tenant_id, e.client_id.into())?;
                let mut client = ClientReadModel {
                    client_id: e.client_id,
                    name: e.name,
                    phone: None,
                    email: None,
                    address: None,
                    tax_id: e.tax_id,
                    active: true,
                    registered_at: e.occurred_at,
                    updated_at: e.occurred_at,
                };
                client.set_contact(e.contact);
                self.store.upsert(tenant_id, e.client_id, client);
            }
            ClientEvent::ClientUpdated(e) => {
                ensure_stream(envelope, e.tenant_id, e.client_id.into())?;
                if let Some(mut client) = self.store.get(tenant_id, &e.client_id) {
                    client.name = e.name;
                    client.tax_id = e.tax_id;
                    client.set_contact(e.contact);
                    client.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.client_id, client);
                }
            }
            ClientEvent::ClientDeactivated(e) => {
                ensure_stream(envelope, e.tenant_id, e.client_id.into())?;
                self.set_active(tenant_id, e.client_id, false, e.occurred_at);
            }
            ClientEvent::ClientActivated(e) => {
                ensure_stream(envelope, e.tenant_id, e.client_id.into())?;
                self.set_active(tenant_id, e.client_id, true, e.occurred_at);
            }
        }
        Ok(())
    }
}

impl<S> Projection for ClientsProjection<S>
where
    S: TenantStore<ClientId, ClientReadModel>,
{
    fn name(&self) -> &'static str {
        "clients"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::CLIENT {
            return Ok(());
        }
        self.cursors.track(envelope, || self.apply(envelope))
    }

    fn reset_tenant(&self, tenant_id: TenantId) {
        self.cursors.reset_tenant(tenant_id);
        self.store.clear_tenant(tenant_id);
    }
}
