//! Name/description catalogs: categories, storage locations and machine types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use workshop_core::{AggregateId, TenantId};
use workshop_events::EventEnvelope;
use workshop_inventory::{CategoryEvent, LocationEvent};
use workshop_service::MachineTypeEvent;

use super::{decode, ensure_stream, Projection, ProjectionError, StreamCursors};
use crate::read_model::{contains_ci, Page, Pagination, TenantStore};
use crate::streams;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Category,
    Location,
    MachineType,
}

impl CatalogKind {
    pub fn aggregate_type(&self) -> &'static str {
        match self {
            CatalogKind::Category => streams::CATEGORY,
            CatalogKind::Location => streams::LOCATION,
            CatalogKind::MachineType => streams::MACHINE_TYPE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntryReadModel {
    pub id: AggregateId,
    pub kind: CatalogKind,
    pub name: String,
    pub description: Option<String>,
    /// Machine types are always active.
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
    pub search: Option<String>,
    pub active: Option<bool>,
}

/// One catalog of a given [`CatalogKind`].
#[derive(Debug)]
pub struct CatalogProjection<S> {
    kind: CatalogKind,
    store: S,
    cursors: StreamCursors,
}

impl<S> CatalogProjection<S>
where
    S: TenantStore<AggregateId, CatalogEntryReadModel>,
{
    pub fn new(kind: CatalogKind, store: S) -> Self {
        Self {
            kind,
            store,
            cursors: StreamCursors::default(),
        }
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    pub fn get(&self, tenant_id: TenantId, id: &AggregateId) -> Option<CatalogEntryReadModel> {
        self.store.get(tenant_id, id)
    }

    /// Name-ordered page (case-insensitive).
    pub fn list(
        &self,
        tenant_id: TenantId,
        query: &CatalogQuery,
        page: Pagination,
    ) -> Page<CatalogEntryReadModel> {
        let mut entries: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|e| query.active.is_none_or(|a| e.active == a))
            .filter(|e| contains_ci(query.search.as_deref(), [Some(e.name.as_str()), e.description.as_deref()]))
            .collect();
        entries.sort_by_key(|e| e.name.to_lowercase());
        page.apply(entries)
    }

    fn upsert_details(
        &self,
        envelope: &EventEnvelope<JsonValue>,
        name: String,
        description: Option<String>,
        at: DateTime<Utc>,
    ) {
        let tenant_id = envelope.tenant_id();
        let id = envelope.aggregate_id();
        let entry = match self.store.get(tenant_id, &id) {
            Some(existing) => CatalogEntryReadModel {
                name,
                description,
                updated_at: at,
                ..existing
            },
            None => CatalogEntryReadModel {
                id,
                kind: self.kind,
                name,
                description,
                active: true,
                created_at: at,
                updated_at: at,
            },
        };
        self.store.upsert(tenant_id, id, entry);
    }

    fn set_active(&self, envelope: &EventEnvelope<JsonValue>, active: bool, at: DateTime<Utc>) {
        let tenant_id = envelope.tenant_id();
        let id = envelope.aggregate_id();
        if let Some(mut entry) = self.store.get(tenant_id, &id) {
            entry.active = active;
            entry.updated_at = at;
            self.store.upsert(tenant_id, id, entry);
        }
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        match self.kind {
            CatalogKind::Category => match decode::<CategoryEvent>(envelope)? {
                CategoryEvent::CategoryCreated(e) => {
                    ensure_stream(envelope, e.tenant_id, e.category_id.into())?;
                    self.upsert_details(envelope, e.name, e.description, e.occurred_at);
                }
                CategoryEvent::CategoryUpdated(e) => {
                    ensure_stream(envelope, e.tenant_id, e.category_id.into())?;
                    self.upsert_details(envelope, e.name, e.description, e.occurred_at);
                }
                CategoryEvent::CategoryDeactivated(e) => {
                    ensure_stream(envelope, e.tenant_id, e.category_id.into())?;
                    self.set_active(envelope, false, e.occurred_at);
                }
                CategoryEvent::CategoryActivated(e) => {
                    ensure_stream(envelope, e.tenant_id, e.category_id.into())?;
                    self.set_active(envelope, true, e.occurred_at);
                }
            },
            CatalogKind::Location => match decode::<LocationEvent>(envelope)? {
                LocationEvent::LocationCreated(e) | LocationEvent::LocationUpdated(e) => {
                    ensure_stream(envelope, e.tenant_id, e.location_id.into())?;
                    self.upsert_details(envelope, e.name, e.description, e.occurred_at);
                }
                LocationEvent::LocationDeactivated(e) => {
                    ensure_stream(envelope, e.tenant_id, e.location_id.into())?;
                    self.set_active(envelope, false, e.occurred_at);
                }
                LocationEvent::LocationActivated(e) => {
                    ensure_stream(envelope, e.tenant_id, e.location_id.into())?;
                    self.set_active(envelope, true, e.occurred_at);
                }
            },
            CatalogKind::MachineType => match decode::<MachineTypeEvent>(envelope)? {
                MachineTypeEvent::MachineTypeCreated(e) | MachineTypeEvent::MachineTypeUpdated(e) => {
                    ensure_stream(envelope, e.tenant_id, e.machine_type_id.into())?;
                    self.upsert_details(envelope, e.name, e.description, e.occurred_at);
                }
            },
        }
        Ok(())
    }
}

impl<S> Projection for CatalogProjection<S>
where
    S: TenantStore<AggregateId, CatalogEntryReadModel>,
{
    fn name(&self) -> &'static str {
        self.kind.aggregate_type()
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != self.kind.aggregate_type() {
            return Ok(());
        }
        self.cursors.track(envelope, || self.apply(envelope))
    }

    fn reset_tenant(&self, tenant_id: TenantId) {
        self.cursors.reset_tenant(tenant_id);
        self.store.clear_tenant(tenant_id);
    }
}
