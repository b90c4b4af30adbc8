//! Audit trail: one row per recorded change, newest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use workshop_audit::{ChangeAction, ChangeEvent, ChangeRecordId};
use workshop_core::{TenantId, UserId};
use workshop_events::EventEnvelope;

use super::{decode, ensure_stream, Projection, ProjectionError, StreamCursors};
use crate::read_model::{contains_ci, Page, Pagination, TenantStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntryReadModel {
    pub change_id: ChangeRecordId,
    pub table: String,
    pub object_id: String,
    pub action: ChangeAction,
    pub description: String,
    pub previous: Option<JsonValue>,
    pub new: Option<JsonValue>,
    pub user_id: UserId,
    pub ip_address: Option<String>,
    pub changed_at: DateTime<Utc>,
    /// "<Action> - <table> (dd/mm/YYYY HH:MM)".
    pub display: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQuery {
    pub table: Option<String>,
    pub object_id: Option<String>,
    pub action: Option<ChangeAction>,
    pub user_id: Option<UserId>,
    /// Matches the description.
    pub search: Option<String>,
}

#[derive(Debug)]
pub struct AuditTrailProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> AuditTrailProjection<S>
where
    S: TenantStore<ChangeRecordId, AuditEntryReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::default(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, change_id: &ChangeRecordId) -> Option<AuditEntryReadModel> {
        self.store.get(tenant_id, change_id)
    }

    pub fn list(&self, tenant_id: TenantId, query: &AuditQuery, page: Pagination) -> Page<AuditEntryReadModel> {
        let mut entries: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|e| query.table.as_deref().is_none_or(|t| e.table == t))
            .filter(|e| query.object_id.as_deref().is_none_or(|o| e.object_id == o))
            .filter(|e| query.action.is_none_or(|a| e.action == a))
            .filter(|e| query.user_id.is_none_or(|u| e.user_id == u))
            .filter(|e| contains_ci(query.search.as_deref(), [Some(e.description.as_str())]))
            .collect();
        entries.sort_by(|a, b| {
            b.changed_at
                .cmp(&a.changed_at)
                .then_with(|| b.change_id.cmp(&a.change_id))
        });
        page.apply(entries)
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let event: ChangeEvent = decode(envelope)?;
        let ChangeEvent::ChangeRecorded(e) = event;
        ensure_stream(envelope, e.tenant_id, e.change_id.into())?;

        let entry = AuditEntryReadModel {
            change_id: e.change_id,
            display: e.display(),
            table: e.table,
            object_id: e.object_id,
            action: e.action,
            description: e.description,
            previous: e.previous,
            new: e.new,
            user_id: e.user_id,
            ip_address: e.ip_address.map(|ip| ip.to_string()),
            changed_at: e.occurred_at,
        };
        self.store.upsert(envelope.tenant_id(), entry.change_id, entry);
        Ok(())
    }
}

impl<S> Projection for AuditTrailProjection<S>
where
    S: TenantStore<ChangeRecordId, AuditEntryReadModel>,
{
    fn name(&self) -> &'static str {
        "audit_trail"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::CHANGE_RECORD {
            return Ok(());
        }
        self.cursors.track(envelope, || self.apply(envelope))
    }

    fn reset_tenant(&self, tenant_id: TenantId) {
        self.cursors.reset_tenant(tenant_id);
        self.store.clear_tenant(tenant_id);
    }
}
