//! Projection implementations (read model builders).
//!
//! Projections consume committed envelopes and keep query-optimized,
//! tenant-isolated read models. Every projection:
//! - ignores envelopes of aggregate types it does not own;
//! - is idempotent per `(tenant, aggregate, sequence)` (at-least-once safe);
//! - can be rebuilt from the event store with [`rebuild_tenant`].

pub mod audit_trail;
pub mod catalog;
pub mod clients;
pub mod home_visits;
pub mod stock_items;
pub mod stock_movements;
pub mod users;
pub mod work_orders;

use std::collections::HashMap;
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use workshop_core::{AggregateId, TenantId};
use workshop_events::EventEnvelope;

use crate::event_store::{EventStore, EventStoreError};

pub use audit_trail::{AuditEntryReadModel, AuditQuery, AuditTrailProjection};
pub use catalog::{CatalogEntryReadModel, CatalogKind, CatalogProjection, CatalogQuery};
pub use clients::{ClientQuery, ClientReadModel, ClientsProjection};
pub use home_visits::{HomeVisitQuery, HomeVisitReadModel, HomeVisitsProjection};
pub use stock_items::{StockItemQuery, StockItemReadModel, StockItemsProjection};
pub use stock_movements::{MovementQuery, MovementReadModel, StockMovementsProjection};
pub use users::{UserQuery, UserReadModel, UsersProjection};
pub use work_orders::{WorkOrderQuery, WorkOrderReadModel, WorkOrdersProjection};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },

    #[error("event store error: {0}")]
    Store(#[from] EventStoreError),
}

/// A read model fed from the event bus.
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Apply one committed envelope. Envelopes of other aggregate types are ignored.
    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop every record and cursor of a tenant.
    fn reset_tenant(&self, tenant_id: TenantId);
}

/// Replay a tenant's full history into `projections`, from scratch.
///
/// Returns the number of envelopes replayed.
pub fn rebuild_tenant<S>(
    store: &S,
    tenant_id: TenantId,
    projections: &[&dyn Projection],
) -> Result<usize, ProjectionError>
where
    S: EventStore + ?Sized,
{
    let history = store.load_tenant(tenant_id)?;

    for projection in projections {
        projection.reset_tenant(tenant_id);
    }

    for stored in &history {
        let envelope = stored.to_envelope();
        for projection in projections {
            projection.apply_envelope(&envelope)?;
        }
    }

    tracing::info!(%tenant_id, events = history.len(), projections = projections.len(), "read models rebuilt");
    Ok(history.len())
}

type CursorKey = (TenantId, AggregateId, String);

/// Per-stream sequence cursors shared by every projection.
///
/// Keyed by aggregate type as well as aggregate id.
#[derive(Debug, Default)]
pub(crate) struct StreamCursors {
    last_seen: RwLock<HashMap<CursorKey, u64>>,
}

impl StreamCursors {
    /// Run `apply` for a new envelope and advance the cursor on success.
    ///
    /// Replays at or below the cursor are skipped. After the first event of a
    /// stream, sequence numbers must increase by exactly one.
    pub(crate) fn track(
        &self,
        envelope: &EventEnvelope<JsonValue>,
        apply: impl FnOnce() -> Result<(), ProjectionError>,
    ) -> Result<(), ProjectionError> {
        let key = (
            envelope.tenant_id(),
            envelope.aggregate_id(),
            envelope.aggregate_type().to_string(),
        );
        let seq = envelope.sequence_number();

        let Ok(mut cursors) = self.last_seen.write() else {
            return Ok(());
        };
        let last = cursors.get(&key).copied().unwrap_or(0);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(());
        }
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        apply()?;
        cursors.insert(key, seq);
        Ok(())
    }

    pub(crate) fn reset_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut cursors) = self.last_seen.write() {
            cursors.retain(|(t, _, _), _| *t != tenant_id);
        }
    }
}

pub(crate) fn decode<E>(envelope: &EventEnvelope<JsonValue>) -> Result<E, ProjectionError>
where
    E: DeserializeOwned,
{
    serde_json::from_value(envelope.payload().clone())
        .map_err(|e| ProjectionError::Deserialize(e.to_string()))
}

/// Reject events whose own tenant/aggregate disagree with the envelope.
pub(crate) fn ensure_stream(
    envelope: &EventEnvelope<JsonValue>,
    event_tenant: TenantId,
    event_aggregate: AggregateId,
) -> Result<(), ProjectionError> {
    if event_tenant != envelope.tenant_id() {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    if event_aggregate != envelope.aggregate_id() {
        return Err(ProjectionError::TenantIsolation(
            "event aggregate id does not match envelope aggregate_id".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    fn envelope(tenant: TenantId, agg: AggregateId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(Uuid::now_v7(), tenant, agg, "test.stream", seq, json!({}))
    }

    #[test]
    fn duplicates_are_skipped_and_gaps_rejected() {
        let cursors = StreamCursors::default();
        let tenant = TenantId::new();
        let agg = AggregateId::new();
        let mut applied = 0;

        cursors.track(&envelope(tenant, agg, 1), || { applied += 1; Ok(()) }).unwrap();
        cursors.track(&envelope(tenant, agg, 1), || { applied += 1; Ok(()) }).unwrap();
        assert_eq!(applied, 1);

        let err = cursors.track(&envelope(tenant, agg, 3), || Ok(())).unwrap_err();
        assert!(matches!(err, ProjectionError::NonMonotonicSequence { last: 1, found: 3 }));
    }

    #[test]
    fn failed_apply_does_not_advance_the_cursor() {
        let cursors = StreamCursors::default();
        let tenant = TenantId::new();
        let agg = AggregateId::new();

        let _ = cursors.track(&envelope(tenant, agg, 1), || Err(ProjectionError::Deserialize("bad".into())));
        let mut applied = false;
        cursors.track(&envelope(tenant, agg, 1), || { applied = true; Ok(()) }).unwrap();
        assert!(applied);
    }

    #[test]
    fn reset_allows_replay_from_the_start() {
        let cursors = StreamCursors::default();
        let tenant = TenantId::new();
        let agg = AggregateId::new();
        cursors.track(&envelope(tenant, agg, 1), || Ok(())).unwrap();

        cursors.reset_tenant(tenant);
        let mut applied = false;
        cursors.track(&envelope(tenant, agg, 1), || { applied = true; Ok(()) }).unwrap();
        assert!(applied);
    }

    #[test]
    fn streams_sharing_an_id_keep_separate_cursors() {
        let cursors = StreamCursors::default();
        let tenant = TenantId::new();
        let agg = AggregateId::new();
        let user = EventEnvelope::new(Uuid::now_v7(), tenant, agg, "auth.user", 1, json!({}));
        let profile = EventEnvelope::new(Uuid::now_v7(), tenant, agg, "auth.profile", 1, json!({}));

        let mut applied = 0;
        cursors.track(&user, || { applied += 1; Ok(()) }).unwrap();
        cursors.track(&profile, || { applied += 1; Ok(()) }).unwrap();
        assert_eq!(applied, 2);
    }
}
