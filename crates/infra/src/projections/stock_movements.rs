//! Stock movement ledger: one row per committed `StockMoved` event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use workshop_core::{TenantId, UserId};
use workshop_events::EventEnvelope;
use workshop_inventory::{MovementKind, StockItemEvent, StockItemId};

use super::{decode, ensure_stream, Projection, ProjectionError, StreamCursors};
use crate::read_model::{contains_ci, Page, Pagination, TenantStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementReadModel {
    /// Id of the event that recorded the movement.
    pub movement_id: Uuid,
    pub item_id: StockItemId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub reason: String,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
    /// Position in the item stream; breaks timestamp ties.
    pub sequence_number: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementQuery {
    pub item_id: Option<StockItemId>,
    pub kind: Option<MovementKind>,
    /// Matches the reason.
    pub search: Option<String>,
}

#[derive(Debug)]
pub struct StockMovementsProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> StockMovementsProjection<S>
where
    S: TenantStore<Uuid, MovementReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::default(),
        }
    }

    /// Newest-first page of movements.
    pub fn list(&self, tenant_id: TenantId, query: &MovementQuery, page: Pagination) -> Page<MovementReadModel> {
        let mut movements: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|m| query.item_id.is_none_or(|i| m.item_id == i))
            .filter(|m| query.kind.is_none_or(|k| m.kind == k))
            .filter(|m| contains_ci(query.search.as_deref(), [Some(m.reason.as_str())]))
            .collect();
        movements.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| b.sequence_number.cmp(&a.sequence_number))
        });
        page.apply(movements)
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let event: StockItemEvent = decode(envelope)?;
        let StockItemEvent::StockMoved(e) = event else {
            return Ok(());
        };
        ensure_stream(envelope, e.tenant_id, e.item_id.into())?;

        let movement = MovementReadModel {
            movement_id: envelope.event_id(),
            item_id: e.item_id,
            kind: e.kind,
            quantity: e.quantity,
            reason: e.reason,
            previous_stock: e.previous_stock,
            new_stock: e.new_stock,
            user_id: e.user_id,
            occurred_at: e.occurred_at,
            sequence_number: envelope.sequence_number(),
        };
        self.store.upsert(envelope.tenant_id(), movement.movement_id, movement);
        Ok(())
    }
}

impl<S> Projection for StockMovementsProjection<S>
where
    S: TenantStore<Uuid, MovementReadModel>,
{
    fn name(&self) -> &'static str {
        "stock_movements"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::STOCK_ITEM {
            return Ok(());
        }
        self.cursors.track(envelope, || self.apply(envelope))
    }

    fn reset_tenant(&self, tenant_id: TenantId) {
        self.cursors.reset_tenant(tenant_id);
        self.store.clear_tenant(tenant_id);
    }
}
