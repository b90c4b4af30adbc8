//! Work order board: header, costs, status and consumed parts per order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use workshop_core::{Price, TenantId, UserId};
use workshop_events::EventEnvelope;
use workshop_service::{
    order_reference, ClientId, MachineDetails, MachineTypeId, UsedPart, WorkOrderEvent, WorkOrderId,
    WorkOrderStatus,
};

use super::{decode, ensure_stream, Projection, ProjectionError, StreamCursors};
use crate::read_model::{contains_ci, Page, Pagination, TenantStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderReadModel {
    pub order_id: WorkOrderId,
    pub order_number: String,
    /// "OT-<order_number>".
    pub reference: String,
    pub client_id: ClientId,
    pub machine_type_id: MachineTypeId,
    pub machine: MachineDetails,
    pub intake_reason: String,
    pub work_description: Option<String>,
    pub notes: Option<String>,
    pub status: WorkOrderStatus,
    pub received_at: DateTime<Utc>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub estimated_cost: Option<Price>,
    pub final_cost: Option<Price>,
    pub assigned_technician: Option<UserId>,
    pub created_by: UserId,
    pub used_parts: Vec<UsedPart>,
    pub parts_total: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkOrderQuery {
    /// Matches order number, machine brand/model/serial and intake reason.
    pub search: Option<String>,
    pub status: Option<WorkOrderStatus>,
    pub client_id: Option<ClientId>,
    pub technician: Option<UserId>,
}

#[derive(Debug)]
pub struct WorkOrdersProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> WorkOrdersProjection<S>
where
    S: TenantStore<WorkOrderId, WorkOrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::default(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, order_id: &WorkOrderId) -> Option<WorkOrderReadModel> {
        self.store.get(tenant_id, order_id)
    }

    /// Newest received first.
    pub fn list(&self, tenant_id: TenantId, query: &WorkOrderQuery, page: Pagination) -> Page<WorkOrderReadModel> {
        let mut orders: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|o| query.status.is_none_or(|s| o.status == s))
            .filter(|o| query.client_id.is_none_or(|c| o.client_id == c))
            .filter(|o| query.technician.is_none() || o.assigned_technician == query.technician)
            .filter(|o| {
                contains_ci(
                    query.search.as_deref(),
                    [
                        Some(o.order_number.as_str()),
                        o.machine.brand.as_deref(),
                        o.machine.model.as_deref(),
                        o.machine.serial_number.as_deref(),
                        Some(o.intake_reason.as_str()),
                    ],
                )
            })
            .collect();
        orders.sort_by(|a, b| {
            b.received_at
                .cmp(&a.received_at)
                .then_with(|| b.order_number.cmp(&a.order_number))
        });
        page.apply(orders)
    }

    fn modify(
        &self,
        tenant_id: TenantId,
        order_id: WorkOrderId,
        at: DateTime<Utc>,
        change: impl FnOnce(&mut WorkOrderReadModel),
    ) {
        if let Some(mut order) = self.store.get(tenant_id, &order_id) {
            change(&mut order);
            order.updated_at = at;
            self.store.upsert(tenant_id, order_id, order);
        }
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let event: WorkOrderEvent = decode(envelope)?;
        let tenant_id = envelope.tenant_id();

        match event {
            WorkOrderEvent::WorkOrderOpened(e) => {
                ensure_stream(envelope, e.tenant_id, e.order_id.into())?;
                let order = WorkOrderReadModel {
                    order_id: e.order_id,
                    reference: order_reference(&e.order_number),
                    order_number: e.order_number,
                    client_id: e.client_id,
                    machine_type_id: e.machine_type_id,
                    machine: e.machine,
                    intake_reason: e.intake_reason,
                    work_description: e.work_description,
                    notes: e.notes,
                    status: WorkOrderStatus::default(),
                    received_at: e.occurred_at,
                    estimated_delivery: e.estimated_delivery,
                    delivered_at: None,
                    estimated_cost: e.estimated_cost,
                    final_cost: None,
                    assigned_technician: e.assigned_technician,
                    created_by: e.created_by,
                    used_parts: Vec::new(),
                    parts_total: Decimal::ZERO,
                    updated_at: e.occurred_at,
                };
                self.store.upsert(tenant_id, e.order_id, order);
            }
            WorkOrderEvent::WorkOrderUpdated(e) => {
                ensure_stream(envelope, e.tenant_id, e.order_id.into())?;
                self.modify(tenant_id, e.order_id, e.occurred_at, |o| {
                    o.machine = e.machine;
                    o.intake_reason = e.intake_reason;
                    o.work_description = e.work_description;
                    o.notes = e.notes;
                    o.estimated_delivery = e.estimated_delivery;
                });
            }
            WorkOrderEvent::StatusChanged(e) => {
                ensure_stream(envelope, e.tenant_id, e.order_id.into())?;
                self.modify(tenant_id, e.order_id, e.occurred_at, |o| {
                    o.status = e.to;
                    if e.to == WorkOrderStatus::Delivered {
                        o.delivered_at = Some(e.occurred_at);
                    }
                });
            }
            WorkOrderEvent::TechnicianAssigned(e) => {
                ensure_stream(envelope, e.tenant_id, e.order_id.into())?;
                self.modify(tenant_id, e.order_id, e.occurred_at, |o| o.assigned_technician = e.technician);
            }
            WorkOrderEvent::CostsSet(e) => {
                ensure_stream(envelope, e.tenant_id, e.order_id.into())?;
                self.modify(tenant_id, e.order_id, e.occurred_at, |o| {
                    o.estimated_cost = e.estimated_cost;
                    o.final_cost = e.final_cost;
                });
            }
            WorkOrderEvent::PartAdded(e) => {
                ensure_stream(envelope, e.tenant_id, e.order_id.into())?;
                self.modify(tenant_id, e.order_id, e.occurred_at, |o| {
                    o.parts_total += e.part.subtotal();
                    o.used_parts.push(e.part);
                });
            }
        }
        Ok(())
    }
}

impl<S> Projection for WorkOrdersProjection<S>
where
    S: TenantStore<WorkOrderId, WorkOrderReadModel>,
{
    fn name(&self) -> &'static str {
        "work_orders"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::WORK_ORDER {
            return Ok(());
        }
        self.cursors.track(envelope, || self.apply(envelope))
    }

    fn reset_tenant(&self, tenant_id: TenantId) {
        self.cursors.reset_tenant(tenant_id);
        self.store.clear_tenant(tenant_id);
    }
}
