//! Multi-aggregate workflows.
//!
//! Each step is its own stream append; there is no cross-stream transaction.
//! Steps are pre-validated against the loaded aggregates, and a failure after
//! the first append is compensated with a counter-command.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};

use workshop_core::{Aggregate, TenantId, UserId};
use workshop_events::{EventBus, EventEnvelope};
use workshop_inventory::{MovementKind, RecordMovement, StockItem, StockItemCommand, StockItemId};
use workshop_service::{
    AddUsedPart, ChangeStatus, ChangeVisitStatus, HomeVisit, HomeVisitCommand, HomeVisitId, LinkWorkOrder,
    MachineDetails, OpenWorkOrder, VisitStatus, WorkOrder, WorkOrderCommand, WorkOrderId, WorkOrderStatus,
    order_reference,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::streams;
use crate::unique_index::{UniqueKey, UniqueKeyIndex};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A step failed and so did the counter-command; state needs manual repair.
    #[error("{step} failed ({cause}) and compensation failed ({compensation})")]
    CompensationFailed {
        step: &'static str,
        cause: DispatchError,
        compensation: DispatchError,
    },
}

/// Take `quantity` of an item out of stock and charge it to a work order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumePart {
    pub tenant_id: TenantId,
    pub order_id: WorkOrderId,
    pub item_id: StockItemId,
    pub quantity: i64,
    /// Defaults to the item's sale price.
    pub unit_price: Option<Decimal>,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartConsumed {
    pub line_no: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub remaining_stock: i64,
}

/// Open a work order for a home visit and move the visit to the workshop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnOrderFromVisit {
    pub tenant_id: TenantId,
    pub visit_id: HomeVisitId,
    pub order_id: WorkOrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

pub struct WorkshopWorkflows<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    unique_keys: Arc<UniqueKeyIndex>,
}

impl<S, B> WorkshopWorkflows<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>, unique_keys: Arc<UniqueKeyIndex>) -> Self {
        Self {
            dispatcher,
            unique_keys,
        }
    }

    /// Outbound movement (reason `OT-<number>`), then the used-part line.
    ///
    /// If the line cannot be appended, a `return` movement restores the stock.
    pub fn consume_part(&self, cmd: ConsumePart) -> Result<PartConsumed, WorkflowError> {
        let tenant_id = cmd.tenant_id;
        let order = self.load_order(tenant_id, cmd.order_id)?;
        let item = self.load_item(tenant_id, cmd.item_id)?;

        let unit_price = match cmd.unit_price {
            Some(price) => price,
            None => item
                .sale_price()
                .map(|p| p.amount())
                .ok_or_else(|| DispatchError::Validation("unit_price: the item has no sale price".to_string()))?,
        };

        let add_part = WorkOrderCommand::AddUsedPart(AddUsedPart {
            tenant_id,
            order_id: cmd.order_id,
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            unit_price,
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        });
        // Dry run on the loaded order: reject before any stock moves.
        order.handle(&add_part).map_err(DispatchError::from)?;

        let reason = order_reference(order.order_number());
        self.move_stock(tenant_id, cmd.item_id, MovementKind::Outbound, cmd.quantity, &reason, cmd.user_id, cmd.occurred_at)?;

        match self.dispatch_order(tenant_id, cmd.order_id, add_part) {
            Ok(_) => {}
            Err(cause) => {
                warn!(%tenant_id, order_id = %cmd.order_id, item_id = %cmd.item_id, error = %cause, "part line rejected; restoring stock");
                let restore = self.move_stock(
                    tenant_id,
                    cmd.item_id,
                    MovementKind::Return,
                    cmd.quantity,
                    &format!("{reason} (reversed)"),
                    cmd.user_id,
                    Utc::now(),
                );
                return Err(match restore {
                    Ok(()) => WorkflowError::Dispatch(cause),
                    Err(compensation) => WorkflowError::CompensationFailed {
                        step: "add used part",
                        cause,
                        compensation,
                    },
                });
            }
        }

        let order = self.load_order(tenant_id, cmd.order_id)?;
        let item = self.load_item(tenant_id, cmd.item_id)?;
        let line = order
            .used_parts()
            .last()
            .ok_or(DispatchError::NotFound)?;
        let consumed = PartConsumed {
            line_no: line.line_no,
            unit_price: line.unit_price.amount(),
            subtotal: line.subtotal(),
            remaining_stock: item.quantity(),
        };

        info!(
            %tenant_id,
            order = %reason,
            item_id = %cmd.item_id,
            quantity = cmd.quantity,
            remaining_stock = consumed.remaining_stock,
            "part consumed"
        );
        Ok(consumed)
    }

    /// Open the order, link it to the visit, then mark the visit `moved_to_workshop`.
    ///
    /// The order number is reserved for the duration; if linking fails the new
    /// order is cancelled.
    pub fn spawn_order_from_visit(&self, cmd: SpawnOrderFromVisit) -> Result<WorkOrderId, WorkflowError> {
        let tenant_id = cmd.tenant_id;
        let visit: HomeVisit = self
            .dispatcher
            .load(tenant_id, cmd.visit_id.into(), |_, id| HomeVisit::empty(HomeVisitId::new(id)))?;

        let link = HomeVisitCommand::LinkWorkOrder(LinkWorkOrder {
            tenant_id,
            visit_id: cmd.visit_id,
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        });
        visit.handle(&link).map_err(DispatchError::from)?;

        let (Some(client_id), Some(machine_type_id)) = (visit.client_id(), visit.machine_type_id()) else {
            return Err(DispatchError::InvariantViolation("visit has no client or machine type".to_string()).into());
        };

        let reservation = self
            .unique_keys
            .reserve(tenant_id, UniqueKey::OrderNumber, &cmd.order_number, cmd.order_id.into())
            .map_err(DispatchError::from)?;

        self.dispatch_order(
            tenant_id,
            cmd.order_id,
            WorkOrderCommand::Open(OpenWorkOrder {
                tenant_id,
                order_id: cmd.order_id,
                order_number: cmd.order_number.clone(),
                client_id,
                machine_type_id,
                machine: MachineDetails::default(),
                intake_reason: visit.problem_description().to_string(),
                work_description: None,
                notes: visit.visit_notes().map(str::to_string),
                estimated_delivery: None,
                estimated_cost: None,
                assigned_technician: visit.technician(),
                user_id: cmd.user_id,
                occurred_at: cmd.occurred_at,
            }),
        )?;
        reservation.commit();

        if let Err(cause) = self.dispatch_visit(tenant_id, cmd.visit_id, link) {
            warn!(%tenant_id, visit_id = %cmd.visit_id, order_id = %cmd.order_id, error = %cause, "visit link rejected; cancelling order");
            let cancel = self.dispatch_order(
                tenant_id,
                cmd.order_id,
                WorkOrderCommand::ChangeStatus(ChangeStatus {
                    tenant_id,
                    order_id: cmd.order_id,
                    status: WorkOrderStatus::Cancelled,
                    occurred_at: Utc::now(),
                }),
            );
            return Err(match cancel {
                Ok(_) => WorkflowError::Dispatch(cause),
                Err(compensation) => WorkflowError::CompensationFailed {
                    step: "link work order",
                    cause,
                    compensation,
                },
            });
        }

        self.dispatch_visit(
            tenant_id,
            cmd.visit_id,
            HomeVisitCommand::ChangeStatus(ChangeVisitStatus {
                tenant_id,
                visit_id: cmd.visit_id,
                status: VisitStatus::MovedToWorkshop,
                occurred_at: cmd.occurred_at,
            }),
        )?;

        info!(%tenant_id, visit_id = %cmd.visit_id, order = %order_reference(&cmd.order_number), "order spawned from visit");
        Ok(cmd.order_id)
    }

    fn load_order(&self, tenant_id: TenantId, order_id: WorkOrderId) -> Result<WorkOrder, DispatchError> {
        self.dispatcher
            .load(tenant_id, order_id.into(), |_, id| WorkOrder::empty(WorkOrderId::new(id)))
    }

    fn load_item(&self, tenant_id: TenantId, item_id: StockItemId) -> Result<StockItem, DispatchError> {
        self.dispatcher
            .load(tenant_id, item_id.into(), |_, id| StockItem::empty(StockItemId::new(id)))
    }

    #[allow(clippy::too_many_arguments)]
    fn move_stock(
        &self,
        tenant_id: TenantId,
        item_id: StockItemId,
        kind: MovementKind,
        quantity: i64,
        reason: &str,
        user_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(
                tenant_id,
                item_id.into(),
                streams::STOCK_ITEM,
                StockItemCommand::RecordMovement(RecordMovement {
                    tenant_id,
                    item_id,
                    kind,
                    quantity,
                    reason: reason.to_string(),
                    user_id,
                    occurred_at,
                }),
                |_, id| StockItem::empty(StockItemId::new(id)),
            )
            .map(|_| ())
    }

    fn dispatch_order(
        &self,
        tenant_id: TenantId,
        order_id: WorkOrderId,
        command: WorkOrderCommand,
    ) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(tenant_id, order_id.into(), streams::WORK_ORDER, command, |_, id| {
                WorkOrder::empty(WorkOrderId::new(id))
            })
            .map(|_| ())
    }

    fn dispatch_visit(
        &self,
        tenant_id: TenantId,
        visit_id: HomeVisitId,
        command: HomeVisitCommand,
    ) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(tenant_id, visit_id.into(), streams::HOME_VISIT, command, |_, id| {
                HomeVisit::empty(HomeVisitId::new(id))
            })
            .map(|_| ())
    }
}
