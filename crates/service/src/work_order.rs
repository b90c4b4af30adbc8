//! Work order aggregate ("OT": orden de trabajo).
//!
//! Tracks a machine from intake to delivery, including the spare parts
//! consumed from inventory. Consuming a part also moves stock on the item;
//! that two-stream workflow lives in the infrastructure layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use workshop_core::{
    Aggregate, AggregateRoot, DomainError, Entity, Price, TenantId, UserId, ValueObject,
    aggregate_id, field,
};
use workshop_events::Event;
use workshop_inventory::StockItemId;

use crate::{ClientId, MachineTypeId, WorkOrderStatus};

pub const ORDER_NUMBER_MAX: usize = 20;
pub const MACHINE_FIELD_MAX: usize = 100;
pub const MIN_MACHINE_YEAR: i32 = 1900;

aggregate_id!(
    /// Work order identifier.
    WorkOrderId
);

/// Reason recorded on stock movements caused by this order: `OT-<number>`.
pub fn order_reference(order_number: &str) -> String {
    format!("OT-{order_number}")
}

/// The machine brought in for repair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineDetails {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub year: Option<i32>,
}

impl ValueObject for MachineDetails {}

impl MachineDetails {
    fn validated(&self) -> Result<Self, DomainError> {
        if let Some(year) = self.year {
            field::at_least("machine_year", i64::from(year), i64::from(MIN_MACHINE_YEAR))?;
        }
        Ok(Self {
            brand: field::optional("machine_brand", self.brand.as_deref(), MACHINE_FIELD_MAX)?,
            model: field::optional("machine_model", self.model.as_deref(), MACHINE_FIELD_MAX)?,
            serial_number: field::optional(
                "serial_number",
                self.serial_number.as_deref(),
                MACHINE_FIELD_MAX,
            )?,
            year: self.year,
        })
    }
}

/// A part consumed by the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsedPart {
    pub line_no: u32,
    pub item_id: StockItemId,
    pub quantity: i64,
    pub unit_price: Price,
    pub used_at: DateTime<Utc>,
    pub user_id: UserId,
}

impl UsedPart {
    /// `quantity × unit_price`, exact.
    pub fn subtotal(&self) -> Decimal {
        self.unit_price.times(self.quantity)
    }
}

impl Entity for UsedPart {
    type Id = u32;

    fn id(&self) -> &Self::Id {
        &self.line_no
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkOrder {
    id: WorkOrderId,
    tenant_id: Option<TenantId>,
    order_number: String,
    client_id: Option<ClientId>,
    machine_type_id: Option<MachineTypeId>,
    machine: MachineDetails,
    intake_reason: String,
    work_description: Option<String>,
    notes: Option<String>,
    status: WorkOrderStatus,
    received_at: Option<DateTime<Utc>>,
    estimated_delivery: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    estimated_cost: Option<Price>,
    final_cost: Option<Price>,
    assigned_technician: Option<UserId>,
    created_by: Option<UserId>,
    used_parts: Vec<UsedPart>,
    version: u64,
    created: bool,
}

impl WorkOrder {
    pub fn empty(id: WorkOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            order_number: String::new(),
            client_id: None,
            machine_type_id: None,
            machine: MachineDetails::default(),
            intake_reason: String::new(),
            work_description: None,
            notes: None,
            status: WorkOrderStatus::default(),
            received_at: None,
            estimated_delivery: None,
            delivered_at: None,
            estimated_cost: None,
            final_cost: None,
            assigned_technician: None,
            created_by: None,
            used_parts: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn machine_type_id(&self) -> Option<MachineTypeId> {
        self.machine_type_id
    }

    pub fn machine(&self) -> &MachineDetails {
        &self.machine
    }

    pub fn intake_reason(&self) -> &str {
        &self.intake_reason
    }

    pub fn work_description(&self) -> Option<&str> {
        self.work_description.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> WorkOrderStatus {
        self.status
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    pub fn estimated_delivery(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn estimated_cost(&self) -> Option<Price> {
        self.estimated_cost
    }

    pub fn final_cost(&self) -> Option<Price> {
        self.final_cost
    }

    pub fn assigned_technician(&self) -> Option<UserId> {
        self.assigned_technician
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn used_parts(&self) -> &[UsedPart] {
        &self.used_parts
    }

    /// Sum of all part subtotals.
    pub fn parts_total(&self) -> Decimal {
        self.used_parts.iter().map(UsedPart::subtotal).sum()
    }

    pub fn reference(&self) -> String {
        order_reference(&self.order_number)
    }

    /// "OT-<order_number> - <client name>".
    pub fn display(&self, client_name: &str) -> String {
        format!("{} - {client_name}", self.reference())
    }

    fn ensure_exists(&self, tenant_id: TenantId, order_id: WorkOrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "work order is {} and can no longer change",
                self.status
            )));
        }
        Ok(())
    }
}

impl AggregateRoot for WorkOrder {
    type Id = WorkOrderId;

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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenWorkOrder {
    pub tenant_id: TenantId,
    pub order_id: WorkOrderId,
    pub order_number: String,
    pub client_id: ClientId,
    pub machine_type_id: MachineTypeId,
    pub machine: MachineDetails,
    pub intake_reason: String,
    pub work_description: Option<String>,
    pub notes: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub estimated_cost: Option<Decimal>,
    pub assigned_technician: Option<UserId>,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Partial update of the descriptive fields. `None` keeps; a blank string
/// clears an optional text field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderChanges {
    pub machine_brand: Option<String>,
    pub machine_model: Option<String>,
    pub serial_number: Option<String>,
    pub machine_year: Option<i32>,
    pub intake_reason: Option<String>,
    pub work_description: Option<String>,
    pub notes: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWorkOrder {
    pub tenant_id: TenantId,
    pub order_id: WorkOrderId,
    pub changes: WorkOrderChanges,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub tenant_id: TenantId,
    pub order_id: WorkOrderId,
    pub status: WorkOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// `technician: None` unassigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignTechnician {
    pub tenant_id: TenantId,
    pub order_id: WorkOrderId,
    pub technician: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

/// `None` keeps the current cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCosts {
    pub tenant_id: TenantId,
    pub order_id: WorkOrderId,
    pub estimated_cost: Option<Decimal>,
    pub final_cost: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddUsedPart {
    pub tenant_id: TenantId,
    pub order_id: WorkOrderId,
    pub item_id: StockItemId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkOrderCommand {
    Open(OpenWorkOrder),
    Update(UpdateWorkOrder),
    ChangeStatus(ChangeStatus),
    AssignTechnician(AssignTechnician),
    SetCosts(SetCosts),
    AddUsedPart(AddUsedPart),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderOpened {
    pub tenant_id: TenantId,
    pub order_id: WorkOrderId,
    pub order_number: String,
    pub client_id: ClientId,
    pub machine_type_id: MachineTypeId,
    pub machine: MachineDetails,
    pub intake_reason: String,
    pub work_description: Option<String>,
    pub notes: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub estimated_cost: Option<Price>,
    pub assigned_technician: Option<UserId>,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderUpdated {
    pub tenant_id: TenantId,
    pub order_id: WorkOrderId,
    pub machine: MachineDetails,
    pub intake_reason: String,
    pub work_description: Option<String>,
    pub notes: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub tenant_id: TenantId,
    pub order_id: WorkOrderId,
    pub from: WorkOrderStatus,
    pub to: WorkOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicianAssigned {
    pub tenant_id: TenantId,
    pub order_id: WorkOrderId,
    pub technician: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostsSet {
    pub tenant_id: TenantId,
    pub order_id: WorkOrderId,
    pub estimated_cost: Option<Price>,
    pub final_cost: Option<Price>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartAdded {
    pub tenant_id: TenantId,
    pub order_id: WorkOrderId,
    pub part: UsedPart,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkOrderEvent {
    WorkOrderOpened(WorkOrderOpened),
    WorkOrderUpdated(WorkOrderUpdated),
    StatusChanged(StatusChanged),
    TechnicianAssigned(TechnicianAssigned),
    CostsSet(CostsSet),
    PartAdded(PartAdded),
}

impl WorkOrderEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            WorkOrderEvent::WorkOrderOpened(e) => e.tenant_id,
            WorkOrderEvent::WorkOrderUpdated(e) => e.tenant_id,
            WorkOrderEvent::StatusChanged(e) => e.tenant_id,
            WorkOrderEvent::TechnicianAssigned(e) => e.tenant_id,
            WorkOrderEvent::CostsSet(e) => e.tenant_id,
            WorkOrderEvent::PartAdded(e) => e.tenant_id,
        }
    }
}

impl Event for WorkOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WorkOrderEvent::WorkOrderOpened(_) => "service.work_order.opened",
            WorkOrderEvent::WorkOrderUpdated(_) => "service.work_order.updated",
            WorkOrderEvent::StatusChanged(_) => "service.work_order.status_changed",
            WorkOrderEvent::TechnicianAssigned(_) => "service.work_order.technician_assigned",
            WorkOrderEvent::CostsSet(_) => "service.work_order.costs_set",
            WorkOrderEvent::PartAdded(_) => "service.work_order.part_added",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WorkOrderEvent::WorkOrderOpened(e) => e.occurred_at,
            WorkOrderEvent::WorkOrderUpdated(e) => e.occurred_at,
            WorkOrderEvent::StatusChanged(e) => e.occurred_at,
            WorkOrderEvent::TechnicianAssigned(e) => e.occurred_at,
            WorkOrderEvent::CostsSet(e) => e.occurred_at,
            WorkOrderEvent::PartAdded(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate impl
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for WorkOrder {
    type Command = WorkOrderCommand;
    type Event = WorkOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WorkOrderEvent::WorkOrderOpened(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.order_number = e.order_number.clone();
                self.client_id = Some(e.client_id);
                self.machine_type_id = Some(e.machine_type_id);
                self.machine = e.machine.clone();
                self.intake_reason = e.intake_reason.clone();
                self.work_description = e.work_description.clone();
                self.notes = e.notes.clone();
                self.estimated_delivery = e.estimated_delivery;
                self.estimated_cost = e.estimated_cost;
                self.assigned_technician = e.assigned_technician;
                self.created_by = Some(e.created_by);
                self.received_at = Some(e.occurred_at);
                self.status = WorkOrderStatus::Intake;
                self.created = true;
            }
            WorkOrderEvent::WorkOrderUpdated(e) => {
                self.machine = e.machine.clone();
                self.intake_reason = e.intake_reason.clone();
                self.work_description = e.work_description.clone();
                self.notes = e.notes.clone();
                self.estimated_delivery = e.estimated_delivery;
            }
            WorkOrderEvent::StatusChanged(e) => {
                self.status = e.to;
                if e.to == WorkOrderStatus::Delivered {
                    self.delivered_at = Some(e.occurred_at);
                }
            }
            WorkOrderEvent::TechnicianAssigned(e) => self.assigned_technician = e.technician,
            WorkOrderEvent::CostsSet(e) => {
                self.estimated_cost = e.estimated_cost;
                self.final_cost = e.final_cost;
            }
            WorkOrderEvent::PartAdded(e) => self.used_parts.push(e.part.clone()),
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            WorkOrderCommand::Open(cmd) => self.handle_open(cmd),
            WorkOrderCommand::Update(cmd) => self.handle_update(cmd),
            WorkOrderCommand::ChangeStatus(cmd) => self.handle_status(cmd),
            WorkOrderCommand::AssignTechnician(cmd) => self.handle_assign(cmd),
            WorkOrderCommand::SetCosts(cmd) => self.handle_costs(cmd),
            WorkOrderCommand::AddUsedPart(cmd) => self.handle_add_part(cmd),
        }
    }
}

impl WorkOrder {
    fn handle_open(&self, cmd: &OpenWorkOrder) -> Result<Vec<WorkOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("work order already exists"));
        }

        Ok(vec![WorkOrderEvent::WorkOrderOpened(WorkOrderOpened {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            order_number: field::required("order_number", &cmd.order_number, ORDER_NUMBER_MAX)?,
            client_id: cmd.client_id,
            machine_type_id: cmd.machine_type_id,
            machine: cmd.machine.validated()?,
            intake_reason: field::required_text("intake_reason", &cmd.intake_reason)?,
            work_description: field::optional_text(cmd.work_description.as_deref()),
            notes: field::optional_text(cmd.notes.as_deref()),
            estimated_delivery: cmd.estimated_delivery,
            estimated_cost: Price::parse_opt("estimated_cost", cmd.estimated_cost)?,
            assigned_technician: cmd.assigned_technician,
            created_by: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateWorkOrder) -> Result<Vec<WorkOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_open()?;
        let c = &cmd.changes;

        let machine = MachineDetails {
            brand: c.machine_brand.clone().or_else(|| self.machine.brand.clone()),
            model: c.machine_model.clone().or_else(|| self.machine.model.clone()),
            serial_number: c.serial_number.clone().or_else(|| self.machine.serial_number.clone()),
            year: c.machine_year.or(self.machine.year),
        }
        .validated()?;

        let intake_reason = match &c.intake_reason {
            Some(r) => field::required_text("intake_reason", r)?,
            None => self.intake_reason.clone(),
        };
        let work_description = match &c.work_description {
            Some(d) => field::optional_text(Some(d.as_str())),
            None => self.work_description.clone(),
        };
        let notes = match &c.notes {
            Some(n) => field::optional_text(Some(n.as_str())),
            None => self.notes.clone(),
        };
        let estimated_delivery = c.estimated_delivery.or(self.estimated_delivery);

        if machine == self.machine
            && intake_reason == self.intake_reason
            && work_description == self.work_description
            && notes == self.notes
            && estimated_delivery == self.estimated_delivery
        {
            return Ok(vec![]);
        }

        Ok(vec![WorkOrderEvent::WorkOrderUpdated(WorkOrderUpdated {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            machine,
            intake_reason,
            work_description,
            notes,
            estimated_delivery,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_status(&self, cmd: &ChangeStatus) -> Result<Vec<WorkOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        if !self.status.can_transition_to(cmd.status) {
            return Err(DomainError::invariant(format!(
                "cannot move work order from {} to {}",
                self.status, cmd.status
            )));
        }
        Ok(vec![WorkOrderEvent::StatusChanged(StatusChanged {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign(&self, cmd: &AssignTechnician) -> Result<Vec<WorkOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_open()?;
        if cmd.technician == self.assigned_technician {
            return Ok(vec![]);
        }
        Ok(vec![WorkOrderEvent::TechnicianAssigned(TechnicianAssigned {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            technician: cmd.technician,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_costs(&self, cmd: &SetCosts) -> Result<Vec<WorkOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        let estimated_cost = match cmd.estimated_cost {
            Some(v) => Some(Price::parse("estimated_cost", v)?),
            None => self.estimated_cost,
        };
        let final_cost = match cmd.final_cost {
            Some(v) => Some(Price::parse("final_cost", v)?),
            None => self.final_cost,
        };
        if estimated_cost == self.estimated_cost && final_cost == self.final_cost {
            return Ok(vec![]);
        }
        Ok(vec![WorkOrderEvent::CostsSet(CostsSet {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            estimated_cost,
            final_cost,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_part(&self, cmd: &AddUsedPart) -> Result<Vec<WorkOrderEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;
        self.ensure_open()?;

        let quantity = field::at_least("quantity", cmd.quantity, 1)?;
        let unit_price = Price::parse("unit_price", cmd.unit_price)?;
        let line_no = self
            .used_parts
            .last()
            .map_or(Some(1), |p| p.line_no.checked_add(1))
            .ok_or_else(|| DomainError::invariant("work order has no free part line numbers"))?;

        Ok(vec![WorkOrderEvent::PartAdded(PartAdded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            part: UsedPart {
                line_no,
                item_id: cmd.item_id,
                quantity,
                unit_price,
                used_at: cmd.occurred_at,
                user_id: cmd.user_id,
            },
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use workshop_events::execute;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn open_cmd(tenant_id: TenantId, order_id: WorkOrderId) -> OpenWorkOrder {
        OpenWorkOrder {
            tenant_id,
            order_id,
            order_number: "2024-0042".into(),
            client_id: ClientId::generate(),
            machine_type_id: MachineTypeId::generate(),
            machine: MachineDetails {
                brand: Some("Stihl".into()),
                model: Some("MS 250".into()),
                serial_number: None,
                year: Some(2019),
            },
            intake_reason: "No enciende".into(),
            work_description: None,
            notes: None,
            estimated_delivery: None,
            estimated_cost: None,
            assigned_technician: None,
            user_id: UserId::new(),
            occurred_at: test_time(),
        }
    }

    fn opened() -> (TenantId, WorkOrder) {
        let tenant_id = test_tenant_id();
        let order_id = WorkOrderId::generate();
        let mut order = WorkOrder::empty(order_id);
        execute(&mut order, &WorkOrderCommand::Open(open_cmd(tenant_id, order_id))).unwrap();
        (tenant_id, order)
    }

    fn status(tenant_id: TenantId, order: &WorkOrder, to: WorkOrderStatus) -> WorkOrderCommand {
        WorkOrderCommand::ChangeStatus(ChangeStatus {
            tenant_id,
            order_id: *order.id(),
            status: to,
            occurred_at: test_time(),
        })
    }

    fn add_part(tenant_id: TenantId, order: &WorkOrder, quantity: i64, cents: i64) -> WorkOrderCommand {
        WorkOrderCommand::AddUsedPart(AddUsedPart {
            tenant_id,
            order_id: *order.id(),
            item_id: StockItemId::generate(),
            quantity,
            unit_price: Decimal::new(cents, 2),
            user_id: UserId::new(),
            occurred_at: test_time(),
        })
    }

    #[test]
    fn open_starts_at_intake() {
        let (_, order) = opened();
        assert_eq!(order.status(), WorkOrderStatus::Intake);
        assert!(order.received_at().is_some());
        assert_eq!(order.display("Juan Pérez"), "OT-2024-0042 - Juan Pérez");
    }

    #[test]
    fn machine_year_before_1900_is_rejected() {
        let tenant_id = test_tenant_id();
        let order_id = WorkOrderId::generate();
        let mut cmd = open_cmd(tenant_id, order_id);
        cmd.machine.year = Some(1899);

        let err = WorkOrder::empty(order_id)
            .handle(&WorkOrderCommand::Open(cmd))
            .unwrap_err();
        assert_eq!(err, DomainError::field("machine_year", "must be greater than or equal to 1900"));
    }

    #[test]
    fn order_number_longer_than_twenty_is_rejected() {
        let tenant_id = test_tenant_id();
        let order_id = WorkOrderId::generate();
        let mut cmd = open_cmd(tenant_id, order_id);
        cmd.order_number = "X".repeat(ORDER_NUMBER_MAX + 1);
        assert!(WorkOrder::empty(order_id).handle(&WorkOrderCommand::Open(cmd)).is_err());
    }

    #[test]
    fn delivery_stamps_delivered_at_and_freezes_order() {
        let (tenant_id, mut order) = opened();
        for to in [
            WorkOrderStatus::Quote,
            WorkOrderStatus::Confirmation,
            WorkOrderStatus::InProgress,
            WorkOrderStatus::Finished,
            WorkOrderStatus::Delivered,
        ] {
            let cmd = status(tenant_id, &order, to);
            execute(&mut order, &cmd).unwrap();
        }
        assert!(order.delivered_at().is_some());

        let err = order.handle(&add_part(tenant_id, &order, 1, 100)).unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error"),
        }
        assert!(order.handle(&status(tenant_id, &order, WorkOrderStatus::Cancelled)).is_err());
    }

    #[test]
    fn skipping_a_step_is_rejected() {
        let (tenant_id, order) = opened();
        let err = order
            .handle(&status(tenant_id, &order, WorkOrderStatus::Finished))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) => assert!(msg.contains("intake")),
            _ => panic!("Expected InvariantViolation error"),
        }
    }

    #[test]
    fn parts_get_sequential_lines_and_exact_subtotals() {
        let (tenant_id, mut order) = opened();
        let first = add_part(tenant_id, &order, 2, 1999);
        execute(&mut order, &first).unwrap();
        let second = add_part(tenant_id, &order, 3, 550);
        execute(&mut order, &second).unwrap();

        let parts = order.used_parts();
        assert_eq!(parts.iter().map(|p| *p.id()).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(parts[0].subtotal(), Decimal::new(3998, 2));
        assert_eq!(parts[1].subtotal(), Decimal::new(1650, 2));
        assert_eq!(order.parts_total(), Decimal::new(5648, 2));
    }

    #[test]
    fn zero_quantity_part_is_rejected() {
        let (tenant_id, order) = opened();
        assert!(order.handle(&add_part(tenant_id, &order, 0, 100)).is_err());
    }

    #[test]
    fn set_costs_keeps_unspecified_cost() {
        let (tenant_id, mut order) = opened();
        let order_id = *order.id();
        execute(
            &mut order,
            &WorkOrderCommand::SetCosts(SetCosts {
                tenant_id,
                order_id,
                estimated_cost: Some(Decimal::new(45000, 0)),
                final_cost: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        execute(
            &mut order,
            &WorkOrderCommand::SetCosts(SetCosts {
                tenant_id,
                order_id,
                estimated_cost: None,
                final_cost: Some(Decimal::new(52000, 0)),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(order.estimated_cost().map(|p| p.amount()), Some(Decimal::new(4500000, 2)));
        assert_eq!(order.final_cost().map(|p| p.amount()), Some(Decimal::new(5200000, 2)));
    }

    #[test]
    fn assign_and_unassign_technician() {
        let (tenant_id, mut order) = opened();
        let order_id = *order.id();
        let tech = UserId::new();
        execute(
            &mut order,
            &WorkOrderCommand::AssignTechnician(AssignTechnician {
                tenant_id,
                order_id,
                technician: Some(tech),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(order.assigned_technician(), Some(tech));

        execute(
            &mut order,
            &WorkOrderCommand::AssignTechnician(AssignTechnician {
                tenant_id,
                order_id,
                technician: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(order.assigned_technician(), None);
    }

    #[test]
    fn part_line_numbers_do_not_wrap() {
        let (tenant_id, mut order) = opened();
        order.apply(&WorkOrderEvent::PartAdded(PartAdded {
            tenant_id,
            order_id: *order.id(),
            part: UsedPart {
                line_no: u32::MAX,
                item_id: StockItemId::generate(),
                quantity: 1,
                unit_price: Price::parse("unit_price", Decimal::new(100, 2)).unwrap(),
                used_at: test_time(),
                user_id: UserId::new(),
            },
            occurred_at: test_time(),
        }));

        match order.handle(&add_part(tenant_id, &order, 1, 100)).unwrap_err() {
            DomainError::InvariantViolation(msg) => assert!(msg.contains("line numbers")),
            other => panic!("expected InvariantViolation, got {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn subtotal_is_quantity_times_unit_price(q in 1i64..10_000, cents in 0i64..100_000_000) {
            let part = UsedPart {
                line_no: 1,
                item_id: StockItemId::generate(),
                quantity: q,
                unit_price: Price::parse("unit_price", Decimal::new(cents, 2)).unwrap(),
                used_at: Utc::now(),
                user_id: UserId::new(),
            };
            prop_assert_eq!(part.subtotal(), Decimal::from(q) * Decimal::new(cents, 2));
        }
    }
}
