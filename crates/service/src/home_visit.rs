//! Home visits: a technician goes to the client's site to check a machine.
//! A visit may end with the machine moved to the workshop under a new order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workshop_core::{Aggregate, AggregateRoot, DomainError, TenantId, UserId, aggregate_id, field};
use workshop_events::Event;

use crate::{ClientId, MachineTypeId, VisitStatus, WorkOrderId};

aggregate_id!(
    /// Home visit identifier.
    HomeVisitId
);

/// Display timestamp format, `dd/mm/YYYY HH:MM`.
pub const DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeVisit {
    id: HomeVisitId,
    tenant_id: Option<TenantId>,
    client_id: Option<ClientId>,
    machine_type_id: Option<MachineTypeId>,
    visit_at: Option<DateTime<Utc>>,
    address: String,
    problem_description: String,
    technician: Option<UserId>,
    status: VisitStatus,
    visit_notes: Option<String>,
    generated_order: Option<WorkOrderId>,
    created_by: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl HomeVisit {
    pub fn empty(id: HomeVisitId) -> Self {
        Self {
            id,
            tenant_id: None,
            client_id: None,
            machine_type_id: None,
            visit_at: None,
            address: String::new(),
            problem_description: String::new(),
            technician: None,
            status: VisitStatus::default(),
            visit_notes: None,
            generated_order: None,
            created_by: None,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn machine_type_id(&self) -> Option<MachineTypeId> {
        self.machine_type_id
    }

    pub fn visit_at(&self) -> Option<DateTime<Utc>> {
        self.visit_at
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn problem_description(&self) -> &str {
        &self.problem_description
    }

    pub fn technician(&self) -> Option<UserId> {
        self.technician
    }

    pub fn status(&self) -> VisitStatus {
        self.status
    }

    pub fn visit_notes(&self) -> Option<&str> {
        self.visit_notes.as_deref()
    }

    pub fn generated_order(&self) -> Option<WorkOrderId> {
        self.generated_order
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    /// "<client name> - dd/mm/YYYY HH:MM".
    pub fn display(&self, client_name: &str) -> String {
        match self.visit_at {
            Some(at) => format!("{client_name} - {}", at.format(DISPLAY_FORMAT)),
            None => client_name.to_string(),
        }
    }

    fn ensure_exists(&self, tenant_id: TenantId, visit_id: HomeVisitId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != visit_id {
            return Err(DomainError::invariant("visit_id mismatch"));
        }
        Ok(())
    }

    fn ensure_not_cancelled(&self) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::invariant("visit is cancelled"));
        }
        Ok(())
    }
}

impl AggregateRoot for HomeVisit {
    type Id = HomeVisitId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleVisit {
    pub tenant_id: TenantId,
    pub visit_id: HomeVisitId,
    pub client_id: ClientId,
    pub machine_type_id: MachineTypeId,
    pub visit_at: DateTime<Utc>,
    pub address: String,
    pub problem_description: String,
    pub technician: UserId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeVisitStatus {
    pub tenant_id: TenantId,
    pub visit_id: HomeVisitId,
    pub status: VisitStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Replaces the visit notes; blank clears them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordVisitNotes {
    pub tenant_id: TenantId,
    pub visit_id: HomeVisitId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkWorkOrder {
    pub tenant_id: TenantId,
    pub visit_id: HomeVisitId,
    pub order_id: WorkOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomeVisitCommand {
    Schedule(ScheduleVisit),
    ChangeStatus(ChangeVisitStatus),
    RecordNotes(RecordVisitNotes),
    LinkWorkOrder(LinkWorkOrder),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitScheduled {
    pub tenant_id: TenantId,
    pub visit_id: HomeVisitId,
    pub client_id: ClientId,
    pub machine_type_id: MachineTypeId,
    pub visit_at: DateTime<Utc>,
    pub address: String,
    pub problem_description: String,
    pub technician: UserId,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitStatusChanged {
    pub tenant_id: TenantId,
    pub visit_id: HomeVisitId,
    pub from: VisitStatus,
    pub to: VisitStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitNotesRecorded {
    pub tenant_id: TenantId,
    pub visit_id: HomeVisitId,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderLinked {
    pub tenant_id: TenantId,
    pub visit_id: HomeVisitId,
    pub order_id: WorkOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomeVisitEvent {
    VisitScheduled(VisitScheduled),
    VisitStatusChanged(VisitStatusChanged),
    VisitNotesRecorded(VisitNotesRecorded),
    WorkOrderLinked(WorkOrderLinked),
}

impl HomeVisitEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            HomeVisitEvent::VisitScheduled(e) => e.tenant_id,
            HomeVisitEvent::VisitStatusChanged(e) => e.tenant_id,
            HomeVisitEvent::VisitNotesRecorded(e) => e.tenant_id,
            HomeVisitEvent::WorkOrderLinked(e) => e.tenant_id,
        }
    }
}

impl Event for HomeVisitEvent {
    fn event_type(&self) -> &'static str {
        match self {
            HomeVisitEvent::VisitScheduled(_) => "service.home_visit.scheduled",
            HomeVisitEvent::VisitStatusChanged(_) => "service.home_visit.status_changed",
            HomeVisitEvent::VisitNotesRecorded(_) => "service.home_visit.notes_recorded",
            HomeVisitEvent::WorkOrderLinked(_) => "service.home_visit.work_order_linked",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            HomeVisitEvent::VisitScheduled(e) => e.occurred_at,
            HomeVisitEvent::VisitStatusChanged(e) => e.occurred_at,
            HomeVisitEvent::VisitNotesRecorded(e) => e.occurred_at,
            HomeVisitEvent::WorkOrderLinked(e) => e.occurred_at,
        }
    }
}

impl Aggregate for HomeVisit {
    type Command = HomeVisitCommand;
    type Event = HomeVisitEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            HomeVisitEvent::VisitScheduled(e) => {
                self.id = e.visit_id;
                self.tenant_id = Some(e.tenant_id);
                self.client_id = Some(e.client_id);
                self.machine_type_id = Some(e.machine_type_id);
                self.visit_at = Some(e.visit_at);
                self.address = e.address.clone();
                self.problem_description = e.problem_description.clone();
                self.technician = Some(e.technician);
                self.created_by = Some(e.created_by);
                self.created_at = Some(e.occurred_at);
                self.status = VisitStatus::Scheduled;
                self.created = true;
            }
            HomeVisitEvent::VisitStatusChanged(e) => self.status = e.to,
            HomeVisitEvent::VisitNotesRecorded(e) => self.visit_notes = e.notes.clone(),
            HomeVisitEvent::WorkOrderLinked(e) => self.generated_order = Some(e.order_id),
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            HomeVisitCommand::Schedule(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("visit already exists"));
                }
                Ok(vec![HomeVisitEvent::VisitScheduled(VisitScheduled {
                    tenant_id: cmd.tenant_id,
                    visit_id: cmd.visit_id,
                    client_id: cmd.client_id,
                    machine_type_id: cmd.machine_type_id,
                    visit_at: cmd.visit_at,
                    address: field::required_text("address", &cmd.address)?,
                    problem_description: field::required_text(
                        "problem_description",
                        &cmd.problem_description,
                    )?,
                    technician: cmd.technician,
                    created_by: cmd.user_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            HomeVisitCommand::ChangeStatus(cmd) => {
                self.ensure_exists(cmd.tenant_id, cmd.visit_id)?;
                self.ensure_not_cancelled()?;
                if cmd.status == self.status {
                    return Ok(vec![]);
                }
                Ok(vec![HomeVisitEvent::VisitStatusChanged(VisitStatusChanged {
                    tenant_id: cmd.tenant_id,
                    visit_id: cmd.visit_id,
                    from: self.status,
                    to: cmd.status,
                    occurred_at: cmd.occurred_at,
                })])
            }
            HomeVisitCommand::RecordNotes(cmd) => {
                self.ensure_exists(cmd.tenant_id, cmd.visit_id)?;
                let notes = field::optional_text(cmd.notes.as_deref());
                if notes == self.visit_notes {
                    return Ok(vec![]);
                }
                Ok(vec![HomeVisitEvent::VisitNotesRecorded(VisitNotesRecorded {
                    tenant_id: cmd.tenant_id,
                    visit_id: cmd.visit_id,
                    notes,
                    occurred_at: cmd.occurred_at,
                })])
            }
            HomeVisitCommand::LinkWorkOrder(cmd) => {
                self.ensure_exists(cmd.tenant_id, cmd.visit_id)?;
                self.ensure_not_cancelled()?;
                if let Some(existing) = self.generated_order {
                    return Err(DomainError::conflict(format!(
                        "visit already generated work order {existing}"
                    )));
                }
                Ok(vec![HomeVisitEvent::WorkOrderLinked(WorkOrderLinked {
                    tenant_id: cmd.tenant_id,
                    visit_id: cmd.visit_id,
                    order_id: cmd.order_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use workshop_events::execute;

    fn scheduled() -> (TenantId, HomeVisit) {
        let tenant_id = TenantId::new();
        let visit_id = HomeVisitId::generate();
        let mut visit = HomeVisit::empty(visit_id);
        execute(
            &mut visit,
            &HomeVisitCommand::Schedule(ScheduleVisit {
                tenant_id,
                visit_id,
                client_id: ClientId::generate(),
                machine_type_id: MachineTypeId::generate(),
                visit_at: Utc.with_ymd_and_hms(2024, 5, 3, 15, 0, 0).unwrap(),
                address: "Parcela 12, Pelarco".into(),
                problem_description: "Bomba pierde presión".into(),
                technician: UserId::new(),
                user_id: UserId::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        (tenant_id, visit)
    }

    fn change(tenant_id: TenantId, visit: &HomeVisit, to: VisitStatus) -> HomeVisitCommand {
        HomeVisitCommand::ChangeStatus(ChangeVisitStatus {
            tenant_id,
            visit_id: *visit.id(),
            status: to,
            occurred_at: Utc::now(),
        })
    }

    fn link(tenant_id: TenantId, visit: &HomeVisit) -> HomeVisitCommand {
        HomeVisitCommand::LinkWorkOrder(LinkWorkOrder {
            tenant_id,
            visit_id: *visit.id(),
            order_id: WorkOrderId::generate(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn schedule_defaults_and_display() {
        let (_, visit) = scheduled();
        assert_eq!(visit.status(), VisitStatus::Scheduled);
        assert_eq!(visit.display("María Soto"), "María Soto - 03/05/2024 15:00");
    }

    #[test]
    fn blank_problem_description_is_rejected() {
        let visit_id = HomeVisitId::generate();
        let err = HomeVisit::empty(visit_id)
            .handle(&HomeVisitCommand::Schedule(ScheduleVisit {
                tenant_id: TenantId::new(),
                visit_id,
                client_id: ClientId::generate(),
                machine_type_id: MachineTypeId::generate(),
                visit_at: Utc::now(),
                address: "Calle 1".into(),
                problem_description: "  ".into(),
                technician: UserId::new(),
                user_id: UserId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::field("problem_description", "cannot be empty"));
    }

    #[test]
    fn status_may_move_freely_until_cancelled() {
        let (tenant_id, mut visit) = scheduled();
        for to in [
            VisitStatus::OnTheWay,
            VisitStatus::NotChecked,
            VisitStatus::Scheduled,
            VisitStatus::Cancelled,
        ] {
            let cmd = change(tenant_id, &visit, to);
            execute(&mut visit, &cmd).unwrap();
        }
        assert_eq!(visit.status(), VisitStatus::Cancelled);
        assert!(visit.handle(&change(tenant_id, &visit, VisitStatus::Scheduled)).is_err());
    }

    #[test]
    fn only_one_work_order_can_be_linked() {
        let (tenant_id, mut visit) = scheduled();
        let cmd = link(tenant_id, &visit);
        execute(&mut visit, &cmd).unwrap();
        assert!(visit.generated_order().is_some());

        let err = visit.handle(&link(tenant_id, &visit)).unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict error"),
        }
    }

    #[test]
    fn cancelled_visit_cannot_link_order() {
        let (tenant_id, mut visit) = scheduled();
        let cancel = change(tenant_id, &visit, VisitStatus::Cancelled);
        execute(&mut visit, &cancel).unwrap();
        assert!(matches!(
            visit.handle(&link(tenant_id, &visit)),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn notes_can_be_recorded_and_cleared() {
        let (tenant_id, mut visit) = scheduled();
        let visit_id = *visit.id();
        execute(
            &mut visit,
            &HomeVisitCommand::RecordNotes(RecordVisitNotes {
                tenant_id,
                visit_id,
                notes: Some("Sello roto, se retira".into()),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(visit.visit_notes(), Some("Sello roto, se retira"));

        execute(
            &mut visit,
            &HomeVisitCommand::RecordNotes(RecordVisitNotes {
                tenant_id,
                visit_id,
                notes: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(visit.visit_notes(), None);
    }
}
