use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workshop_core::{Aggregate, AggregateRoot, DomainError, TenantId, aggregate_id, field};
use workshop_events::Event;

pub const MACHINE_TYPE_NAME_MAX: usize = 100;

aggregate_id!(
    /// Machine type identifier (e.g. "Chainsaw", "Lawn mower").
    MachineTypeId
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineType {
    id: MachineTypeId,
    tenant_id: Option<TenantId>,
    name: String,
    description: Option<String>,
    version: u64,
    created: bool,
}

impl MachineType {
    pub fn empty(id: MachineTypeId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            description: None,
            version: 0,
            created: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn exists(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for MachineType {
    type Id = MachineTypeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMachineType {
    pub tenant_id: TenantId,
    pub machine_type_id: MachineTypeId,
    pub name: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMachineType {
    pub tenant_id: TenantId,
    pub machine_type_id: MachineTypeId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineTypeCommand {
    Create(CreateMachineType),
    Update(UpdateMachineType),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineTypeDefined {
    pub tenant_id: TenantId,
    pub machine_type_id: MachineTypeId,
    pub name: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineTypeEvent {
    MachineTypeCreated(MachineTypeDefined),
    MachineTypeUpdated(MachineTypeDefined),
}

impl MachineTypeEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            MachineTypeEvent::MachineTypeCreated(e) | MachineTypeEvent::MachineTypeUpdated(e) => e.tenant_id,
        }
    }
}

impl Event for MachineTypeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MachineTypeEvent::MachineTypeCreated(_) => "service.machine_type.created",
            MachineTypeEvent::MachineTypeUpdated(_) => "service.machine_type.updated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MachineTypeEvent::MachineTypeCreated(e) | MachineTypeEvent::MachineTypeUpdated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for MachineType {
    type Command = MachineTypeCommand;
    type Event = MachineTypeEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MachineTypeEvent::MachineTypeCreated(e) => {
                self.id = e.machine_type_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.created = true;
            }
            MachineTypeEvent::MachineTypeUpdated(e) => {
                self.name = e.name.clone();
                self.description = e.description.clone();
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MachineTypeCommand::Create(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("machine type already exists"));
                }
                Ok(vec![MachineTypeEvent::MachineTypeCreated(MachineTypeDefined {
                    tenant_id: cmd.tenant_id,
                    machine_type_id: cmd.machine_type_id,
                    name: field::required("name", &cmd.name, MACHINE_TYPE_NAME_MAX)?,
                    description: field::optional_text(cmd.description.as_deref()),
                    occurred_at: cmd.occurred_at,
                })])
            }
            MachineTypeCommand::Update(cmd) => {
                if !self.created {
                    return Err(DomainError::not_found());
                }
                if self.tenant_id != Some(cmd.tenant_id) {
                    return Err(DomainError::invariant("tenant mismatch"));
                }
                let name = match &cmd.name {
                    Some(n) => field::required("name", n, MACHINE_TYPE_NAME_MAX)?,
                    None => self.name.clone(),
                };
                let description = match &cmd.description {
                    Some(d) => field::optional_text(Some(d.as_str())),
                    None => self.description.clone(),
                };
                if name == self.name && description == self.description {
                    return Ok(vec![]);
                }
                Ok(vec![MachineTypeEvent::MachineTypeUpdated(MachineTypeDefined {
                    tenant_id: cmd.tenant_id,
                    machine_type_id: cmd.machine_type_id,
                    name,
                    description,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workshop_events::execute;

    #[test]
    fn create_then_rename() {
        let tenant_id = TenantId::new();
        let id = MachineTypeId::generate();
        let mut mt = MachineType::empty(id);

        execute(
            &mut mt,
            &MachineTypeCommand::Create(CreateMachineType {
                tenant_id,
                machine_type_id: id,
                name: "Motosierra".into(),
                description: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        execute(
            &mut mt,
            &MachineTypeCommand::Update(UpdateMachineType {
                tenant_id,
                machine_type_id: id,
                name: Some("Motosierra a gasolina".into()),
                description: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        assert_eq!(mt.name(), "Motosierra a gasolina");
        assert_eq!(mt.version(), 2);
    }

    #[test]
    fn empty_name_is_rejected() {
        let id = MachineTypeId::generate();
        let err = MachineType::empty(id)
            .handle(&MachineTypeCommand::Create(CreateMachineType {
                tenant_id: TenantId::new(),
                machine_type_id: id,
                name: " ".into(),
                description: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::field("name", "cannot be empty"));
    }
}
