//! Storage locations (shelf, bin, room) where items are kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workshop_core::{Aggregate, AggregateRoot, DomainError, TenantId, aggregate_id, field};
use workshop_events::Event;

pub const LOCATION_NAME_MAX: usize = 100;

aggregate_id!(
    /// Storage location identifier.
    LocationId
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    id: LocationId,
    tenant_id: Option<TenantId>,
    name: String,
    description: Option<String>,
    active: bool,
    version: u64,
    created: bool,
}

impl Location {
    pub fn empty(id: LocationId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            description: None,
            active: true,
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

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn ensure_exists(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }
}

impl AggregateRoot for Location {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLocation {
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub name: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateLocation {
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLocationActive {
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationCommand {
    Create(CreateLocation),
    Update(UpdateLocation),
    Deactivate(SetLocationActive),
    Activate(SetLocationActive),
}

/// Full descriptive state after create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationDetails {
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub name: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationActiveChanged {
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationEvent {
    LocationCreated(LocationDetails),
    LocationUpdated(LocationDetails),
    LocationDeactivated(LocationActiveChanged),
    LocationActivated(LocationActiveChanged),
}

impl LocationEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            LocationEvent::LocationCreated(e) | LocationEvent::LocationUpdated(e) => e.tenant_id,
            LocationEvent::LocationDeactivated(e) | LocationEvent::LocationActivated(e) => e.tenant_id,
        }
    }
}

impl Event for LocationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LocationEvent::LocationCreated(_) => "inventory.location.created",
            LocationEvent::LocationUpdated(_) => "inventory.location.updated",
            LocationEvent::LocationDeactivated(_) => "inventory.location.deactivated",
            LocationEvent::LocationActivated(_) => "inventory.location.activated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LocationEvent::LocationCreated(e) | LocationEvent::LocationUpdated(e) => e.occurred_at,
            LocationEvent::LocationDeactivated(e) | LocationEvent::LocationActivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Location {
    type Command = LocationCommand;
    type Event = LocationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LocationEvent::LocationCreated(e) => {
                self.id = e.location_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.active = true;
                self.created = true;
            }
            LocationEvent::LocationUpdated(e) => {
                self.name = e.name.clone();
                self.description = e.description.clone();
            }
            LocationEvent::LocationDeactivated(_) => self.active = false,
            LocationEvent::LocationActivated(_) => self.active = true,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LocationCommand::Create(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("location already exists"));
                }
                Ok(vec![LocationEvent::LocationCreated(LocationDetails {
                    tenant_id: cmd.tenant_id,
                    location_id: cmd.location_id,
                    name: field::required("name", &cmd.name, LOCATION_NAME_MAX)?,
                    description: field::optional_text(cmd.description.as_deref()),
                    occurred_at: cmd.occurred_at,
                })])
            }
            LocationCommand::Update(cmd) => {
                self.ensure_exists(cmd.tenant_id)?;
                let name = match &cmd.name {
                    Some(n) => field::required("name", n, LOCATION_NAME_MAX)?,
                    None => self.name.clone(),
                };
                let description = match &cmd.description {
                    Some(d) => field::optional_text(Some(d.as_str())),
                    None => self.description.clone(),
                };
                if name == self.name && description == self.description {
                    return Ok(vec![]);
                }
                Ok(vec![LocationEvent::LocationUpdated(LocationDetails {
                    tenant_id: cmd.tenant_id,
                    location_id: cmd.location_id,
                    name,
                    description,
                    occurred_at: cmd.occurred_at,
                })])
            }
            LocationCommand::Deactivate(cmd) | LocationCommand::Activate(cmd) => {
                self.ensure_exists(cmd.tenant_id)?;
                let deactivate = matches!(command, LocationCommand::Deactivate(_));
                if deactivate != self.active {
                    return Err(DomainError::conflict(if deactivate {
                        "location is already inactive"
                    } else {
                        "location is already active"
                    }));
                }
                let changed = LocationActiveChanged {
                    tenant_id: cmd.tenant_id,
                    location_id: cmd.location_id,
                    occurred_at: cmd.occurred_at,
                };
                Ok(vec![if deactivate {
                    LocationEvent::LocationDeactivated(changed)
                } else {
                    LocationEvent::LocationActivated(changed)
                }])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workshop_events::execute;

    fn created(tenant_id: TenantId) -> Location {
        let id = LocationId::generate();
        let mut loc = Location::empty(id);
        execute(
            &mut loc,
            &LocationCommand::Create(CreateLocation {
                tenant_id,
                location_id: id,
                name: "Estante A-3".into(),
                description: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        loc
    }

    #[test]
    fn update_changes_name_and_bumps_version() {
        let tenant_id = TenantId::new();
        let mut loc = created(tenant_id);
        let id = *loc.id();

        execute(
            &mut loc,
            &LocationCommand::Update(UpdateLocation {
                tenant_id,
                location_id: id,
                name: Some("Bodega 2".into()),
                description: Some("fondo".into()),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        assert_eq!(loc.name(), "Bodega 2");
        assert_eq!(loc.description(), Some("fondo"));
        assert_eq!(loc.version(), 2);
    }

    #[test]
    fn activate_requires_inactive_location() {
        let tenant_id = TenantId::new();
        let loc = created(tenant_id);
        let err = loc
            .handle(&LocationCommand::Activate(SetLocationActive {
                tenant_id,
                location_id: *loc.id(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::conflict("location is already active"));
    }

    #[test]
    fn update_on_missing_location_is_not_found() {
        let id = LocationId::generate();
        let loc = Location::empty(id);
        let err = loc
            .handle(&LocationCommand::Update(UpdateLocation {
                tenant_id: TenantId::new(),
                location_id: id,
                name: None,
                description: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }
}
