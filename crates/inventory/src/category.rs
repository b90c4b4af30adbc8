//! Item categories (e.g. "Bearings", "Filters").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workshop_core::{Aggregate, AggregateRoot, DomainError, TenantId, aggregate_id, field};
use workshop_events::Event;

pub const CATEGORY_NAME_MAX: usize = 100;

aggregate_id!(
    /// Category identifier.
    CategoryId
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    id: CategoryId,
    tenant_id: Option<TenantId>,
    name: String,
    description: Option<String>,
    active: bool,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Category {
    pub fn empty(id: CategoryId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            description: None,
            active: true,
            created_at: None,
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

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
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

impl AggregateRoot for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCategory {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// `None` keeps a field; a blank description clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCategory {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCategoryActive {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryCommand {
    Create(CreateCategory),
    Update(UpdateCategory),
    Deactivate(SetCategoryActive),
    Activate(SetCategoryActive),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCreated {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdated {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryActiveChanged {
    pub tenant_id: TenantId,
    pub category_id: CategoryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryEvent {
    CategoryCreated(CategoryCreated),
    CategoryUpdated(CategoryUpdated),
    CategoryDeactivated(CategoryActiveChanged),
    CategoryActivated(CategoryActiveChanged),
}

impl CategoryEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            CategoryEvent::CategoryCreated(e) => e.tenant_id,
            CategoryEvent::CategoryUpdated(e) => e.tenant_id,
            CategoryEvent::CategoryDeactivated(e) | CategoryEvent::CategoryActivated(e) => e.tenant_id,
        }
    }
}

impl Event for CategoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CategoryEvent::CategoryCreated(_) => "inventory.category.created",
            CategoryEvent::CategoryUpdated(_) => "inventory.category.updated",
            CategoryEvent::CategoryDeactivated(_) => "inventory.category.deactivated",
            CategoryEvent::CategoryActivated(_) => "inventory.category.activated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CategoryEvent::CategoryCreated(e) => e.occurred_at,
            CategoryEvent::CategoryUpdated(e) => e.occurred_at,
            CategoryEvent::CategoryDeactivated(e) | CategoryEvent::CategoryActivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Category {
    type Command = CategoryCommand;
    type Event = CategoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CategoryEvent::CategoryCreated(e) => {
                self.id = e.category_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.created_at = Some(e.occurred_at);
                self.active = true;
                self.created = true;
            }
            CategoryEvent::CategoryUpdated(e) => {
                self.name = e.name.clone();
                self.description = e.description.clone();
            }
            CategoryEvent::CategoryDeactivated(_) => self.active = false,
            CategoryEvent::CategoryActivated(_) => self.active = true,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CategoryCommand::Create(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("category already exists"));
                }
                Ok(vec![CategoryEvent::CategoryCreated(CategoryCreated {
                    tenant_id: cmd.tenant_id,
                    category_id: cmd.category_id,
                    name: field::required("name", &cmd.name, CATEGORY_NAME_MAX)?,
                    description: field::optional_text(cmd.description.as_deref()),
                    occurred_at: cmd.occurred_at,
                })])
            }
            CategoryCommand::Update(cmd) => {
                self.ensure_exists(cmd.tenant_id)?;
                let name = match &cmd.name {
                    Some(n) => field::required("name", n, CATEGORY_NAME_MAX)?,
                    None => self.name.clone(),
                };
                let description = match &cmd.description {
                    Some(d) => field::optional_text(Some(d.as_str())),
                    None => self.description.clone(),
                };
                if name == self.name && description == self.description {
                    return Ok(vec![]);
                }
                Ok(vec![CategoryEvent::CategoryUpdated(CategoryUpdated {
                    tenant_id: cmd.tenant_id,
                    category_id: cmd.category_id,
                    name,
                    description,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CategoryCommand::Deactivate(cmd) => {
                self.ensure_exists(cmd.tenant_id)?;
                if !self.active {
                    return Err(DomainError::conflict("category is already inactive"));
                }
                Ok(vec![CategoryEvent::CategoryDeactivated(cmd.into())])
            }
            CategoryCommand::Activate(cmd) => {
                self.ensure_exists(cmd.tenant_id)?;
                if self.active {
                    return Err(DomainError::conflict("category is already active"));
                }
                Ok(vec![CategoryEvent::CategoryActivated(cmd.into())])
            }
        }
    }
}

impl From<&SetCategoryActive> for CategoryActiveChanged {
    fn from(cmd: &SetCategoryActive) -> Self {
        Self {
            tenant_id: cmd.tenant_id,
            category_id: cmd.category_id,
            occurred_at: cmd.occurred_at,
        }
    }
}
