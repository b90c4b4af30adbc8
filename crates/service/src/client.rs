use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use workshop_core::{Aggregate, AggregateRoot, DomainError, TenantId, ValueObject, aggregate_id, field};
use workshop_events::Event;

pub const CLIENT_NAME_MAX: usize = 200;
pub const PHONE_MAX: usize = 20;
pub const TAX_ID_MAX: usize = 12;

aggregate_id!(
    /// Client identifier.
    ClientId
);

/// How to reach a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl ValueObject for ContactInfo {}

/// Normalized RUT: trimmed, upper-cased (`12.345.678-k` → `12.345.678-K`).
pub fn normalize_tax_id(value: Option<&str>) -> Result<Option<String>, DomainError> {
    Ok(field::optional("tax_id", value, TAX_ID_MAX)?.map(|v| v.to_uppercase()))
}

/// Aggregate root: Client (the machine owner a work order is opened for).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    id: ClientId,
    tenant_id: Option<TenantId>,
    name: String,
    contact: ContactInfo,
    tax_id: Option<String>,
    active: bool,
    registered_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Client {
    pub fn empty(id: ClientId) -> Self {
        Self {
            id,
            tenant_id: None,
            name: String::new(),
            contact: ContactInfo::default(),
            tax_id: None,
            active: true,
            registered_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactInfo {
        &self.contact
    }

    pub fn tax_id(&self) -> Option<&str> {
        self.tax_id.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.registered_at
    }

    pub fn exists(&self) -> bool {
        self.created
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

impl AggregateRoot for Client {
    type Id = ClientId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterClient {
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub name: String,
    pub contact: ContactInfo,
    pub tax_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Partial update; `None` keeps a field and a blank string clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateClient {
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetClientActive {
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientCommand {
    Register(RegisterClient),
    Update(UpdateClient),
    Deactivate(SetClientActive),
    Activate(SetClientActive),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistered {
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub name: String,
    pub contact: ContactInfo,
    pub tax_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientUpdated {
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub name: String,
    pub contact: ContactInfo,
    pub tax_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientActiveChanged {
    pub tenant_id: TenantId,
    pub client_id: ClientId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEvent {
    ClientRegistered(ClientRegistered),
    ClientUpdated(ClientUpdated),
    ClientDeactivated(ClientActiveChanged),
    ClientActivated(ClientActiveChanged),
}

impl ClientEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            ClientEvent::ClientRegistered(e) => e.tenant_id,
            ClientEvent::ClientUpdated(e) => e.tenant_id,
            ClientEvent::ClientDeactivated(e) | ClientEvent::ClientActivated(e) => e.tenant_id,
        }
    }
}

impl Event for ClientEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::ClientRegistered(_) => "service.client.registered",
            ClientEvent::ClientUpdated(_) => "service.client.updated",
            ClientEvent::ClientDeactivated(_) => "service.client.deactivated",
            ClientEvent::ClientActivated(_) => "service.client.activated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ClientEvent::ClientRegistered(e) => e.occurred_at,
            ClientEvent::ClientUpdated(e) => e.occurred_at,
            ClientEvent::ClientDeactivated(e) | ClientEvent::ClientActivated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Client {
    type Command = ClientCommand;
    type Event = ClientEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ClientEvent::ClientRegistered(e) => {
                self.id = e.client_id;
                self.tenant_id = Some(e.tenant_id);
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.tax_id = e.tax_id.clone();
                self.registered_at = Some(e.occurred_at);
                self.active = true;
                self.created = true;
            }
            ClientEvent::ClientUpdated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.tax_id = e.tax_id.clone();
            }
            ClientEvent::ClientDeactivated(_) => self.active = false,
            ClientEvent::ClientActivated(_) => self.active = true,
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ClientCommand::Register(cmd) => self.handle_register(cmd),
            ClientCommand::Update(cmd) => self.handle_update(cmd),
            ClientCommand::Deactivate(cmd) => self.handle_active(cmd, false),
            ClientCommand::Activate(cmd) => self.handle_active(cmd, true),
        }
    }
}

fn validate_contact(contact: &ContactInfo) -> Result<ContactInfo, DomainError> {
    Ok(ContactInfo {
        phone: field::optional("phone", contact.phone.as_deref(), PHONE_MAX)?,
        email: field::optional_email("email", contact.email.as_deref())?,
        address: field::optional_text(contact.address.as_deref()),
    })
}

impl Client {
    fn handle_register(&self, cmd: &RegisterClient) -> Result<Vec<ClientEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("client already exists"));
        }
        Ok(vec![ClientEvent::ClientRegistered(ClientRegistered {
            tenant_id: cmd.tenant_id,
            client_id: cmd.client_id,
            name: field::required("name", &cmd.name, CLIENT_NAME_MAX)?,
            contact: validate_contact(&cmd.contact)?,
            tax_id: normalize_tax_id(cmd.tax_id.as_deref())?,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateClient) -> Result<Vec<ClientEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;

        let name = match &cmd.name {
            Some(n) => field::required("name", n, CLIENT_NAME_MAX)?,
            None => self.name.clone(),
        };
        let contact = validate_contact(&ContactInfo {
            phone: cmd.phone.clone().or_else(|| self.contact.phone.clone()),
            email: cmd.email.clone().or_else(|| self.contact.email.clone()),
            address: cmd.address.clone().or_else(|| self.contact.address.clone()),
        })?;
        let tax_id = match &cmd.tax_id {
            Some(t) => normalize_tax_id(Some(t.as_str()))?,
            None => self.tax_id.clone(),
        };

        if name == self.name && contact == self.contact && tax_id == self.tax_id {
            return Ok(vec![]);
        }

        Ok(vec![ClientEvent::ClientUpdated(ClientUpdated {
            tenant_id: cmd.tenant_id,
            client_id: cmd.client_id,
            name,
            contact,
            tax_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_active(&self, cmd: &SetClientActive, active: bool) -> Result<Vec<ClientEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;
        if self.active == active {
            return Err(DomainError::conflict(if active {
                "client is already active"
            } else {
                "client is already inactive"
            }));
        }
        let changed = ClientActiveChanged {
            tenant_id: cmd.tenant_id,
            client_id: cmd.client_id,
            occurred_at: cmd.occurred_at,
        };
        Ok(vec![if active {
            ClientEvent::ClientActivated(changed)
        } else {
            ClientEvent::ClientDeactivated(changed)
        }])
    }
}
