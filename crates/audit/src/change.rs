use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use workshop_core::{Aggregate, AggregateRoot, DomainError, TenantId, UserId, aggregate_id, field};
use workshop_events::Event;

pub const TABLE_MAX: usize = 50;
pub const OBJECT_ID_MAX: usize = 50;

aggregate_id!(
    /// Change record identifier.
    ChangeRecordId
);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Edit,
    Delete,
    Activate,
    Deactivate,
}

impl ChangeAction {
    pub const ALL: [ChangeAction; 5] = [
        ChangeAction::Create,
        ChangeAction::Edit,
        ChangeAction::Delete,
        ChangeAction::Activate,
        ChangeAction::Deactivate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "create",
            ChangeAction::Edit => "edit",
            ChangeAction::Delete => "delete",
            ChangeAction::Activate => "activate",
            ChangeAction::Deactivate => "deactivate",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChangeAction::Create => "Create",
            ChangeAction::Edit => "Edit",
            ChangeAction::Delete => "Delete",
            ChangeAction::Activate => "Activate",
            ChangeAction::Deactivate => "Deactivate",
        }
    }
}

impl core::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChangeAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| DomainError::field("action", format!("'{s}' is not a valid choice")))
    }
}

/// Aggregate root: one audit entry. Written once, never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    id: ChangeRecordId,
    tenant_id: Option<TenantId>,
    entry: Option<ChangeRecorded>,
    version: u64,
}

impl ChangeRecord {
    pub fn empty(id: ChangeRecordId) -> Self {
        Self {
            id,
            tenant_id: None,
            entry: None,
            version: 0,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn entry(&self) -> Option<&ChangeRecorded> {
        self.entry.as_ref()
    }
}

impl AggregateRoot for ChangeRecord {
    type Id = ChangeRecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordChange {
    pub tenant_id: TenantId,
    pub change_id: ChangeRecordId,
    pub table: String,
    pub object_id: String,
    pub action: ChangeAction,
    pub description: String,
    pub previous: Option<Value>,
    pub new: Option<Value>,
    pub user_id: UserId,
    /// Textual IPv4/IPv6 address of the client that made the change.
    pub ip_address: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeCommand {
    Record(RecordChange),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecorded {
    pub tenant_id: TenantId,
    pub change_id: ChangeRecordId,
    pub table: String,
    pub object_id: String,
    pub action: ChangeAction,
    pub description: String,
    pub previous: Option<Value>,
    pub new: Option<Value>,
    pub user_id: UserId,
    pub ip_address: Option<IpAddr>,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeRecorded {
    /// "<Action> - <table> (dd/mm/YYYY HH:MM)".
    pub fn display(&self) -> String {
        format!(
            "{} - {} ({})",
            self.action.label(),
            self.table,
            self.occurred_at.format("%d/%m/%Y %H:%M")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeEvent {
    ChangeRecorded(ChangeRecorded),
}

impl ChangeEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            ChangeEvent::ChangeRecorded(e) => e.tenant_id,
        }
    }
}

impl Event for ChangeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ChangeEvent::ChangeRecorded(_) => "audit.change.recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ChangeEvent::ChangeRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ChangeRecord {
    type Command = ChangeCommand;
    type Event = ChangeEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ChangeEvent::ChangeRecorded(e) => {
                self.id = e.change_id;
                self.tenant_id = Some(e.tenant_id);
                self.entry = Some(e.clone());
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ChangeCommand::Record(cmd) => {
                if self.entry.is_some() {
                    return Err(DomainError::conflict("change records are append-only"));
                }

                let ip_address = match field::optional_text(cmd.ip_address.as_deref()) {
                    Some(raw) => Some(raw.parse::<IpAddr>().map_err(|_| {
                        DomainError::field("ip_address", "enter a valid IPv4 or IPv6 address")
                    })?),
                    None => None,
                };

                Ok(vec![ChangeEvent::ChangeRecorded(ChangeRecorded {
                    tenant_id: cmd.tenant_id,
                    change_id: cmd.change_id,
                    table: field::required("table", &cmd.table, TABLE_MAX)?,
                    object_id: field::required("object_id", &cmd.object_id, OBJECT_ID_MAX)?,
                    action: cmd.action,
                    description: field::required_text("description", &cmd.description)?,
                    previous: cmd.previous.clone(),
                    new: cmd.new.clone(),
                    user_id: cmd.user_id,
                    ip_address,
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
    use serde_json::json;
    use workshop_events::execute;

    fn record(change_id: ChangeRecordId, ip: Option<&str>) -> ChangeCommand {
        ChangeCommand::Record(RecordChange {
            tenant_id: TenantId::new(),
            change_id,
            table: "stock_item".into(),
            object_id: "RD-6204".into(),
            action: ChangeAction::Edit,
            description: "Precio de venta actualizado".into(),
            previous: Some(json!({"sale_price": "5990.00"})),
            new: Some(json!({"sale_price": "6490.00"})),
            user_id: UserId::new(),
            ip_address: ip.map(str::to_string),
            occurred_at: Utc.with_ymd_and_hms(2024, 1, 9, 8, 5, 0).unwrap(),
        })
    }

    #[test]
    fn records_entry_with_ipv6_and_display() {
        let id = ChangeRecordId::generate();
        let mut rec = ChangeRecord::empty(id);
        execute(&mut rec, &record(id, Some("2001:db8::1"))).unwrap();

        let entry = rec.entry().unwrap();
        assert!(entry.ip_address.unwrap().is_ipv6());
        assert_eq!(entry.display(), "Edit - stock_item (09/01/2024 08:05)");
    }

    #[test]
    fn second_write_is_rejected() {
        let id = ChangeRecordId::generate();
        let mut rec = ChangeRecord::empty(id);
        execute(&mut rec, &record(id, None)).unwrap();

        match rec.handle(&record(id, None)).unwrap_err() {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict error"),
        }
    }

    #[test]
    fn invalid_ip_is_a_field_error() {
        let id = ChangeRecordId::generate();
        let err = ChangeRecord::empty(id).handle(&record(id, Some("300.1.1.1"))).unwrap_err();
        assert_eq!(err, DomainError::field("ip_address", "enter a valid IPv4 or IPv6 address"));
    }

    #[test]
    fn action_parses_only_known_values() {
        assert_eq!("deactivate".parse::<ChangeAction>().unwrap(), ChangeAction::Deactivate);
        assert!("modificar".parse::<ChangeAction>().is_err());
    }
}
