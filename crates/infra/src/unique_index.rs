//! Tenant-scoped uniqueness guard for natural keys.
//!
//! Event streams are keyed by id, so "one item per code" cannot be checked by
//! a single aggregate. Callers reserve the key before dispatching and commit
//! the reservation once the command is stored; a dropped reservation releases
//! the key again.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

use workshop_core::{AggregateId, TenantId};

use crate::command_dispatcher::DispatchError;

/// Natural keys that must be unique within a tenant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UniqueKey {
    Username,
    CategoryName,
    ItemCode,
    ClientTaxId,
    OrderNumber,
}

impl UniqueKey {
    /// Field name reported back to the caller.
    pub fn field(&self) -> &'static str {
        match self {
            UniqueKey::Username => "username",
            UniqueKey::CategoryName => "name",
            UniqueKey::ItemCode => "code",
            UniqueKey::ClientTaxId => "tax_id",
            UniqueKey::OrderNumber => "order_number",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UniqueKeyError {
    #[error("{field}: a record with this value already exists")]
    Taken { field: &'static str, value: String },

    #[error("unique key index lock poisoned")]
    Poisoned,
}

impl From<UniqueKeyError> for DispatchError {
    fn from(value: UniqueKeyError) -> Self {
        match value {
            UniqueKeyError::Taken { .. } => DispatchError::Conflict(value.to_string()),
            UniqueKeyError::Poisoned => DispatchError::Store(
                crate::event_store::EventStoreError::InvalidAppend(value.to_string()),
            ),
        }
    }
}

type Slot = (TenantId, UniqueKey, String);

/// In-process unique-key index.
#[derive(Debug, Default)]
pub struct UniqueKeyIndex {
    owners: Mutex<HashMap<Slot, AggregateId>>,
}

impl UniqueKeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `value` for `owner`.
    ///
    /// Re-claiming a value the owner already holds succeeds and leaves the
    /// existing claim untouched when the reservation is dropped.
    pub fn reserve(
        &self,
        tenant_id: TenantId,
        key: UniqueKey,
        value: &str,
        owner: AggregateId,
    ) -> Result<Reservation<'_>, UniqueKeyError> {
        let slot = (tenant_id, key, normalize(value));
        let mut owners = self.owners.lock().map_err(|_| UniqueKeyError::Poisoned)?;

        match owners.get(&slot) {
            Some(existing) if *existing == owner => Ok(Reservation {
                index: self,
                slot: None,
            }),
            Some(_) => Err(UniqueKeyError::Taken {
                field: key.field(),
                value: value.trim().to_string(),
            }),
            None => {
                owners.insert(slot.clone(), owner);
                Ok(Reservation {
                    index: self,
                    slot: Some(slot),
                })
            }
        }
    }

    /// Free a value previously committed by `owner` (e.g. after a rename).
    pub fn release(&self, tenant_id: TenantId, key: UniqueKey, value: &str, owner: AggregateId) {
        if let Ok(mut owners) = self.owners.lock() {
            let slot = (tenant_id, key, normalize(value));
            if owners.get(&slot) == Some(&owner) {
                owners.remove(&slot);
            }
        }
    }

    pub fn owner(&self, tenant_id: TenantId, key: UniqueKey, value: &str) -> Option<AggregateId> {
        let owners = self.owners.lock().ok()?;
        owners.get(&(tenant_id, key, normalize(value))).copied()
    }

    fn remove(&self, slot: &Slot) {
        if let Ok(mut owners) = self.owners.lock() {
            owners.remove(slot);
        }
    }
}

/// A pending claim on a unique value.
#[derive(Debug)]
#[must_use = "dropping a reservation releases the key"]
pub struct Reservation<'a> {
    index: &'a UniqueKeyIndex,
    slot: Option<Slot>,
}

impl Reservation<'_> {
    /// Keep the claim (the owning command was stored).
    pub fn commit(mut self) {
        self.slot = None;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.index.remove(&slot);
        }
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
