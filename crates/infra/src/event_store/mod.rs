//! Append-only event store boundary.
//!
//! Streams are keyed by `(tenant_id, aggregate_id)`; every record a workshop
//! keeps (items, orders, visits, profiles, audit entries) is one stream.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
