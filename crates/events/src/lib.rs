//! `workshop-events` — event contract, envelopes and pub/sub mechanics.
//!
//! Domain crates describe what happened with typed events implementing
//! [`Event`]; infrastructure wraps committed events in an [`EventEnvelope`]
//! and fans them out over an [`EventBus`] to projections and reactors.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use tenant::TenantScoped;
