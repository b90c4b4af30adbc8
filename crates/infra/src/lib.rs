//! Infrastructure layer: event store, dispatch, read models and workflows.
//!
//! Everything here is in-process. The store is the source of truth; read
//! models are rebuilt from it and updated by bus subscribers.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod provisioning;
pub mod read_model;
pub mod streams;
pub mod unique_index;
pub mod workers;
pub mod workflows;

#[cfg(test)]
mod integration_tests;
