//! `workshop-core` — domain foundation building blocks.
//!
//! Pure domain primitives shared by the workshop crates: identifiers, the
//! aggregate contract, the domain error model and field validation helpers.
//! No infrastructure concerns live here.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod field;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId, UserId};
pub use money::Price;
pub use value_object::ValueObject;
