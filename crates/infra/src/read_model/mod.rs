//! Tenant-isolated read model storage and list queries.

pub mod query;
pub mod tenant_store;

pub use query::{DEFAULT_LIMIT, MAX_LIMIT, Page, Pagination, contains_ci};
pub use tenant_store::{InMemoryTenantStore, TenantStore};
