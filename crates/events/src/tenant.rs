use workshop_core::TenantId;

use crate::EventEnvelope;

/// Messages that belong to exactly one tenant (workshop).
///
/// Reactors use this to drop messages from other tenants when pinned to one.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}

impl<E> TenantScoped for EventEnvelope<E> {
    fn tenant_id(&self) -> TenantId {
        EventEnvelope::tenant_id(self)
    }
}
