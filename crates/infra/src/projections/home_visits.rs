use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use workshop_core::{TenantId, UserId};
use workshop_events::EventEnvelope;
use workshop_service::{ClientId, HomeVisitEvent, HomeVisitId, MachineTypeId, VisitStatus, WorkOrderId};

use super::{decode, ensure_stream, Projection, ProjectionError, StreamCursors};
use crate::read_model::{contains_ci, Page, Pagination, TenantStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeVisitReadModel {
    pub visit_id: HomeVisitId,
    pub client_id: ClientId,
    pub machine_type_id: MachineTypeId,
    pub visit_at: DateTime<Utc>,
    pub address: String,
    pub problem_description: String,
    pub technician: UserId,
    pub status: VisitStatus,
    pub visit_notes: Option<String>,
    pub generated_order: Option<WorkOrderId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HomeVisitQuery {
    /// Matches address, problem description and notes.
    pub search: Option<String>,
    pub status: Option<VisitStatus>,
    pub client_id: Option<ClientId>,
    pub technician: Option<UserId>,
}

/// Visit calendar per tenant.
#[derive(Debug)]
pub struct HomeVisitsProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> HomeVisitsProjection<S>
where
    S: TenantStore<HomeVisitId, HomeVisitReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::default(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, visit_id: &HomeVisitId) -> Option<HomeVisitReadModel> {
        self.store.get(tenant_id, visit_id)
    }

    /// Ordered by visit time.
    pub fn list(&self, tenant_id: TenantId, query: &HomeVisitQuery, page: Pagination) -> Page<HomeVisitReadModel> {
        let mut visits: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|v| query.status.is_none_or(|s| v.status == s))
            .filter(|v| query.client_id.is_none_or(|c| v.client_id == c))
            .filter(|v| query.technician.is_none_or(|t| v.technician == t))
            .filter(|v| {
                contains_ci(
                    query.search.as_deref(),
                    [
                        Some(v.address.as_str()),
                        Some(v.problem_description.as_str()),
                        v.visit_notes.as_deref(),
                    ],
                )
            })
            .collect();
        visits.sort_by_key(|v| v.visit_at);
        page.apply(visits)
    }

    fn modify(&self, tenant_id: TenantId, visit_id: HomeVisitId, change: impl FnOnce(&mut HomeVisitReadModel)) {
        if let Some(mut visit) = self.store.get(tenant_id, &visit_id) {
            change(&mut visit);
            self.store.upsert(tenant_id, visit_id, visit);
        }
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let event: HomeVisitEvent = decode(envelope)?;
        let tenant_id = envelope.tenant_id();

        match event {
            HomeVisitEvent::VisitScheduled(e) => {
                ensure_stream(envelope, e.tenant_id, e.visit_id.into())?;
                let visit = HomeVisitReadModel {
                    visit_id: e.visit_id,
                    client_id: e.client_id,
                    machine_type_id: e.machine_type_id,
                    visit_at: e.visit_at,
                    address: e.address,
                    problem_description: e.problem_description,
                    technician: e.technician,
                    status: VisitStatus::default(),
                    visit_notes: None,
                    generated_order: None,
                    created_by: e.created_by,
                    created_at: e.occurred_at,
                };
                self.store.upsert(tenant_id, e.visit_id, visit);
            }
            HomeVisitEvent::VisitStatusChanged(e) => {
                ensure_stream(envelope, e.tenant_id, e.visit_id.into())?;
                self.modify(tenant_id, e.visit_id, |v| v.status = e.to);
            }
            HomeVisitEvent::VisitNotesRecorded(e) => {
                ensure_stream(envelope, e.tenant_id, e.visit_id.into())?;
                self.modify(tenant_id, e.visit_id, |v| v.visit_notes = e.notes);
            }
            HomeVisitEvent::WorkOrderLinked(e) => {
                ensure_stream(envelope, e.tenant_id, e.visit_id.into())?;
                self.modify(tenant_id, e.visit_id, |v| v.generated_order = Some(e.order_id));
            }
        }
        Ok(())
    }
}

impl<S> Projection for HomeVisitsProjection<S>
where
    S: TenantStore<HomeVisitId, HomeVisitReadModel>,
{
    fn name(&self) -> &'static str {
        "home_visits"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::HOME_VISIT {
            return Ok(());
        }
        self.cursors.track(envelope, || self.apply(envelope))
    }

    fn reset_tenant(&self, tenant_id: TenantId) {
        self.cursors.reset_tenant(tenant_id);
        self.store.clear_tenant(tenant_id);
    }
}
