use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;

use workshop_auth::Permission;
use workshop_core::AggregateId;
use workshop_infra::projections::{HomeVisitQuery, HomeVisitReadModel};
use workshop_infra::read_model::{Page, Pagination};
use workshop_infra::streams;
use workshop_infra::workflows::SpawnOrderFromVisit;
use workshop_service::{
    ChangeVisitStatus, HomeVisit, HomeVisitCommand, HomeVisitId, RecordVisitNotes, ScheduleVisit, VisitStatus,
    WorkOrderId,
};

use crate::app::dto::{
    self, ChangeStatusRequest, ScheduleVisitRequest, ServiceListParams, SpawnOrderRequest, VisitNotesRequest,
};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::routes::common::{authorized, committed, found, parse_id, require};
use crate::app::routes::work_orders::check_references;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(schedule_visit).get(list_visits))
        .route("/:id", get(get_visit))
        .route("/:id/status", post(change_status))
        .route("/:id/notes", post(record_notes))
        .route("/:id/spawn-order", post(spawn_order))
}

fn visit(id: AggregateId) -> HomeVisit {
    HomeVisit::empty(HomeVisitId::new(id))
}

pub async fn schedule_visit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<ScheduleVisitRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let visit_id = HomeVisitId::generate();

    let cmd = HomeVisitCommand::Schedule(ScheduleVisit {
        tenant_id,
        visit_id,
        client_id: body.client_id,
        machine_type_id: body.machine_type_id,
        visit_at: body.visit_at,
        address: body.address,
        problem_description: body.problem_description,
        technician: body.technician,
        user_id: principal.user_id(),
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::VISITS_WRITE])?;

    check_references(
        &services,
        tenant_id,
        body.client_id,
        body.machine_type_id,
        Some(body.technician),
        "technician",
    )?;

    let events = services.dispatch(tenant_id, visit_id.into(), streams::HOME_VISIT, cmd, |_, id| visit(id))?;
    Ok(committed(StatusCode::CREATED, visit_id, &events))
}

pub async fn list_visits(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(params): ApiQuery<ServiceListParams>,
) -> Result<Json<Page<HomeVisitReadModel>>, ApiError> {
    require(&tenant, &principal, Permission::VISITS_READ)?;
    let query = HomeVisitQuery {
        search: params.search,
        status: dto::parse_opt(params.status.as_deref())?,
        client_id: dto::parse_opt(params.client_id.as_deref())?,
        technician: dto::parse_opt(params.technician.as_deref())?,
    };
    let page = Pagination::new(params.limit, params.offset);
    Ok(Json(services.visits().list(tenant.tenant_id(), &query, page)))
}

pub async fn get_visit(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<HomeVisitReadModel>, ApiError> {
    require(&tenant, &principal, Permission::VISITS_READ)?;
    let visit_id: HomeVisitId = parse_id(&id, "visit")?;
    found(services.visits().get(tenant.tenant_id(), &visit_id), "visit")
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ChangeStatusRequest>,
) -> Result<Response, ApiError> {
    let visit_id: HomeVisitId = parse_id(&id, "visit")?;
    let status: VisitStatus = dto::parse_required(&body.status)?;
    let cmd = HomeVisitCommand::ChangeStatus(ChangeVisitStatus {
        tenant_id: tenant.tenant_id(),
        visit_id,
        status,
        occurred_at: Utc::now(),
    });
    dispatch_visit(&services, &tenant, &principal, visit_id, cmd)
}

pub async fn record_notes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<VisitNotesRequest>,
) -> Result<Response, ApiError> {
    let visit_id: HomeVisitId = parse_id(&id, "visit")?;
    let cmd = HomeVisitCommand::RecordNotes(RecordVisitNotes {
        tenant_id: tenant.tenant_id(),
        visit_id,
        notes: body.notes,
        occurred_at: Utc::now(),
    });
    dispatch_visit(&services, &tenant, &principal, visit_id, cmd)
}

/// Open a work order for the machine seen on the visit and link the two.
pub async fn spawn_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SpawnOrderRequest>,
) -> Result<Response, ApiError> {
    let visit_id: HomeVisitId = parse_id(&id, "visit")?;
    require(&tenant, &principal, Permission::VISITS_WRITE)?;
    require(&tenant, &principal, Permission::ORDERS_WRITE)?;

    let order_id = services.workflows().spawn_order_from_visit(SpawnOrderFromVisit {
        tenant_id: tenant.tenant_id(),
        visit_id,
        order_id: WorkOrderId::generate(),
        order_number: body.order_number,
        user_id: principal.user_id(),
        occurred_at: Utc::now(),
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": order_id.to_string(),
            "visit_id": visit_id.to_string(),
        })),
    )
        .into_response())
}

fn dispatch_visit(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    visit_id: HomeVisitId,
    cmd: HomeVisitCommand,
) -> Result<Response, ApiError> {
    let cmd = authorized(tenant, principal, cmd, &[Permission::VISITS_WRITE])?;
    let events = services.dispatch(tenant.tenant_id(), visit_id.into(), streams::HOME_VISIT, cmd, |_, id| visit(id))?;
    Ok(committed(StatusCode::OK, visit_id, &events))
}
