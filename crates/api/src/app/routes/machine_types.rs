use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use chrono::Utc;

use workshop_auth::Permission;
use workshop_core::AggregateId;
use workshop_infra::projections::{CatalogEntryReadModel, CatalogQuery};
use workshop_infra::read_model::{Page, Pagination};
use workshop_infra::streams;
use workshop_service::{CreateMachineType, MachineType, MachineTypeCommand, MachineTypeId, UpdateMachineType};

use crate::app::dto::{CatalogListParams, CreateCatalogEntryRequest, UpdateCatalogEntryRequest};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::routes::common::{authorized, committed, found, parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_machine_type).get(list_machine_types))
        .route("/:id", get(get_machine_type).patch(update_machine_type))
}

fn machine_type(id: AggregateId) -> MachineType {
    MachineType::empty(MachineTypeId::new(id))
}

pub async fn create_machine_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<CreateCatalogEntryRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let machine_type_id = MachineTypeId::generate();

    let cmd = MachineTypeCommand::Create(CreateMachineType {
        tenant_id,
        machine_type_id,
        name: body.name,
        description: body.description,
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::CLIENTS_WRITE])?;
    let events = services.dispatch(tenant_id, machine_type_id.into(), streams::MACHINE_TYPE, cmd, |_, id| {
        machine_type(id)
    })?;

    Ok(committed(StatusCode::CREATED, machine_type_id, &events))
}

pub async fn list_machine_types(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(params): ApiQuery<CatalogListParams>,
) -> Result<Json<Page<CatalogEntryReadModel>>, ApiError> {
    require(&tenant, &principal, Permission::CLIENTS_READ)?;
    let query = CatalogQuery {
        search: params.search,
        active: params.active,
    };
    let page = Pagination::new(params.limit, params.offset);
    Ok(Json(services.machine_types().list(tenant.tenant_id(), &query, page)))
}

pub async fn get_machine_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<CatalogEntryReadModel>, ApiError> {
    require(&tenant, &principal, Permission::CLIENTS_READ)?;
    let id: AggregateId = parse_id(&id, "machine type")?;
    found(services.machine_types().get(tenant.tenant_id(), &id), "machine type")
}

pub async fn update_machine_type(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateCatalogEntryRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let machine_type_id: MachineTypeId = parse_id(&id, "machine type")?;

    let cmd = MachineTypeCommand::Update(UpdateMachineType {
        tenant_id,
        machine_type_id,
        name: body.name,
        description: body.description,
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::CLIENTS_WRITE])?;
    let events = services.dispatch(tenant_id, machine_type_id.into(), streams::MACHINE_TYPE, cmd, |_, id| {
        machine_type(id)
    })?;

    Ok(committed(StatusCode::OK, machine_type_id, &events))
}
