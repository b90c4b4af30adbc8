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
use workshop_infra::projections::{ClientQuery, ClientReadModel};
use workshop_infra::read_model::{Page, Pagination};
use workshop_infra::streams;
use workshop_infra::unique_index::UniqueKey;
use workshop_service::{Client, ClientCommand, ClientId, ContactInfo, RegisterClient, SetClientActive, UpdateClient};

use crate::app::dto::{ClientListParams, CreateClientRequest, UpdateClientRequest};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::routes::common::{authorized, committed, found, parse_id, require, with_unique_key};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_client).get(list_clients))
        .route("/:id", get(get_client).patch(update_client))
        .route("/:id/deactivate", post(deactivate_client))
        .route("/:id/activate", post(activate_client))
}

fn client(id: AggregateId) -> Client {
    Client::empty(ClientId::new(id))
}

pub async fn create_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<CreateClientRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let client_id = ClientId::generate();

    let cmd = ClientCommand::Register(RegisterClient {
        tenant_id,
        client_id,
        name: body.name,
        contact: ContactInfo {
            phone: body.phone,
            email: body.email,
            address: body.address,
        },
        tax_id: body.tax_id.clone(),
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::CLIENTS_WRITE])?;

    // Clients without a tax id are never checked for duplicates.
    let events = with_unique_key(
        services.unique_keys(),
        tenant_id,
        UniqueKey::ClientTaxId,
        client_id.into(),
        None,
        body.tax_id.as_deref(),
        || Ok(services.dispatch(tenant_id, client_id.into(), streams::CLIENT, cmd, |_, id| client(id))?),
    )?;

    Ok(committed(StatusCode::CREATED, client_id, &events))
}

pub async fn list_clients(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(params): ApiQuery<ClientListParams>,
) -> Result<Json<Page<ClientReadModel>>, ApiError> {
    require(&tenant, &principal, Permission::CLIENTS_READ)?;
    let query = ClientQuery {
        search: params.search,
        active: params.active,
    };
    let page = Pagination::new(params.limit, params.offset);
    Ok(Json(services.clients().list(tenant.tenant_id(), &query, page)))
}

pub async fn get_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<ClientReadModel>, ApiError> {
    require(&tenant, &principal, Permission::CLIENTS_READ)?;
    let client_id: ClientId = parse_id(&id, "client")?;
    found(services.clients().get(tenant.tenant_id(), &client_id), "client")
}

pub async fn update_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateClientRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let client_id: ClientId = parse_id(&id, "client")?;

    let cmd = ClientCommand::Update(UpdateClient {
        tenant_id,
        client_id,
        name: body.name,
        phone: body.phone,
        email: body.email,
        address: body.address,
        tax_id: body.tax_id.clone(),
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::CLIENTS_WRITE])?;

    let current = services.load(tenant_id, client_id.into(), |_, id| client(id))?;
    let events = with_unique_key(
        services.unique_keys(),
        tenant_id,
        UniqueKey::ClientTaxId,
        client_id.into(),
        current.tax_id(),
        body.tax_id.as_deref(),
        || Ok(services.dispatch(tenant_id, client_id.into(), streams::CLIENT, cmd, |_, id| client(id))?),
    )?;

    Ok(committed(StatusCode::OK, client_id, &events))
}

pub async fn deactivate_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    set_client_active(&services, &tenant, &principal, &id, false)
}

pub async fn activate_client(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    set_client_active(&services, &tenant, &principal, &id, true)
}

fn set_client_active(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: &str,
    active: bool,
) -> Result<Response, ApiError> {
    let client_id: ClientId = parse_id(id, "client")?;
    let change = SetClientActive {
        tenant_id: tenant.tenant_id(),
        client_id,
        occurred_at: Utc::now(),
    };
    let cmd = if active {
        ClientCommand::Activate(change)
    } else {
        ClientCommand::Deactivate(change)
    };
    let cmd = authorized(tenant, principal, cmd, &[Permission::CLIENTS_WRITE])?;
    let events = services.dispatch(tenant.tenant_id(), client_id.into(), streams::CLIENT, cmd, |_, id| client(id))?;
    Ok(committed(StatusCode::OK, client_id, &events))
}
