use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;

use workshop_auth::{Permission, UserAccount};
use workshop_core::{AggregateId, TenantId, UserId};
use workshop_infra::projections::{WorkOrderQuery, WorkOrderReadModel};
use workshop_infra::read_model::{Page, Pagination};
use workshop_infra::streams;
use workshop_infra::unique_index::UniqueKey;
use workshop_infra::workflows::ConsumePart;
use workshop_service::{
    AssignTechnician, ChangeStatus, Client, ClientId, MachineDetails, MachineType, MachineTypeId, OpenWorkOrder,
    SetCosts, UpdateWorkOrder, WorkOrder, WorkOrderChanges, WorkOrderCommand, WorkOrderId, WorkOrderStatus,
};

use crate::app::dto::{
    self, AddPartRequest, AssignTechnicianRequest, ChangeStatusRequest, OpenWorkOrderRequest, ServiceListParams,
    SetCostsRequest, UpdateWorkOrderRequest,
};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::routes::common::{authorized, committed, found, parse_id, require, with_unique_key};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(open_order).get(list_orders))
        .route("/:id", get(get_order).patch(update_order))
        .route("/:id/status", post(change_status))
        .route("/:id/assign", post(assign_technician))
        .route("/:id/costs", post(set_costs))
        .route("/:id/parts", post(add_part))
}

fn order(id: AggregateId) -> WorkOrder {
    WorkOrder::empty(WorkOrderId::new(id))
}

/// Client, machine type and technician must exist in the tenant.
pub(crate) fn check_references(
    services: &AppServices,
    tenant_id: TenantId,
    client_id: ClientId,
    machine_type_id: MachineTypeId,
    technician: Option<UserId>,
    technician_field: &str,
) -> Result<(), ApiError> {
    services.load_reference(tenant_id, client_id.into(), "client_id", |_, id| Client::empty(ClientId::new(id)))?;
    services.load_reference(tenant_id, machine_type_id.into(), "machine_type_id", |_, id| {
        MachineType::empty(MachineTypeId::new(id))
    })?;
    if let Some(technician) = technician {
        services.load_reference(tenant_id, technician.into(), technician_field, |_, id| {
            UserAccount::empty(UserId::from(id))
        })?;
    }
    Ok(())
}

pub async fn open_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<OpenWorkOrderRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let order_id = WorkOrderId::generate();

    let cmd = WorkOrderCommand::Open(OpenWorkOrder {
        tenant_id,
        order_id,
        order_number: body.order_number.clone(),
        client_id: body.client_id,
        machine_type_id: body.machine_type_id,
        machine: MachineDetails {
            brand: body.machine_brand,
            model: body.machine_model,
            serial_number: body.serial_number,
            year: body.machine_year,
        },
        intake_reason: body.intake_reason,
        work_description: body.work_description,
        notes: body.notes,
        estimated_delivery: body.estimated_delivery,
        estimated_cost: body.estimated_cost,
        assigned_technician: body.assigned_technician,
        user_id: principal.user_id(),
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::ORDERS_WRITE])?;

    check_references(
        &services,
        tenant_id,
        body.client_id,
        body.machine_type_id,
        body.assigned_technician,
        "assigned_technician",
    )?;

    let events = with_unique_key(
        services.unique_keys(),
        tenant_id,
        UniqueKey::OrderNumber,
        order_id.into(),
        None,
        Some(&body.order_number),
        || Ok(services.dispatch(tenant_id, order_id.into(), streams::WORK_ORDER, cmd, |_, id| order(id))?),
    )?;

    Ok(committed(StatusCode::CREATED, order_id, &events))
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(params): ApiQuery<ServiceListParams>,
) -> Result<Json<Page<WorkOrderReadModel>>, ApiError> {
    require(&tenant, &principal, Permission::ORDERS_READ)?;
    let query = WorkOrderQuery {
        search: params.search,
        status: dto::parse_opt(params.status.as_deref())?,
        client_id: dto::parse_opt(params.client_id.as_deref())?,
        technician: dto::parse_opt(params.technician.as_deref())?,
    };
    let page = Pagination::new(params.limit, params.offset);
    Ok(Json(services.orders().list(tenant.tenant_id(), &query, page)))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<WorkOrderReadModel>, ApiError> {
    require(&tenant, &principal, Permission::ORDERS_READ)?;
    let order_id: WorkOrderId = parse_id(&id, "work order")?;
    found(services.orders().get(tenant.tenant_id(), &order_id), "work order")
}

pub async fn update_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateWorkOrderRequest>,
) -> Result<Response, ApiError> {
    let order_id: WorkOrderId = parse_id(&id, "work order")?;
    let cmd = WorkOrderCommand::Update(UpdateWorkOrder {
        tenant_id: tenant.tenant_id(),
        order_id,
        changes: WorkOrderChanges {
            machine_brand: body.machine_brand,
            machine_model: body.machine_model,
            serial_number: body.serial_number,
            machine_year: body.machine_year,
            intake_reason: body.intake_reason,
            work_description: body.work_description,
            notes: body.notes,
            estimated_delivery: body.estimated_delivery,
        },
        occurred_at: Utc::now(),
    });
    dispatch_order(&services, &tenant, &principal, order_id, cmd, Permission::ORDERS_WRITE)
}

/// Move the order along its lifecycle; delivering stamps the delivery date.
pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ChangeStatusRequest>,
) -> Result<Response, ApiError> {
    let order_id: WorkOrderId = parse_id(&id, "work order")?;
    let status: WorkOrderStatus = dto::parse_required(&body.status)?;
    let cmd = WorkOrderCommand::ChangeStatus(ChangeStatus {
        tenant_id: tenant.tenant_id(),
        order_id,
        status,
        occurred_at: Utc::now(),
    });
    dispatch_order(&services, &tenant, &principal, order_id, cmd, Permission::ORDERS_PROGRESS)
}

pub async fn assign_technician(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AssignTechnicianRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let order_id: WorkOrderId = parse_id(&id, "work order")?;
    let cmd = WorkOrderCommand::AssignTechnician(AssignTechnician {
        tenant_id,
        order_id,
        technician: body.technician,
        occurred_at: Utc::now(),
    });
    if let Some(technician) = body.technician {
        require(&tenant, &principal, Permission::ORDERS_WRITE)?;
        services.load_reference(tenant_id, technician.into(), "technician", |_, id| {
            UserAccount::empty(UserId::from(id))
        })?;
    }
    dispatch_order(&services, &tenant, &principal, order_id, cmd, Permission::ORDERS_WRITE)
}

pub async fn set_costs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SetCostsRequest>,
) -> Result<Response, ApiError> {
    let order_id: WorkOrderId = parse_id(&id, "work order")?;
    let cmd = WorkOrderCommand::SetCosts(SetCosts {
        tenant_id: tenant.tenant_id(),
        order_id,
        estimated_cost: body.estimated_cost,
        final_cost: body.final_cost,
        occurred_at: Utc::now(),
    });
    dispatch_order(&services, &tenant, &principal, order_id, cmd, Permission::ORDERS_WRITE)
}

/// Consume a part: stock leaves the item and a line lands on the order.
pub async fn add_part(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AddPartRequest>,
) -> Result<Response, ApiError> {
    let order_id: WorkOrderId = parse_id(&id, "work order")?;
    require(&tenant, &principal, Permission::ORDERS_PARTS)?;

    let consumed = services.workflows().consume_part(ConsumePart {
        tenant_id: tenant.tenant_id(),
        order_id,
        item_id: body.item_id,
        quantity: body.quantity,
        unit_price: body.unit_price,
        user_id: principal.user_id(),
        occurred_at: Utc::now(),
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": order_id.to_string(),
            "line_no": consumed.line_no,
            "unit_price": consumed.unit_price,
            "subtotal": consumed.subtotal,
            "remaining_stock": consumed.remaining_stock,
        })),
    )
        .into_response())
}

fn dispatch_order(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    order_id: WorkOrderId,
    cmd: WorkOrderCommand,
    permission: Permission,
) -> Result<Response, ApiError> {
    let cmd = authorized(tenant, principal, cmd, &[permission])?;
    let events = services.dispatch(tenant.tenant_id(), order_id.into(), streams::WORK_ORDER, cmd, |_, id| order(id))?;
    Ok(committed(StatusCode::OK, order_id, &events))
}
