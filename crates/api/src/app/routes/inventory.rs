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
use workshop_infra::projections::{
    CatalogEntryReadModel, CatalogQuery, MovementQuery, MovementReadModel, StockItemQuery, StockItemReadModel,
};
use workshop_infra::read_model::{Page, Pagination};
use workshop_infra::streams;
use workshop_infra::unique_index::UniqueKey;
use workshop_inventory::{
    Category, CategoryCommand, CategoryId, CountStock, CreateCategory, CreateLocation, ItemChanges, Location,
    LocationCommand, LocationId, MovementKind, RecordMovement, RegisterItem, SetCategoryActive, SetItemActive,
    SetLocationActive, SetMinimumStock, StockItem, StockItemCommand, StockItemId, UpdateCategory, UpdateItem,
    UpdateLocation,
};

use crate::app::dto::{
    self, CatalogListParams, CountStockRequest, CreateCatalogEntryRequest, CreateItemRequest, ItemListParams,
    MovementListParams, PageParams, RecordMovementRequest, UpdateCatalogEntryRequest, UpdateItemRequest,
};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::routes::common::{authorized, committed, found, parse_id, require, with_unique_key};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/categories", post(create_category).get(list_categories))
        .route("/categories/:id", get(get_category).patch(update_category))
        .route("/categories/:id/deactivate", post(deactivate_category))
        .route("/categories/:id/activate", post(activate_category))
        .route("/locations", post(create_location).get(list_locations))
        .route("/locations/:id", get(get_location).patch(update_location))
        .route("/locations/:id/deactivate", post(deactivate_location))
        .route("/locations/:id/activate", post(activate_location))
        .route("/items", post(create_item).get(list_items))
        .route("/items/:id", get(get_item).patch(update_item))
        .route("/items/:id/deactivate", post(deactivate_item))
        .route("/items/:id/activate", post(activate_item))
        .route("/items/:id/movements", post(record_movement).get(list_item_movements))
        .route("/items/:id/count", post(count_stock))
        .route("/movements", get(list_movements))
        .route("/low-stock", get(low_stock))
}

fn category(id: AggregateId) -> Category {
    Category::empty(CategoryId::new(id))
}

fn location(id: AggregateId) -> Location {
    Location::empty(LocationId::new(id))
}

fn item(id: AggregateId) -> StockItem {
    StockItem::empty(StockItemId::new(id))
}

// -------------------------
// Categories
// -------------------------

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<CreateCatalogEntryRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let category_id = CategoryId::generate();

    let cmd = CategoryCommand::Create(CreateCategory {
        tenant_id,
        category_id,
        name: body.name.clone(),
        description: body.description,
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::INVENTORY_WRITE])?;

    let events = with_unique_key(
        services.unique_keys(),
        tenant_id,
        UniqueKey::CategoryName,
        category_id.into(),
        None,
        Some(&body.name),
        || Ok(services.dispatch(tenant_id, category_id.into(), streams::CATEGORY, cmd, |_, id| category(id))?),
    )?;

    Ok(committed(StatusCode::CREATED, category_id, &events))
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(params): ApiQuery<CatalogListParams>,
) -> Result<Json<Page<CatalogEntryReadModel>>, ApiError> {
    require(&tenant, &principal, Permission::INVENTORY_READ)?;
    let query = CatalogQuery {
        search: params.search,
        active: params.active,
    };
    let page = Pagination::new(params.limit, params.offset);
    Ok(Json(services.categories().list(tenant.tenant_id(), &query, page)))
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<CatalogEntryReadModel>, ApiError> {
    require(&tenant, &principal, Permission::INVENTORY_READ)?;
    let id: AggregateId = parse_id(&id, "category")?;
    found(services.categories().get(tenant.tenant_id(), &id), "category")
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateCatalogEntryRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let category_id: CategoryId = parse_id(&id, "category")?;

    let cmd = CategoryCommand::Update(UpdateCategory {
        tenant_id,
        category_id,
        name: body.name.clone(),
        description: body.description,
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::INVENTORY_WRITE])?;

    let current = services.load(tenant_id, category_id.into(), |_, id| category(id))?;
    let events = with_unique_key(
        services.unique_keys(),
        tenant_id,
        UniqueKey::CategoryName,
        category_id.into(),
        Some(current.name()),
        body.name.as_deref(),
        || Ok(services.dispatch(tenant_id, category_id.into(), streams::CATEGORY, cmd, |_, id| category(id))?),
    )?;

    Ok(committed(StatusCode::OK, category_id, &events))
}

pub async fn deactivate_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    set_category_active(&services, &tenant, &principal, &id, false)
}

pub async fn activate_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    set_category_active(&services, &tenant, &principal, &id, true)
}

fn set_category_active(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: &str,
    active: bool,
) -> Result<Response, ApiError> {
    let category_id: CategoryId = parse_id(id, "category")?;
    let change = SetCategoryActive {
        tenant_id: tenant.tenant_id(),
        category_id,
        occurred_at: Utc::now(),
    };
    let cmd = if active {
        CategoryCommand::Activate(change)
    } else {
        CategoryCommand::Deactivate(change)
    };
    let cmd = authorized(tenant, principal, cmd, &[Permission::INVENTORY_WRITE])?;
    let events = services.dispatch(tenant.tenant_id(), category_id.into(), streams::CATEGORY, cmd, |_, id| {
        category(id)
    })?;
    Ok(committed(StatusCode::OK, category_id, &events))
}

// -------------------------
// Locations
// -------------------------

pub async fn create_location(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<CreateCatalogEntryRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let location_id = LocationId::generate();

    let cmd = LocationCommand::Create(CreateLocation {
        tenant_id,
        location_id,
        name: body.name,
        description: body.description,
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::INVENTORY_WRITE])?;
    let events = services.dispatch(tenant_id, location_id.into(), streams::LOCATION, cmd, |_, id| location(id))?;

    Ok(committed(StatusCode::CREATED, location_id, &events))
}

pub async fn list_locations(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(params): ApiQuery<CatalogListParams>,
) -> Result<Json<Page<CatalogEntryReadModel>>, ApiError> {
    require(&tenant, &principal, Permission::INVENTORY_READ)?;
    let query = CatalogQuery {
        search: params.search,
        active: params.active,
    };
    let page = Pagination::new(params.limit, params.offset);
    Ok(Json(services.locations().list(tenant.tenant_id(), &query, page)))
}

pub async fn get_location(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<CatalogEntryReadModel>, ApiError> {
    require(&tenant, &principal, Permission::INVENTORY_READ)?;
    let id: AggregateId = parse_id(&id, "location")?;
    found(services.locations().get(tenant.tenant_id(), &id), "location")
}

pub async fn update_location(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateCatalogEntryRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let location_id: LocationId = parse_id(&id, "location")?;

    let cmd = LocationCommand::Update(UpdateLocation {
        tenant_id,
        location_id,
        name: body.name,
        description: body.description,
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::INVENTORY_WRITE])?;
    let events = services.dispatch(tenant_id, location_id.into(), streams::LOCATION, cmd, |_, id| location(id))?;

    Ok(committed(StatusCode::OK, location_id, &events))
}

pub async fn deactivate_location(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    set_location_active(&services, &tenant, &principal, &id, false)
}

pub async fn activate_location(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    set_location_active(&services, &tenant, &principal, &id, true)
}

fn set_location_active(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: &str,
    active: bool,
) -> Result<Response, ApiError> {
    let location_id: LocationId = parse_id(id, "location")?;
    let change = SetLocationActive {
        tenant_id: tenant.tenant_id(),
        location_id,
        occurred_at: Utc::now(),
    };
    let cmd = if active {
        LocationCommand::Activate(change)
    } else {
        LocationCommand::Deactivate(change)
    };
    let cmd = authorized(tenant, principal, cmd, &[Permission::INVENTORY_WRITE])?;
    let events = services.dispatch(tenant.tenant_id(), location_id.into(), streams::LOCATION, cmd, |_, id| {
        location(id)
    })?;
    Ok(committed(StatusCode::OK, location_id, &events))
}

// -------------------------
// Items
// -------------------------

/// Register an item; a positive opening quantity lands as its first movement.
pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiJson(body): ApiJson<CreateItemRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let item_id = StockItemId::generate();

    let cmd = StockItemCommand::Register(RegisterItem {
        tenant_id,
        item_id,
        code: body.code.clone(),
        name: body.name,
        category_id: body.category_id,
        location_id: body.location_id,
        description: body.description,
        measurements: body.measurements,
        material: body.material,
        brand: body.brand,
        model: body.model,
        unit: dto::parse_opt(body.unit.as_deref())?,
        quantity: body.quantity,
        minimum_stock: body.minimum_stock,
        purchase_price: body.purchase_price,
        sale_price: body.sale_price,
        notes: body.notes,
        user_id: principal.user_id(),
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::INVENTORY_WRITE])?;

    services.load_reference(tenant_id, body.category_id.into(), "category_id", |_, id| category(id))?;
    services.load_reference(tenant_id, body.location_id.into(), "location_id", |_, id| location(id))?;

    let events = with_unique_key(
        services.unique_keys(),
        tenant_id,
        UniqueKey::ItemCode,
        item_id.into(),
        None,
        Some(&body.code),
        || Ok(services.dispatch(tenant_id, item_id.into(), streams::STOCK_ITEM, cmd, |_, id| item(id))?),
    )?;

    Ok(committed(StatusCode::CREATED, item_id, &events))
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(params): ApiQuery<ItemListParams>,
) -> Result<Json<Page<StockItemReadModel>>, ApiError> {
    require(&tenant, &principal, Permission::INVENTORY_READ)?;
    let query = StockItemQuery {
        search: params.search,
        category_id: dto::parse_opt(params.category_id.as_deref())?,
        location_id: dto::parse_opt(params.location_id.as_deref())?,
        active: params.active,
        low_stock: params.low_stock,
    };
    let page = Pagination::new(params.limit, params.offset);
    Ok(Json(services.items().list(tenant.tenant_id(), &query, page)))
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<StockItemReadModel>, ApiError> {
    require(&tenant, &principal, Permission::INVENTORY_READ)?;
    let item_id: StockItemId = parse_id(&id, "item")?;
    found(services.items().get(tenant.tenant_id(), &item_id), "item")
}

/// Partial update; the code is fixed at registration.
pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdateItemRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let item_id: StockItemId = parse_id(&id, "item")?;

    let changes = ItemChanges {
        name: body.name,
        category_id: body.category_id,
        location_id: body.location_id,
        description: body.description,
        measurements: body.measurements,
        material: body.material,
        brand: body.brand,
        model: body.model,
        unit: dto::parse_opt(body.unit.as_deref())?,
        purchase_price: body.purchase_price,
        sale_price: body.sale_price,
        notes: body.notes,
    };
    let cmd = StockItemCommand::Update(UpdateItem {
        tenant_id,
        item_id,
        changes,
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::INVENTORY_WRITE])?;

    if let Some(category_id) = body.category_id {
        services.load_reference(tenant_id, category_id.into(), "category_id", |_, id| category(id))?;
    }
    if let Some(location_id) = body.location_id {
        services.load_reference(tenant_id, location_id.into(), "location_id", |_, id| location(id))?;
    }

    let mut events = services.dispatch(tenant_id, item_id.into(), streams::STOCK_ITEM, cmd, |_, id| item(id))?;

    if let Some(minimum_stock) = body.minimum_stock {
        let cmd = StockItemCommand::SetMinimumStock(SetMinimumStock {
            tenant_id,
            item_id,
            minimum_stock,
            occurred_at: Utc::now(),
        });
        events.extend(services.dispatch(tenant_id, item_id.into(), streams::STOCK_ITEM, cmd, |_, id| item(id))?);
    }

    Ok(committed(StatusCode::OK, item_id, &events))
}

pub async fn deactivate_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    set_item_active(&services, &tenant, &principal, &id, false)
}

pub async fn activate_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    set_item_active(&services, &tenant, &principal, &id, true)
}

fn set_item_active(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    id: &str,
    active: bool,
) -> Result<Response, ApiError> {
    let item_id: StockItemId = parse_id(id, "item")?;
    let change = SetItemActive {
        tenant_id: tenant.tenant_id(),
        item_id,
        occurred_at: Utc::now(),
    };
    let cmd = if active {
        StockItemCommand::Activate(change)
    } else {
        StockItemCommand::Deactivate(change)
    };
    let cmd = authorized(tenant, principal, cmd, &[Permission::INVENTORY_WRITE])?;
    let events = services.dispatch(tenant.tenant_id(), item_id.into(), streams::STOCK_ITEM, cmd, |_, id| item(id))?;
    Ok(committed(StatusCode::OK, item_id, &events))
}

// -------------------------
// Movements
// -------------------------

pub async fn record_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<RecordMovementRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let item_id: StockItemId = parse_id(&id, "item")?;
    let kind: MovementKind = dto::parse_required(&body.kind)?;

    let cmd = StockItemCommand::RecordMovement(RecordMovement {
        tenant_id,
        item_id,
        kind,
        quantity: body.quantity,
        reason: body.reason,
        user_id: principal.user_id(),
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::INVENTORY_MOVE])?;
    let events = services.dispatch(tenant_id, item_id.into(), streams::STOCK_ITEM, cmd, |_, id| item(id))?;

    Ok(committed(StatusCode::CREATED, item_id, &events))
}

/// Physical count; any difference becomes an adjustment.
pub async fn count_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CountStockRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let item_id: StockItemId = parse_id(&id, "item")?;

    let cmd = StockItemCommand::CountStock(CountStock {
        tenant_id,
        item_id,
        counted: body.counted,
        reason: body.reason,
        user_id: principal.user_id(),
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::INVENTORY_MOVE])?;
    let events = services.dispatch(tenant_id, item_id.into(), streams::STOCK_ITEM, cmd, |_, id| item(id))?;

    Ok(committed(StatusCode::OK, item_id, &events))
}

pub async fn list_item_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<MovementListParams>,
) -> Result<Json<Page<MovementReadModel>>, ApiError> {
    require(&tenant, &principal, Permission::INVENTORY_READ)?;
    let item_id: StockItemId = parse_id(&id, "item")?;
    movements(&services, &tenant, Some(item_id), params)
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(params): ApiQuery<MovementListParams>,
) -> Result<Json<Page<MovementReadModel>>, ApiError> {
    require(&tenant, &principal, Permission::INVENTORY_READ)?;
    movements(&services, &tenant, None, params)
}

fn movements(
    services: &AppServices,
    tenant: &TenantContext,
    item_id: Option<StockItemId>,
    params: MovementListParams,
) -> Result<Json<Page<MovementReadModel>>, ApiError> {
    let query = MovementQuery {
        item_id,
        kind: dto::parse_opt(params.kind.as_deref())?,
        search: params.search,
    };
    let page = Pagination::new(params.limit, params.offset);
    Ok(Json(services.movements().list(tenant.tenant_id(), &query, page)))
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Page<StockItemReadModel>>, ApiError> {
    require(&tenant, &principal, Permission::INVENTORY_READ)?;
    Ok(Json(services.items().low_stock(tenant.tenant_id(), params.pagination())))
}
