use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use workshop_core::{DomainError, UserId};
use workshop_infra::read_model::Pagination;
use workshop_inventory::{CategoryId, LocationId, StockItemId};
use workshop_service::{ClientId, MachineTypeId};

use crate::app::errors::ApiError;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    /// Provisioned role; `worker` when omitted.
    pub role: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    /// Blank clears the phone.
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: String,
}

/// Categories, locations and machine types.
#[derive(Debug, Deserialize)]
pub struct CreateCatalogEntryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCatalogEntryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub code: String,
    pub name: String,
    pub category_id: CategoryId,
    pub location_id: LocationId,
    pub description: Option<String>,
    pub measurements: Option<String>,
    pub material: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub unit: Option<String>,
    #[serde(default)]
    pub quantity: i64,
    pub minimum_stock: Option<i64>,
    pub purchase_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub category_id: Option<CategoryId>,
    pub location_id: Option<LocationId>,
    pub description: Option<String>,
    pub measurements: Option<String>,
    pub material: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub unit: Option<String>,
    pub purchase_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub notes: Option<String>,
    pub minimum_stock: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RecordMovementRequest {
    pub kind: String,
    pub quantity: i64,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CountStockRequest {
    pub counted: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub tax_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    /// Blank clears the tax id.
    pub tax_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpenWorkOrderRequest {
    pub order_number: String,
    pub client_id: ClientId,
    pub machine_type_id: MachineTypeId,
    pub machine_brand: Option<String>,
    pub machine_model: Option<String>,
    pub serial_number: Option<String>,
    pub machine_year: Option<i32>,
    pub intake_reason: String,
    pub work_description: Option<String>,
    pub notes: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub estimated_cost: Option<Decimal>,
    pub assigned_technician: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWorkOrderRequest {
    pub machine_brand: Option<String>,
    pub machine_model: Option<String>,
    pub serial_number: Option<String>,
    pub machine_year: Option<i32>,
    pub intake_reason: Option<String>,
    pub work_description: Option<String>,
    pub notes: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignTechnicianRequest {
    /// `null` unassigns.
    pub technician: Option<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct SetCostsRequest {
    pub estimated_cost: Option<Decimal>,
    pub final_cost: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct AddPartRequest {
    pub item_id: StockItemId,
    pub quantity: i64,
    /// Defaults to the item's sale price.
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleVisitRequest {
    pub client_id: ClientId,
    pub machine_type_id: MachineTypeId,
    pub visit_at: DateTime<Utc>,
    pub address: String,
    pub problem_description: String,
    pub technician: UserId,
}

#[derive(Debug, Deserialize)]
pub struct VisitNotesRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpawnOrderRequest {
    pub order_number: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordChangeRequest {
    pub table: String,
    pub object_id: String,
    pub action: String,
    pub description: String,
    pub previous: Option<JsonValue>,
    pub new: Option<JsonValue>,
    /// Falls back to the first `X-Forwarded-For` hop.
    pub ip_address: Option<String>,
}

// -------------------------
// List query parameters
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListParams {
    pub search: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogListParams {
    pub search: Option<String>,
    pub active: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemListParams {
    pub search: Option<String>,
    pub category_id: Option<String>,
    pub location_id: Option<String>,
    pub active: Option<bool>,
    pub low_stock: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementListParams {
    pub kind: Option<String>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientListParams {
    pub search: Option<String>,
    pub active: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Shared by work orders and visits.
#[derive(Debug, Default, Deserialize)]
pub struct ServiceListParams {
    pub search: Option<String>,
    pub status: Option<String>,
    pub client_id: Option<String>,
    pub technician: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditListParams {
    pub table: Option<String>,
    pub object_id: Option<String>,
    pub action: Option<String>,
    pub user_id: Option<String>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// -------------------------
// Parsing helpers
// -------------------------

/// Parse an optional choice or id; an unknown value is a 400 with a field message.
pub fn parse_opt<T>(value: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(T::from_str)
        .transpose()
        .map_err(ApiError::from)
}

pub fn parse_required<T>(value: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    T::from_str(value.trim()).map_err(ApiError::from)
}
