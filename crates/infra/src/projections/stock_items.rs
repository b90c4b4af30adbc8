//! Current stock per item, with the derived low-stock flag and stock value.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use workshop_core::{Price, TenantId, UserId};
use workshop_events::EventEnvelope;
use workshop_inventory::{
    is_low_stock, total_stock_value, CategoryId, ItemDetails, LocationId, StockItemEvent, StockItemId, Unit,
};

use super::{decode, ensure_stream, Projection, ProjectionError, StreamCursors};
use crate::read_model::{contains_ci, Page, Pagination, TenantStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItemReadModel {
    pub item_id: StockItemId,
    pub code: String,
    pub name: String,
    pub category_id: CategoryId,
    pub location_id: LocationId,
    pub description: Option<String>,
    pub measurements: Option<String>,
    pub material: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub unit: Unit,
    pub purchase_price: Option<Price>,
    pub sale_price: Option<Price>,
    pub notes: Option<String>,
    pub quantity: i64,
    pub minimum_stock: i64,
    pub low_stock: bool,
    pub total_stock_value: Decimal,
    pub active: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// "<code> - <name>".
    pub display: String,
}

impl StockItemReadModel {
    fn set_details(&mut self, details: ItemDetails) {
        self.name = details.name;
        self.category_id = details.category_id;
        self.location_id = details.location_id;
        self.description = details.description;
        self.measurements = details.measurements;
        self.material = details.material;
        self.brand = details.brand;
        self.model = details.model;
        self.unit = details.unit;
        self.purchase_price = details.purchase_price;
        self.sale_price = details.sale_price;
        self.notes = details.notes;
    }

    fn refresh_derived(&mut self) {
        self.low_stock = is_low_stock(self.quantity, self.minimum_stock);
        self.total_stock_value = total_stock_value(self.quantity, self.purchase_price);
        self.display = format!("{} - {}", self.code, self.name);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockItemQuery {
    /// Matches code, name, description, brand, model, material and measurements.
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
    pub location_id: Option<LocationId>,
    pub active: Option<bool>,
    pub low_stock: Option<bool>,
}

#[derive(Debug)]
pub struct StockItemsProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> StockItemsProjection<S>
where
    S: TenantStore<StockItemId, StockItemReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::default(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, item_id: &StockItemId) -> Option<StockItemReadModel> {
        self.store.get(tenant_id, item_id)
    }

    /// Code-ordered page of items.
    pub fn list(&self, tenant_id: TenantId, query: &StockItemQuery, page: Pagination) -> Page<StockItemReadModel> {
        let mut items: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|i| query.category_id.is_none_or(|c| i.category_id == c))
            .filter(|i| query.location_id.is_none_or(|l| i.location_id == l))
            .filter(|i| query.active.is_none_or(|a| i.active == a))
            .filter(|i| query.low_stock.is_none_or(|l| i.low_stock == l))
            .filter(|i| {
                contains_ci(
                    query.search.as_deref(),
                    [
                        Some(i.code.as_str()),
                        Some(i.name.as_str()),
                        i.description.as_deref(),
                        i.brand.as_deref(),
                        i.model.as_deref(),
                        i.material.as_deref(),
                        i.measurements.as_deref(),
                    ],
                )
            })
            .collect();
        items.sort_by(|a, b| a.code.cmp(&b.code));
        page.apply(items)
    }

    /// Active items at or below their minimum, lowest stock first.
    pub fn low_stock(&self, tenant_id: TenantId, page: Pagination) -> Page<StockItemReadModel> {
        let mut items: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|i| i.active && i.low_stock)
            .collect();
        items.sort_by(|a, b| a.quantity.cmp(&b.quantity).then_with(|| a.code.cmp(&b.code)));
        page.apply(items)
    }

    fn modify(
        &self,
        tenant_id: TenantId,
        item_id: StockItemId,
        at: DateTime<Utc>,
        change: impl FnOnce(&mut StockItemReadModel),
    ) {
        if let Some(mut item) = self.store.get(tenant_id, &item_id) {
            change(&mut item);
            item.updated_at = at;
            item.refresh_derived();
            self.store.upsert(tenant_id, item_id, item);
        }
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let event: StockItemEvent = decode(envelope)?;
        let tenant_id = envelope.tenant_id();

        match event {
            StockItemEvent::ItemRegistered(e) => {
                ensure_stream(envelope, e.tenant_id, e.item_id.into())?;
                let mut item = StockItemReadModel {
                    item_id: e.item_id,
                    code: e.code,
                    name: String::new(),
                    category_id: e.details.category_id,
                    location_id: e.details.location_id,
                    description: None,
                    measurements: None,
                    material: None,
                    brand: None,
                    model: None,
                    unit: Unit::default(),
                    purchase_price: None,
                    sale_price: None,
                    notes: None,
                    quantity: 0,
                    minimum_stock: e.minimum_stock,
                    low_stock: false,
                    total_stock_value: Decimal::ZERO,
                    active: true,
                    created_by: e.created_by,
                    created_at: e.occurred_at,
                    updated_at: e.occurred_at,
                    display: String::new(),
                };
                item.set_details(e.details);
                item.refresh_derived();
                self.store.upsert(tenant_id, e.item_id, item);
            }
            StockItemEvent::ItemUpdated(e) => {
                ensure_stream(envelope, e.tenant_id, e.item_id.into())?;
                self.modify(tenant_id, e.item_id, e.occurred_at, |item| item.set_details(e.details));
            }
            StockItemEvent::MinimumStockSet(e) => {
                ensure_stream(envelope, e.tenant_id, e.item_id.into())?;
                self.modify(tenant_id, e.item_id, e.occurred_at, |item| item.minimum_stock = e.minimum_stock);
            }
            StockItemEvent::StockMoved(e) => {
                ensure_stream(envelope, e.tenant_id, e.item_id.into())?;
                self.modify(tenant_id, e.item_id, e.occurred_at, |item| item.quantity = e.new_stock);
            }
            StockItemEvent::ItemDeactivated(e) => {
                ensure_stream(envelope, e.tenant_id, e.item_id.into())?;
                self.modify(tenant_id, e.item_id, e.occurred_at, |item| item.active = false);
            }
            StockItemEvent::ItemActivated(e) => {
                ensure_stream(envelope, e.tenant_id, e.item_id.into())?;
                self.modify(tenant_id, e.item_id, e.occurred_at, |item| item.active = true);
            }
        }
        Ok(())
    }
}

impl<S> Projection for StockItemsProjection<S>
where
    S: TenantStore<StockItemId, StockItemReadModel>,
{
    fn name(&self) -> &'static str {
        "stock_items"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::STOCK_ITEM {
            return Ok(());
        }
        self.cursors.track(envelope, || self.apply(envelope))
    }

    fn reset_tenant(&self, tenant_id: TenantId) {
        self.cursors.reset_tenant(tenant_id);
        self.store.clear_tenant(tenant_id);
    }
}
