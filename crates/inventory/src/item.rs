//! Stock item aggregate and its movement ledger.
//!
//! Every quantity change is a `StockMoved` event on the item's own stream.
//! The aggregate computes `previous_stock`/`new_stock` from its running
//! quantity, so the ledger always chains and optimistic concurrency on the
//! stream keeps two movements from committing against the same snapshot.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use workshop_core::{
    Aggregate, AggregateRoot, DomainError, Price, TenantId, UserId, aggregate_id, field,
};
use workshop_events::Event;

use crate::{CategoryId, LocationId, MovementKind, Unit};

pub const CODE_MAX: usize = 50;
pub const NAME_MAX: usize = 200;
pub const SPEC_MAX: usize = 100;
pub const DEFAULT_MINIMUM_STOCK: i64 = 5;
/// Upper bound for stock on hand and for any single movement or count.
pub const MAX_STOCK: i64 = 2_147_483_647;

/// Reason recorded on the movement created for an item's opening quantity.
pub const INITIAL_STOCK_REASON: &str = "Initial stock";

aggregate_id!(
    /// Stock item identifier.
    StockItemId
);

/// `quantity ≤ minimum_stock`.
pub fn is_low_stock(quantity: i64, minimum_stock: i64) -> bool {
    quantity <= minimum_stock
}

/// `quantity × purchase_price`, or zero when no purchase price is set.
pub fn total_stock_value(quantity: i64, purchase_price: Option<Price>) -> Decimal {
    purchase_price.map_or(Decimal::ZERO, |p| p.times(quantity))
}

/// Descriptive attributes of an item, carried whole by register/update events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
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
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockItem {
    id: StockItemId,
    tenant_id: Option<TenantId>,
    code: String,
    details: Option<ItemDetails>,
    quantity: i64,
    minimum_stock: i64,
    active: bool,
    created_by: Option<UserId>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl StockItem {
    pub fn empty(id: StockItemId) -> Self {
        Self {
            id,
            tenant_id: None,
            code: String::new(),
            details: None,
            quantity: 0,
            minimum_stock: DEFAULT_MINIMUM_STOCK,
            active: true,
            created_by: None,
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn details(&self) -> Option<&ItemDetails> {
        self.details.as_ref()
    }

    pub fn name(&self) -> &str {
        self.details.as_ref().map_or("", |d| d.name.as_str())
    }

    pub fn sale_price(&self) -> Option<Price> {
        self.details.as_ref().and_then(|d| d.sale_price)
    }

    pub fn purchase_price(&self) -> Option<Price> {
        self.details.as_ref().and_then(|d| d.purchase_price)
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn minimum_stock(&self) -> i64 {
        self.minimum_stock
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_low_stock(&self) -> bool {
        is_low_stock(self.quantity, self.minimum_stock)
    }

    pub fn total_stock_value(&self) -> Decimal {
        total_stock_value(self.quantity, self.purchase_price())
    }

    /// "<code> - <name>".
    pub fn display(&self) -> String {
        format!("{} - {}", self.code, self.name())
    }
}

impl AggregateRoot for StockItem {
    type Id = StockItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterItem {
    pub tenant_id: TenantId,
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
    pub unit: Option<Unit>,
    /// Opening quantity; recorded as an inbound movement when positive.
    pub quantity: i64,
    pub minimum_stock: Option<i64>,
    pub purchase_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub notes: Option<String>,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Partial update of descriptive fields. `None` keeps the current value;
/// a blank string clears an optional text field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemChanges {
    pub name: Option<String>,
    pub category_id: Option<CategoryId>,
    pub location_id: Option<LocationId>,
    pub description: Option<String>,
    pub measurements: Option<String>,
    pub material: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub unit: Option<Unit>,
    pub purchase_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub tenant_id: TenantId,
    pub item_id: StockItemId,
    pub changes: ItemChanges,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMinimumStock {
    pub tenant_id: TenantId,
    pub item_id: StockItemId,
    pub minimum_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub tenant_id: TenantId,
    pub item_id: StockItemId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub reason: String,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Physical count: the difference to the running quantity becomes an
/// adjustment movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountStock {
    pub tenant_id: TenantId,
    pub item_id: StockItemId,
    pub counted: i64,
    pub reason: Option<String>,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetItemActive {
    pub tenant_id: TenantId,
    pub item_id: StockItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockItemCommand {
    Register(RegisterItem),
    Update(UpdateItem),
    SetMinimumStock(SetMinimumStock),
    RecordMovement(RecordMovement),
    CountStock(CountStock),
    Deactivate(SetItemActive),
    Activate(SetItemActive),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRegistered {
    pub tenant_id: TenantId,
    pub item_id: StockItemId,
    pub code: String,
    pub details: ItemDetails,
    pub minimum_stock: i64,
    pub created_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdated {
    pub tenant_id: TenantId,
    pub item_id: StockItemId,
    pub details: ItemDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimumStockSet {
    pub tenant_id: TenantId,
    pub item_id: StockItemId,
    pub minimum_stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// One ledger entry. `new_stock = previous_stock ± quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMoved {
    pub tenant_id: TenantId,
    pub item_id: StockItemId,
    pub kind: MovementKind,
    pub quantity: i64,
    pub reason: String,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl StockMoved {
    /// Signed change this movement applies to the running quantity.
    pub fn delta(&self) -> i64 {
        self.new_stock - self.previous_stock
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemActiveChanged {
    pub tenant_id: TenantId,
    pub item_id: StockItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockItemEvent {
    ItemRegistered(ItemRegistered),
    ItemUpdated(ItemUpdated),
    MinimumStockSet(MinimumStockSet),
    StockMoved(StockMoved),
    ItemDeactivated(ItemActiveChanged),
    ItemActivated(ItemActiveChanged),
}

impl StockItemEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            StockItemEvent::ItemRegistered(e) => e.tenant_id,
            StockItemEvent::ItemUpdated(e) => e.tenant_id,
            StockItemEvent::MinimumStockSet(e) => e.tenant_id,
            StockItemEvent::StockMoved(e) => e.tenant_id,
            StockItemEvent::ItemDeactivated(e) | StockItemEvent::ItemActivated(e) => e.tenant_id,
        }
    }
}

impl Event for StockItemEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockItemEvent::ItemRegistered(_) => "inventory.item.registered",
            StockItemEvent::ItemUpdated(_) => "inventory.item.updated",
            StockItemEvent::MinimumStockSet(_) => "inventory.item.minimum_stock_set",
            StockItemEvent::StockMoved(_) => "inventory.item.stock_moved",
            StockItemEvent::ItemDeactivated(_) => "inventory.item.deactivated",
            StockItemEvent::ItemActivated(_) => "inventory.item.activated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockItemEvent::ItemRegistered(e) => e.occurred_at,
            StockItemEvent::ItemUpdated(e) => e.occurred_at,
            StockItemEvent::MinimumStockSet(e) => e.occurred_at,
            StockItemEvent::StockMoved(e) => e.occurred_at,
            StockItemEvent::ItemDeactivated(e) | StockItemEvent::ItemActivated(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate impl
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for StockItem {
    type Command = StockItemCommand;
    type Event = StockItemEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockItemEvent::ItemRegistered(e) => {
                self.id = e.item_id;
                self.tenant_id = Some(e.tenant_id);
                self.code = e.code.clone();
                self.details = Some(e.details.clone());
                self.minimum_stock = e.minimum_stock;
                self.quantity = 0;
                self.active = true;
                self.created_by = Some(e.created_by);
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.created = true;
            }
            StockItemEvent::ItemUpdated(e) => {
                self.details = Some(e.details.clone());
                self.updated_at = Some(e.occurred_at);
            }
            StockItemEvent::MinimumStockSet(e) => {
                self.minimum_stock = e.minimum_stock;
                self.updated_at = Some(e.occurred_at);
            }
            StockItemEvent::StockMoved(e) => {
                self.quantity = e.new_stock;
                self.updated_at = Some(e.occurred_at);
            }
            StockItemEvent::ItemDeactivated(e) => {
                self.active = false;
                self.updated_at = Some(e.occurred_at);
            }
            StockItemEvent::ItemActivated(e) => {
                self.active = true;
                self.updated_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockItemCommand::Register(cmd) => self.handle_register(cmd),
            StockItemCommand::Update(cmd) => self.handle_update(cmd),
            StockItemCommand::SetMinimumStock(cmd) => self.handle_minimum(cmd),
            StockItemCommand::RecordMovement(cmd) => self.handle_movement(cmd),
            StockItemCommand::CountStock(cmd) => self.handle_count(cmd),
            StockItemCommand::Deactivate(cmd) => self.handle_active(cmd, false),
            StockItemCommand::Activate(cmd) => self.handle_active(cmd, true),
        }
    }
}

impl StockItem {
    fn ensure_exists(&self, tenant_id: TenantId, item_id: StockItemId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterItem) -> Result<Vec<StockItemEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("item already exists"));
        }

        let code = field::required("code", &cmd.code, CODE_MAX)?;
        let quantity = field::at_most("quantity", field::non_negative("quantity", cmd.quantity)?, MAX_STOCK)?;
        let minimum_stock = field::non_negative(
            "minimum_stock",
            cmd.minimum_stock.unwrap_or(DEFAULT_MINIMUM_STOCK),
        )?;
        let minimum_stock = field::at_most("minimum_stock", minimum_stock, MAX_STOCK)?;

        let details = ItemDetails {
            name: field::required("name", &cmd.name, NAME_MAX)?,
            category_id: cmd.category_id,
            location_id: cmd.location_id,
            description: field::optional_text(cmd.description.as_deref()),
            measurements: field::optional("measurements", cmd.measurements.as_deref(), SPEC_MAX)?,
            material: field::optional("material", cmd.material.as_deref(), SPEC_MAX)?,
            brand: field::optional("brand", cmd.brand.as_deref(), SPEC_MAX)?,
            model: field::optional("model", cmd.model.as_deref(), SPEC_MAX)?,
            unit: cmd.unit.unwrap_or_default(),
            purchase_price: Price::parse_opt("purchase_price", cmd.purchase_price)?,
            sale_price: Price::parse_opt("sale_price", cmd.sale_price)?,
            notes: field::optional_text(cmd.notes.as_deref()),
        };

        let mut events = vec![StockItemEvent::ItemRegistered(ItemRegistered {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            code,
            details,
            minimum_stock,
            created_by: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })];

        if quantity > 0 {
            events.push(StockItemEvent::StockMoved(StockMoved {
                tenant_id: cmd.tenant_id,
                item_id: cmd.item_id,
                kind: MovementKind::Inbound,
                quantity,
                reason: INITIAL_STOCK_REASON.to_string(),
                previous_stock: 0,
                new_stock: quantity,
                user_id: cmd.user_id,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_update(&self, cmd: &UpdateItem) -> Result<Vec<StockItemEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.item_id)?;
        let Some(current) = self.details.as_ref() else {
            return Err(DomainError::not_found());
        };
        let c = &cmd.changes;

        fn keep_or(
            field_name: &str,
            change: &Option<String>,
            current: &Option<String>,
            max: Option<usize>,
        ) -> Result<Option<String>, DomainError> {
            match (change, max) {
                (None, _) => Ok(current.clone()),
                (Some(v), Some(max)) => field::optional(field_name, Some(v.as_str()), max),
                (Some(v), None) => Ok(field::optional_text(Some(v.as_str()))),
            }
        }

        let details = ItemDetails {
            name: match &c.name {
                Some(n) => field::required("name", n, NAME_MAX)?,
                None => current.name.clone(),
            },
            category_id: c.category_id.unwrap_or(current.category_id),
            location_id: c.location_id.unwrap_or(current.location_id),
            description: keep_or("description", &c.description, &current.description, None)?,
            measurements: keep_or("measurements", &c.measurements, &current.measurements, Some(SPEC_MAX))?,
            material: keep_or("material", &c.material, &current.material, Some(SPEC_MAX))?,
            brand: keep_or("brand", &c.brand, &current.brand, Some(SPEC_MAX))?,
            model: keep_or("model", &c.model, &current.model, Some(SPEC_MAX))?,
            unit: c.unit.unwrap_or(current.unit),
            purchase_price: match c.purchase_price {
                Some(p) => Some(Price::parse("purchase_price", p)?),
                None => current.purchase_price,
            },
            sale_price: match c.sale_price {
                Some(p) => Some(Price::parse("sale_price", p)?),
                None => current.sale_price,
            },
            notes: keep_or("notes", &c.notes, &current.notes, None)?,
        };

        if &details == current {
            return Ok(vec![]);
        }

        Ok(vec![StockItemEvent::ItemUpdated(ItemUpdated {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_minimum(&self, cmd: &SetMinimumStock) -> Result<Vec<StockItemEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.item_id)?;
        let minimum_stock = field::non_negative("minimum_stock", cmd.minimum_stock)?;
        let minimum_stock = field::at_most("minimum_stock", minimum_stock, MAX_STOCK)?;
        if minimum_stock == self.minimum_stock {
            return Ok(vec![]);
        }
        Ok(vec![StockItemEvent::MinimumStockSet(MinimumStockSet {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            minimum_stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_movement(&self, cmd: &RecordMovement) -> Result<Vec<StockItemEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.item_id)?;

        let quantity = field::at_most("quantity", field::at_least("quantity", cmd.quantity, 1)?, MAX_STOCK)?;
        let reason = field::required_text("reason", &cmd.reason)?;

        let new_stock = match cmd.kind {
            MovementKind::Inbound | MovementKind::Return => self
                .quantity
                .checked_add(quantity)
                .filter(|next| *next <= MAX_STOCK)
                .ok_or_else(|| {
                    DomainError::invariant(format!(
                        "stock would exceed {MAX_STOCK}: {} on hand, {} incoming",
                        self.quantity, quantity
                    ))
                })?,
            MovementKind::Outbound => {
                if !self.active {
                    return Err(DomainError::invariant("item is inactive"));
                }
                let next = self.quantity - quantity;
                if next < 0 {
                    return Err(DomainError::invariant(format!(
                        "insufficient stock: {} available, {} requested",
                        self.quantity, quantity
                    )));
                }
                next
            }
            MovementKind::Adjustment => {
                return Err(DomainError::field(
                    "kind",
                    "adjustments are recorded through a stock count",
                ));
            }
        };

        Ok(vec![StockItemEvent::StockMoved(StockMoved {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            kind: cmd.kind,
            quantity,
            reason,
            previous_stock: self.quantity,
            new_stock,
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_count(&self, cmd: &CountStock) -> Result<Vec<StockItemEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.item_id)?;

        let counted = field::at_most("counted", field::non_negative("counted", cmd.counted)?, MAX_STOCK)?;
        if counted == self.quantity {
            return Err(DomainError::field(
                "counted",
                "matches the current stock; nothing to adjust",
            ));
        }
        let reason = field::optional_text(cmd.reason.as_deref())
            .unwrap_or_else(|| "Stock count".to_string());

        Ok(vec![StockItemEvent::StockMoved(StockMoved {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            kind: MovementKind::Adjustment,
            quantity: (counted - self.quantity).abs(),
            reason,
            previous_stock: self.quantity,
            new_stock: counted,
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_active(&self, cmd: &SetItemActive, active: bool) -> Result<Vec<StockItemEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.item_id)?;
        if self.active == active {
            return Err(DomainError::conflict(if active {
                "item is already active"
            } else {
                "item is already inactive"
            }));
        }
        let changed = ItemActiveChanged {
            tenant_id: cmd.tenant_id,
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        };
        Ok(vec![if active {
            StockItemEvent::ItemActivated(changed)
        } else {
            StockItemEvent::ItemDeactivated(changed)
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use workshop_events::execute;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn register_cmd(tenant_id: TenantId, item_id: StockItemId, quantity: i64) -> RegisterItem {
        RegisterItem {
            tenant_id,
            item_id,
            code: "RD-6204".into(),
            name: "Rodamiento 6204".into(),
            category_id: CategoryId::generate(),
            location_id: LocationId::generate(),
            description: None,
            measurements: Some("47x20x14 mm".into()),
            material: Some("acero".into()),
            brand: Some("SKF".into()),
            model: None,
            unit: None,
            quantity,
            minimum_stock: None,
            purchase_price: Some(Decimal::new(3500, 0)),
            sale_price: Some(Decimal::new(5990, 0)),
            notes: None,
            user_id: UserId::new(),
            occurred_at: test_time(),
        }
    }

    fn registered(quantity: i64) -> (TenantId, StockItem) {
        let tenant_id = test_tenant_id();
        let item_id = StockItemId::generate();
        let mut item = StockItem::empty(item_id);
        execute(&mut item, &StockItemCommand::Register(register_cmd(tenant_id, item_id, quantity))).unwrap();
        (tenant_id, item)
    }

    fn movement(tenant_id: TenantId, item: &StockItem, kind: MovementKind, quantity: i64) -> StockItemCommand {
        StockItemCommand::RecordMovement(RecordMovement {
            tenant_id,
            item_id: *item.id(),
            kind,
            quantity,
            reason: "test".into(),
            user_id: UserId::new(),
            occurred_at: test_time(),
        })
    }

    #[test]
    fn register_applies_defaults() {
        let (_, item) = registered(0);
        let details = item.details().unwrap();

        assert_eq!(item.minimum_stock(), DEFAULT_MINIMUM_STOCK);
        assert_eq!(details.unit, Unit::Unit);
        assert_eq!(item.quantity(), 0);
        assert!(item.is_active());
        assert_eq!(item.display(), "RD-6204 - Rodamiento 6204");
        assert_eq!(item.version(), 1);
    }

    #[test]
    fn opening_quantity_is_recorded_as_inbound_movement() {
        let tenant_id = test_tenant_id();
        let item_id = StockItemId::generate();
        let mut item = StockItem::empty(item_id);

        let events = execute(&mut item, &StockItemCommand::Register(register_cmd(tenant_id, item_id, 12))).unwrap();

        assert_eq!(events.len(), 2);
        match &events[1] {
            StockItemEvent::StockMoved(m) => {
                assert_eq!(m.kind, MovementKind::Inbound);
                assert_eq!((m.previous_stock, m.new_stock), (0, 12));
                assert_eq!(m.reason, INITIAL_STOCK_REASON);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(item.quantity(), 12);
    }

    #[test]
    fn negative_opening_quantity_is_rejected() {
        let item_id = StockItemId::generate();
        let item = StockItem::empty(item_id);
        let err = item
            .handle(&StockItemCommand::Register(register_cmd(test_tenant_id(), item_id, -1)))
            .unwrap_err();
        assert_eq!(err, DomainError::field("quantity", "must be greater than or equal to 0"));
    }

    #[test]
    fn prices_with_three_decimals_are_rejected() {
        let tenant_id = test_tenant_id();
        let item_id = StockItemId::generate();
        let mut cmd = register_cmd(tenant_id, item_id, 0);
        cmd.sale_price = Some(Decimal::new(10005, 3));

        let err = StockItem::empty(item_id)
            .handle(&StockItemCommand::Register(cmd))
            .unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.starts_with("sale_price")),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn outbound_cannot_go_negative() {
        let (tenant_id, item) = registered(3);
        let err = item.handle(&movement(tenant_id, &item, MovementKind::Outbound, 4)).unwrap_err();
        match err {
            DomainError::InvariantViolation(_) => {}
            _ => panic!("Expected InvariantViolation error"),
        }
    }

    #[test]
    fn zero_quantity_movement_is_rejected() {
        let (tenant_id, item) = registered(3);
        let err = item.handle(&movement(tenant_id, &item, MovementKind::Inbound, 0)).unwrap_err();
        assert_eq!(err, DomainError::field("quantity", "must be greater than or equal to 1"));
    }

    #[test]
    fn movement_quantity_above_the_ceiling_is_rejected() {
        let (tenant_id, item) = registered(1);
        let err = item.handle(&movement(tenant_id, &item, MovementKind::Inbound, i64::MAX)).unwrap_err();
        assert_eq!(
            err,
            DomainError::field("quantity", format!("must be less than or equal to {MAX_STOCK}"))
        );
    }

    #[test]
    fn stock_cannot_grow_past_the_ceiling() {
        let (tenant_id, item) = registered(MAX_STOCK);
        for kind in [MovementKind::Inbound, MovementKind::Return] {
            match item.handle(&movement(tenant_id, &item, kind, 1)).unwrap_err() {
                DomainError::InvariantViolation(msg) => assert!(msg.starts_with("stock would exceed")),
                other => panic!("expected InvariantViolation, got {other:?}"),
            }
        }
        assert_eq!(item.quantity(), MAX_STOCK);
    }

    #[test]
    fn opening_quantity_and_count_are_bounded() {
        let tenant_id = TenantId::new();
        let item_id = StockItemId::generate();
        let err = StockItem::empty(item_id)
            .handle(&StockItemCommand::Register(register_cmd(tenant_id, item_id, MAX_STOCK + 1)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(m) if m.starts_with("quantity")));

        let (tenant_id, item) = registered(3);
        let err = item
            .handle(&StockItemCommand::CountStock(CountStock {
                tenant_id,
                item_id: *item.id(),
                counted: i64::MAX,
                reason: None,
                user_id: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(m) if m.starts_with("counted")));
    }

    #[test]
    fn direct_adjustment_is_rejected() {
        let (tenant_id, item) = registered(3);
        assert!(item.handle(&movement(tenant_id, &item, MovementKind::Adjustment, 1)).is_err());
    }

    #[test]
    fn movements_chain_previous_and_new_stock() {
        let (tenant_id, mut item) = registered(10);
        let mut ledger = Vec::new();
        for (kind, qty) in [
            (MovementKind::Outbound, 4),
            (MovementKind::Inbound, 7),
            (MovementKind::Return, 1),
            (MovementKind::Outbound, 14),
        ] {
            let cmd = movement(tenant_id, &item, kind, qty);
            for ev in execute(&mut item, &cmd).unwrap() {
                if let StockItemEvent::StockMoved(m) = ev {
                    ledger.push(m);
                }
            }
        }

        assert_eq!(ledger[0].previous_stock, 10);
        for pair in ledger.windows(2) {
            assert_eq!(pair[0].new_stock, pair[1].previous_stock);
        }
        assert_eq!(item.quantity(), 0);
    }

    #[test]
    fn count_produces_adjustment_in_either_direction() {
        let (tenant_id, mut item) = registered(10);
        let count = |counted| {
            StockItemCommand::CountStock(CountStock {
                tenant_id,
                item_id: *item.id(),
                counted,
                reason: None,
                user_id: UserId::new(),
                occurred_at: test_time(),
            })
        };

        let down = count(7);
        let events = execute(&mut item, &down).unwrap();
        match &events[0] {
            StockItemEvent::StockMoved(m) => {
                assert_eq!(m.kind, MovementKind::Adjustment);
                assert_eq!(m.quantity, 3);
                assert_eq!(m.delta(), -3);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(item.quantity(), 7);

        let up = StockItemCommand::CountStock(CountStock {
            tenant_id,
            item_id: *item.id(),
            counted: 9,
            reason: Some("recount".into()),
            user_id: UserId::new(),
            occurred_at: test_time(),
        });
        execute(&mut item, &up).unwrap();
        assert_eq!(item.quantity(), 9);
    }

    #[test]
    fn count_equal_to_current_is_rejected() {
        let (tenant_id, item) = registered(10);
        let err = item
            .handle(&StockItemCommand::CountStock(CountStock {
                tenant_id,
                item_id: *item.id(),
                counted: 10,
                reason: None,
                user_id: UserId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.starts_with("counted")),
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn low_stock_and_value_follow_quantity() {
        let (tenant_id, mut item) = registered(6);
        assert!(!item.is_low_stock());
        assert_eq!(item.total_stock_value(), Decimal::new(21000, 0));

        let cmd = movement(tenant_id, &item, MovementKind::Outbound, 1);
        execute(&mut item, &cmd).unwrap();
        assert!(item.is_low_stock());
    }

    #[test]
    fn update_keeps_missing_fields_and_clears_blank_ones() {
        let (tenant_id, mut item) = registered(0);
        let item_id = *item.id();
        execute(
            &mut item,
            &StockItemCommand::Update(UpdateItem {
                tenant_id,
                item_id,
                changes: ItemChanges {
                    brand: Some(" ".into()),
                    unit: Some(Unit::Box),
                    ..Default::default()
                },
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let d = item.details().unwrap();
        assert_eq!(d.brand, None);
        assert_eq!(d.unit, Unit::Box);
        assert_eq!(d.material.as_deref(), Some("acero"));
    }

    #[test]
    fn outbound_on_inactive_item_is_rejected_but_return_is_allowed() {
        let (tenant_id, mut item) = registered(5);
        let item_id = *item.id();
        execute(
            &mut item,
            &StockItemCommand::Deactivate(SetItemActive {
                tenant_id,
                item_id,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert!(item.handle(&movement(tenant_id, &item, MovementKind::Outbound, 1)).is_err());
        assert!(item.handle(&movement(tenant_id, &item, MovementKind::Return, 1)).is_ok());
    }

    proptest! {
        #[test]
        fn low_stock_iff_quantity_at_or_below_minimum(q in 0i64..100_000, m in 0i64..100_000) {
            prop_assert_eq!(is_low_stock(q, m), q <= m);
        }

        #[test]
        fn stock_value_is_quantity_times_purchase_price(q in 0i64..1_000_000, cents in 0i64..10_000_000) {
            let price = Price::parse("purchase_price", Decimal::new(cents, 2)).unwrap();
            prop_assert_eq!(total_stock_value(q, Some(price)), Decimal::from(q) * Decimal::new(cents, 2));
            prop_assert_eq!(total_stock_value(q, None), Decimal::ZERO);
        }

        #[test]
        fn outbound_never_drives_stock_negative(start in 0i64..50, take in 1i64..100) {
            let (tenant_id, item) = registered(start);
            let result = item.handle(&movement(tenant_id, &item, MovementKind::Outbound, take));
            match result {
                Ok(events) => match &events[0] {
                    StockItemEvent::StockMoved(m) => prop_assert!(m.new_stock >= 0),
                    _ => prop_assert!(false),
                },
                Err(_) => prop_assert!(take > start),
            }
        }

        #[test]
        fn incoming_stock_stays_within_bounds(start in 0i64..=MAX_STOCK, take in 1i64..=i64::MAX) {
            let (tenant_id, item) = registered(start);
            match item.handle(&movement(tenant_id, &item, MovementKind::Inbound, take)) {
                Ok(events) => match &events[0] {
                    StockItemEvent::StockMoved(m) => {
                        prop_assert_eq!(m.new_stock, m.previous_stock + m.quantity);
                        prop_assert!((0..=MAX_STOCK).contains(&m.new_stock));
                    }
                    _ => prop_assert!(false),
                },
                Err(_) => prop_assert!(start + take.min(MAX_STOCK + 1) > MAX_STOCK),
            }
        }
    }
}
