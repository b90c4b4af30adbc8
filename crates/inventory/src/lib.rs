//! Inventory domain (event-sourced).
//!
//! Categories, storage locations and stock items. Stock movements are
//! events on the item stream; there is no separate movement aggregate.

pub mod category;
pub mod item;
pub mod location;
pub mod unit;

pub use category::{
    Category, CategoryActiveChanged, CategoryCommand, CategoryCreated, CategoryEvent, CategoryId,
    CategoryUpdated, CreateCategory, SetCategoryActive, UpdateCategory,
};
pub use item::{
    CountStock, INITIAL_STOCK_REASON, ItemActiveChanged, MAX_STOCK, ItemChanges, ItemDetails, ItemRegistered,
    ItemUpdated, MinimumStockSet, RecordMovement, RegisterItem, SetItemActive, SetMinimumStock,
    StockItem, StockItemCommand, StockItemEvent, StockItemId, StockMoved, UpdateItem, is_low_stock,
    total_stock_value,
};
pub use location::{
    CreateLocation, Location, LocationActiveChanged, LocationCommand, LocationDetails, LocationEvent,
    LocationId, SetLocationActive, UpdateLocation,
};
pub use unit::{MovementKind, Unit};
