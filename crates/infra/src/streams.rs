//! Aggregate type names: the stream kind recorded on every stored event.

pub const USER: &str = "auth.user";
pub const PROFILE: &str = "auth.profile";
pub const CATEGORY: &str = "inventory.category";
pub const LOCATION: &str = "inventory.location";
pub const STOCK_ITEM: &str = "inventory.item";
pub const CLIENT: &str = "service.client";
pub const MACHINE_TYPE: &str = "service.machine_type";
pub const WORK_ORDER: &str = "service.work_order";
pub const HOME_VISIT: &str = "service.home_visit";
pub const CHANGE_RECORD: &str = "audit.change";
