use axum::{Router, routing::get};

pub mod admin;
pub mod audit;
pub mod clients;
pub mod common;
pub mod inventory;
pub mod machine_types;
pub mod system;
pub mod users;
pub mod visits;
pub mod work_orders;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/users", users::router())
        .nest("/inventory", inventory::router())
        .nest("/clients", clients::router())
        .nest("/machine-types", machine_types::router())
        .nest("/work-orders", work_orders::router())
        .nest("/visits", visits::router())
        .nest("/audit", audit::router())
        .nest("/admin", admin::router())
}
