//! Tenant maintenance.

use std::sync::Arc;

use axum::{Extension, Json, Router, http::StatusCode, routing::post};
use tracing::{error, info};

use workshop_auth::Permission;

use crate::app::errors::ApiError;
use crate::app::routes::common::require;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/rebuild", post(rebuild))
}

/// Replay the tenant's event streams into fresh read models.
pub async fn rebuild(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require(&tenant, &principal, Permission::ALL)?;

    let tenant_id = tenant.tenant_id();
    let replayed = services.rebuild(tenant_id).map_err(|e| {
        error!(tenant_id = %tenant_id, error = %e, "read model rebuild failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "rebuild_failed", e.to_string())
    })?;
    info!(tenant_id = %tenant_id, events = replayed, "read models rebuilt");

    Ok(Json(serde_json::json!({ "events_replayed": replayed })))
}
