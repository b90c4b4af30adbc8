use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
};
use chrono::Utc;

use workshop_audit::{ChangeAction, ChangeCommand, ChangeRecord, ChangeRecordId, RecordChange};
use workshop_auth::Permission;
use workshop_infra::projections::{AuditEntryReadModel, AuditQuery};
use workshop_infra::read_model::{Page, Pagination};
use workshop_infra::streams;

use crate::app::dto::{self, AuditListParams, RecordChangeRequest};
use crate::app::errors::ApiError;
use crate::app::extract::{ApiJson, ApiQuery};
use crate::app::routes::common::{authorized, committed, found, parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_change).get(list_changes))
        .route("/:id", get(get_change))
}

/// First hop of `X-Forwarded-For`, if any.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Append an entry for the calling user.
pub async fn record_change(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<RecordChangeRequest>,
) -> Result<Response, ApiError> {
    let tenant_id = tenant.tenant_id();
    let change_id = ChangeRecordId::generate();
    let action: ChangeAction = dto::parse_required(&body.action)?;

    let cmd = ChangeCommand::Record(RecordChange {
        tenant_id,
        change_id,
        table: body.table,
        object_id: body.object_id,
        action,
        description: body.description,
        previous: body.previous,
        new: body.new,
        user_id: principal.user_id(),
        ip_address: body.ip_address.or_else(|| forwarded_for(&headers)),
        occurred_at: Utc::now(),
    });
    let cmd = authorized(&tenant, &principal, cmd, &[Permission::AUDIT_WRITE])?;
    let events = services.dispatch(tenant_id, change_id.into(), streams::CHANGE_RECORD, cmd, |_, id| {
        ChangeRecord::empty(ChangeRecordId::new(id))
    })?;

    Ok(committed(StatusCode::CREATED, change_id, &events))
}

/// Newest first.
pub async fn list_changes(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    ApiQuery(params): ApiQuery<AuditListParams>,
) -> Result<Json<Page<AuditEntryReadModel>>, ApiError> {
    require(&tenant, &principal, Permission::AUDIT_READ)?;
    let query = AuditQuery {
        table: params.table.filter(|t| !t.trim().is_empty()),
        object_id: params.object_id.filter(|o| !o.trim().is_empty()),
        action: dto::parse_opt(params.action.as_deref())?,
        user_id: dto::parse_opt(params.user_id.as_deref())?,
        search: params.search,
    };
    let page = Pagination::new(params.limit, params.offset);
    Ok(Json(services.audit().list(tenant.tenant_id(), &query, page)))
}

pub async fn get_change(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Json<AuditEntryReadModel>, ApiError> {
    require(&tenant, &principal, Permission::AUDIT_READ)?;
    let change_id: ChangeRecordId = parse_id(&id, "audit entry")?;
    found(services.audit().get(tenant.tenant_id(), &change_id), "audit entry")
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn forwarded_for_takes_the_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(forwarded_for(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn missing_header_gives_no_address() {
        assert_eq!(forwarded_for(&HeaderMap::new()), None);
    }
}
