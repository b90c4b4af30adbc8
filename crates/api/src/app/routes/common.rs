use core::str::FromStr;

use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};
use serde::Serialize;

use workshop_auth::Permission;
use workshop_core::{AggregateId, TenantId};
use workshop_infra::event_store::StoredEvent;
use workshop_infra::unique_index::{UniqueKey, UniqueKeyIndex};

use crate::app::errors::ApiError;
use crate::authz::{self, CmdAuth};
use crate::context::{PrincipalContext, TenantContext};

/// Authorize `command` and hand it back for dispatch.
pub fn authorized<C>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    command: C,
    required: &[Permission],
) -> Result<C, ApiError> {
    let cmd_auth = CmdAuth::new(command, required);
    authz::authorize_command(tenant, principal, &cmd_auth)?;
    Ok(cmd_auth.inner)
}

pub fn require(tenant: &TenantContext, principal: &PrincipalContext, permission: Permission) -> Result<(), ApiError> {
    Ok(authz::require(tenant, principal, permission)?)
}

pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse().map_err(|_| ApiError::invalid_id(what))
}

/// Command result: the record id and what was appended.
pub fn committed(status: StatusCode, id: impl core::fmt::Display, events: &[StoredEvent]) -> Response {
    (
        status,
        Json(serde_json::json!({
            "id": id.to_string(),
            "events_committed": events.len(),
            "stream_version": events.last().map(|e| e.sequence_number),
        })),
    )
        .into_response()
}

pub fn found<T: Serialize>(value: Option<T>, what: &str) -> Result<Json<T>, ApiError> {
    value.map(Json).ok_or_else(|| ApiError::not_found(what))
}

/// Run `store` while holding the unique key `requested` for `owner`.
///
/// `requested: None` keeps the current value and a blank string clears it.
/// The new key is kept only if `store` succeeds; the old key is then released.
pub fn with_unique_key<T>(
    index: &UniqueKeyIndex,
    tenant_id: TenantId,
    key: UniqueKey,
    owner: AggregateId,
    current: Option<&str>,
    requested: Option<&str>,
    store: impl FnOnce() -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    let Some(requested) = requested.map(str::trim) else {
        return store();
    };
    if current.is_some_and(|c| c.trim().to_lowercase() == requested.to_lowercase()) {
        return store();
    }

    let reservation = if requested.is_empty() {
        None
    } else {
        Some(index.reserve(tenant_id, key, requested, owner)?)
    };
    let out = store()?;
    if let Some(reservation) = reservation {
        reservation.commit();
    }
    if let Some(old) = current {
        index.release(tenant_id, key, old, owner);
    }
    Ok(out)
}
