use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use workshop_auth::AuthzError;
use workshop_core::DomainError;
use workshop_infra::command_dispatcher::DispatchError;
use workshop_infra::unique_index::UniqueKeyError;
use workshop_infra::workflows::WorkflowError;

/// Error returned by handlers, rendered as `{"error", "message"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
    }

    pub fn invalid_id(what: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_error(self.status, self.code, self.message)
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Concurrency(msg) => Self::new(StatusCode::CONFLICT, "conflict", msg),
            DispatchError::Conflict(msg) => Self::new(StatusCode::CONFLICT, "conflict", msg),
            DispatchError::Validation(msg) => Self::validation(msg),
            DispatchError::InvariantViolation(msg) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
            }
            DispatchError::Unauthorized => Self::new(StatusCode::FORBIDDEN, "forbidden", "unauthorized"),
            DispatchError::NotFound => Self::new(StatusCode::NOT_FOUND, "not_found", "not found"),
            DispatchError::TenantIsolation(msg) => Self::new(StatusCode::FORBIDDEN, "tenant_isolation", msg),
            DispatchError::Deserialize(msg) => {
                error!(error = %msg, "stored event could not be decoded");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
            }
            DispatchError::Store(e) => {
                error!(error = %e, "event store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
            }
            DispatchError::Publish(msg) => Self::new(StatusCode::BAD_GATEWAY, "publish_error", msg),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        DispatchError::from(err).into()
    }
}

impl From<UniqueKeyError> for ApiError {
    fn from(err: UniqueKeyError) -> Self {
        DispatchError::from(err).into()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Dispatch(e) => e.into(),
            e @ WorkflowError::CompensationFailed { .. } => {
                error!(error = %e, "workflow left inconsistent state");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "compensation_failed", e.to_string())
            }
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        warn!(error = %err, "request denied");
        Self::new(StatusCode::FORBIDDEN, "forbidden", err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "invalid_body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_query", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_path", rejection.body_text())
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_errors_map_to_documented_statuses() {
        let cases = [
            (DispatchError::Validation("name: required".into()), StatusCode::BAD_REQUEST),
            (DispatchError::NotFound, StatusCode::NOT_FOUND),
            (DispatchError::Conflict("code: taken".into()), StatusCode::CONFLICT),
            (DispatchError::Concurrency("stale".into()), StatusCode::CONFLICT),
            (DispatchError::InvariantViolation("closed".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (DispatchError::Unauthorized, StatusCode::FORBIDDEN),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn forbidden_carries_the_missing_permission() {
        let err = ApiError::from(AuthzError::Forbidden("audit.write".into()));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(err.message.contains("audit.write"));
    }
}
