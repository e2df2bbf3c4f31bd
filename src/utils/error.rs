use axum::http::StatusCode;
use serde_json::json;

use crate::utils::api_response::ApiResponse;

/// Result type for scheduling domain operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors that can occur in the scheduling core.
///
/// Every failure keeps its distinguishing kind all the way to the caller;
/// nothing is collapsed into a generic error. The auto-completion sweeper is
/// the only place these are caught and logged instead of surfaced.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{0}")]
    State(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Format(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    /// Machine-readable kind, stamped into the error payload.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation",
            ServiceError::Authorization(_) => "authorization",
            ServiceError::State(_) => "state",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Format(_) => "format",
            ServiceError::Database(e) if is_unique_violation(e) => "conflict",
            ServiceError::Database(_) => "database",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Authorization(_) => StatusCode::FORBIDDEN,
            ServiceError::State(_) => StatusCode::CONFLICT,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Format(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Database(e) if is_unique_violation(e) => StatusCode::CONFLICT,
            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// PostgreSQL unique constraint violation (error code 23505).
///
/// Raced inserts on `lessons.request_id` and the partial unique index on
/// pending change requests land here; both surface as conflicts.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

impl From<ServiceError> for ApiResponse<()> {
    fn from(err: ServiceError) -> Self {
        let kind = err.kind();
        let status = err.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "Unexpected service error");
        }
        ApiResponse::error(status, err.to_string(), Some(json!({ "kind": kind })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_kind_maps_to_its_status() {
        let cases = [
            (
                ServiceError::Validation("bad".into()),
                StatusCode::BAD_REQUEST,
                "validation",
            ),
            (
                ServiceError::Authorization("no".into()),
                StatusCode::FORBIDDEN,
                "authorization",
            ),
            (
                ServiceError::State("terminal".into()),
                StatusCode::CONFLICT,
                "state",
            ),
            (
                ServiceError::Conflict("dup".into()),
                StatusCode::CONFLICT,
                "conflict",
            ),
            (
                ServiceError::NotFound("gone".into()),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
            (
                ServiceError::Format("corrupt".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "format",
            ),
        ];
        for (err, status, kind) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn state_and_conflict_stay_distinguishable() {
        let state = ServiceError::State("already completed".into());
        let conflict = ServiceError::Conflict("duplicate pending request".into());
        assert_eq!(state.status_code(), conflict.status_code());
        assert_ne!(state.kind(), conflict.kind());
    }

    #[test]
    fn row_not_found_is_a_database_error_not_a_not_found() {
        // Lookups translate RowNotFound into NotFound explicitly at the call
        // site; a raw sqlx passthrough keeps the database kind.
        let err = ServiceError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.kind(), "database");
    }
}
