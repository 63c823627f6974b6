/// Typed error taxonomy for the workflow engine
///
/// The repository and synchronizer raise these directly; the tool adapter
/// converts every variant into its response envelope, and the HTTP layer maps
/// them onto status codes. Nothing escapes as an unhandled fault.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Convenience alias used throughout the workflow and tool modules
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// All failure modes a workflow operation can surface
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No caller identity supplied by the session collaborator
    #[error("authentication required")]
    Unauthenticated,

    /// Caller identity known, but the access check denied the operation
    #[error("access to workflow {0} denied")]
    Unauthorized(Uuid),

    /// Id is not a syntactically valid UUID; rejected before storage is hit
    #[error("'{0}' is not a valid workflow id; use the list or find_by_name actions to look up real workflow ids first")]
    MalformedId(String),

    #[error("workflow {0} not found")]
    NotFound(Uuid),

    /// Bad input: missing required field, non-object node config, dangling
    /// edge endpoint in a structure batch
    #[error("{0}")]
    Validation(String),

    /// Destructive operation attempted without the explicit confirmation flag
    #[error("deleting a workflow requires confirm=true")]
    NotConfirmed,

    /// Optimistic concurrency guard tripped: the record changed underneath
    /// the caller's read
    #[error("workflow {id} was modified concurrently (expected version {expected})")]
    Conflict { id: Uuid, expected: i64 },

    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// A stored record could not be decoded back into its domain type
    #[error("corrupt stored record: {0}")]
    Corrupt(String),
}

impl WorkflowError {
    /// Stable machine-readable tag for the tool envelope's `error` field
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Unauthenticated => "unauthenticated",
            WorkflowError::Unauthorized(_) => "unauthorized",
            WorkflowError::MalformedId(_) => "malformed_id",
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::Validation(_) => "validation",
            WorkflowError::NotConfirmed => "not_confirmed",
            WorkflowError::Conflict { .. } => "conflict",
            WorkflowError::Storage(_) | WorkflowError::Corrupt(_) => "storage",
        }
    }

    /// HTTP status the error maps to on the REST surface
    pub fn status_code(&self) -> StatusCode {
        match self {
            WorkflowError::Unauthenticated => StatusCode::UNAUTHORIZED,
            WorkflowError::Unauthorized(_) => StatusCode::FORBIDDEN,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::MalformedId(_)
            | WorkflowError::Validation(_)
            | WorkflowError::NotConfirmed => StatusCode::BAD_REQUEST,
            WorkflowError::Conflict { .. } => StatusCode::CONFLICT,
            WorkflowError::Storage(_) | WorkflowError::Corrupt(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal storage error: {}", self);
        }
        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
