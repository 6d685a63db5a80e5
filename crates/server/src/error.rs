use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;

use expensa_core::errors::{ApplicationError, WorkflowError};
use expensa_core::steps::ConfigurationError;
use expensa_db::RepositoryError;

/// Handler-level failures with their HTTP mapping. Conversions from the
/// core and db error types keep handlers on plain `?`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Configuration(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Configuration(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                event_name = "api.request.failed",
                status = status.as_u16(),
                error = %self,
                "request failed"
            );
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(error: WorkflowError) -> Self {
        match error {
            WorkflowError::NotAnAssignedApprover { .. } => Self::Forbidden(error.to_string()),
            WorkflowError::InvalidExpenseTransition { .. }
            | WorkflowError::ExpenseAlreadyFinalized { .. }
            | WorkflowError::StepAlreadyDecided { .. } => Self::Conflict(error.to_string()),
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Workflow(workflow) => workflow.into(),
            ApplicationError::Validation(message) => Self::Validation(message),
            ApplicationError::Configuration(message) => Self::Configuration(message),
            ApplicationError::Persistence(message) => Self::Unavailable(message),
            ApplicationError::Conflict(message) => Self::Conflict(message),
        }
    }
}

impl From<ConfigurationError> for ApiError {
    fn from(error: ConfigurationError) -> Self {
        // A rule that cannot resolve to real approvers is an admin setup
        // problem, surfaced loudly instead of silently auto-approving.
        Self::Configuration(error.to_string())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict(message) => Self::Conflict(message),
            RepositoryError::Database(source) => Self::Unavailable(source.to_string()),
            RepositoryError::Decode(message) => Self::Internal(message),
        }
    }
}
