//! HTTP error mapping.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::error::TodoError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Todo(#[from] TodoError),

    #[error("Login required")]
    Unauthenticated,

    #[error("Session error: {0}")]
    Session(String),

    /// The request could not be decoded (bad JSON body or path parameter).
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::Rejected {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        ApiError::Rejected {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl From<tower_sessions::session::Error> for ApiError {
    fn from(e: tower_sessions::session::Error) -> Self {
        ApiError::Session(e.to_string())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Todo(TodoError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Todo(TodoError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Todo(TodoError::UsernameTaken) => StatusCode::CONFLICT,
            ApiError::Todo(TodoError::InvalidCredentials) | ApiError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Todo(TodoError::Credential(_) | TodoError::Database(_))
            | ApiError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Rejected { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
