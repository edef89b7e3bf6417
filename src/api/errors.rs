use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::core::security::SecurityError;
use crate::repositories::StoreError;
use crate::services::attempts::AttemptError;
use crate::services::grading::GradingError;
use crate::services::permissions::PermissionError;
use crate::services::progress::ProgressError;
use crate::services::sessions::SessionError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ApiError::Unauthorized(message) => message.to_string(),
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message) => message,
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                message
            }
        };

        let mut response =
            (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { kind } => Self::Conflict(format!("{kind} already exists")),
            other => Self::internal(other, "Store operation failed"),
        }
    }
}

impl From<AttemptError> for ApiError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::ModuleNotFound
            | AttemptError::UserNotFound
            | AttemptError::ResultsNotFound => Self::NotFound(err.to_string()),
            AttemptError::Grading(GradingError::MissingElement(id)) => {
                Self::NotFound(format!("Element {id} not found"))
            }
            AttemptError::Store(store) => store.into(),
        }
    }
}

impl From<ProgressError> for ApiError {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::UserNotFound | ProgressError::CourseNotFound => {
                Self::NotFound(err.to_string())
            }
            ProgressError::Store(store) => store.into(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self::internal(err, "Session store failure")
    }
}

impl From<SecurityError> for ApiError {
    fn from(err: SecurityError) -> Self {
        Self::internal(err, "Password hashing failed")
    }
}

impl From<PermissionError> for ApiError {
    fn from(err: PermissionError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
