//! API error type and its JSON body.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cat_identity::AuthorityError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Authority(#[from] AuthorityError),

    /// Caller could not be authenticated; the reason is only logged
    #[error("Authentication failed.")]
    AuthenticationFailed { code: &'static str },

    #[error("Invalid request body: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Authority(err) => match err {
                AuthorityError::EntityNotFound { .. } | AuthorityError::EntityTypeNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                AuthorityError::CaNotReady => StatusCode::SERVICE_UNAVAILABLE,
                AuthorityError::Certificate(_) => StatusCode::BAD_REQUEST,
                AuthorityError::Setup(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::AuthenticationFailed { .. } => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Authority(err) => err.code(),
            Self::AuthenticationFailed { code } => *code,
            Self::BadRequest(_) => "bad_request",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        }
        let body = ErrorResponse {
            detail: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}
