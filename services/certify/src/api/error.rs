//! HTTP error responses.
//!
//! Errors reach the client as a fixed plain-text message. The underlying
//! cause is logged where the error is produced and never echoed back.

use axum::{
    http::{header::CONTENT_TYPE, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};

pub const ERROR_CODE_HEADER: HeaderName = HeaderName::from_static("x-error-code");

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    /// Stable machine-readable code, sent as `x-error-code`.
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            [
                (CONTENT_TYPE, "text/plain; charset=utf-8"),
                (ERROR_CODE_HEADER, self.code),
            ],
            self.message,
        )
            .into_response()
    }
}
