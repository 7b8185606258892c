//! Web request/response types and error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use registration_core::WebRegisterError;
use serde::{Deserialize, Serialize};

/// The registration form body.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

/// One downloadable artifact in the success response.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadInfo {
    pub token: String,
    pub url: String,
    pub filename: String,
}

/// Successful registration response.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub username: String,
    pub quick_connect: String,
    pub config_download: DownloadInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_download: Option<DownloadInfo>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub bundles_enabled: bool,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// A web API error with its HTTP mapping.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            message: message.into(),
        }
    }
}

impl From<WebRegisterError> for ApiError {
    fn from(e: WebRegisterError) -> Self {
        let (status, code) = match &e {
            WebRegisterError::MissingFields => (StatusCode::BAD_REQUEST, "MISSING_FIELDS"),
            WebRegisterError::IpAlreadyRegistered => {
                (StatusCode::TOO_MANY_REQUESTS, "IP_ALREADY_REGISTERED")
            }
            WebRegisterError::UsernameTaken => (StatusCode::CONFLICT, "USERNAME_TAKEN"),
            WebRegisterError::ServiceUnavailable => {
                (StatusCode::BAD_GATEWAY, "SERVICE_UNAVAILABLE")
            }
            WebRegisterError::Failed => (StatusCode::INTERNAL_SERVER_ERROR, "REGISTRATION_FAILED"),
        };
        Self {
            status,
            code,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            code: self.code.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}
