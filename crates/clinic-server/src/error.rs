//! Mapping of [`ClinicError`] to JSON error responses.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use clinic_core::error::ClinicError;
use clinic_core::models::tenant::QuotaResource;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<QuotaResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_until: Option<DateTime<Utc>>,
}

impl ErrorDetail {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            limit: None,
            resource: None,
            blocked_until: None,
        }
    }
}

/// Error returned by every RPC handler.
#[derive(Debug)]
pub struct ApiError(pub ClinicError);

impl From<ClinicError> for ApiError {
    fn from(err: ClinicError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn unauthorized(reason: &str) -> Self {
        Self(ClinicError::AuthenticationFailed {
            reason: reason.into(),
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let (status, detail) = match self.0 {
            ClinicError::Forbidden { reason } => {
                (StatusCode::FORBIDDEN, ErrorDetail::new("FORBIDDEN", reason))
            }
            err @ ClinicError::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", err.to_string()),
            ),
            err @ ClinicError::AlreadyExists { .. } => (
                StatusCode::CONFLICT,
                ErrorDetail::new("ALREADY_EXISTS", err.to_string()),
            ),
            err @ ClinicError::QuotaExceeded { resource, limit } => (
                StatusCode::PAYMENT_REQUIRED,
                ErrorDetail {
                    limit: Some(limit),
                    resource: Some(resource),
                    ..ErrorDetail::new("QUOTA_EXCEEDED", err.to_string())
                },
            ),
            ClinicError::RateLimited {
                message,
                blocked_until,
            } => {
                retry_after = blocked_until
                    .map(|until| (until - Utc::now()).num_seconds().max(1));
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    ErrorDetail {
                        blocked_until,
                        ..ErrorDetail::new("RATE_LIMITED", message)
                    },
                )
            }
            ClinicError::AuthenticationFailed { reason } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("AUTHENTICATION_FAILED", reason),
            ),
            ClinicError::Validation { message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION", message),
            ),
            err @ (ClinicError::Database(_) | ClinicError::Crypto(_) | ClinicError::Internal(_)) => {
                tracing::error!(error = %err, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetail::new("INTERNAL", "An internal error occurred"),
                )
            }
        };

        let mut response = (status, Json(ErrorBody { error: detail })).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
