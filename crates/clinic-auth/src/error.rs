//! Authentication error types.

use chrono::{DateTime, Utc};
use clinic_core::error::ClinicError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is locked")]
    AccountLocked,

    #[error("account is inactive")]
    AccountInactive,

    #[error("account is pending verification")]
    AccountPendingVerification,

    #[error("{message}")]
    RateLimited {
        message: String,
        blocked_until: Option<DateTime<Utc>>,
    },

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for ClinicError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::RateLimited {
                message,
                blocked_until,
            } => ClinicError::RateLimited {
                message,
                blocked_until,
            },
            AuthError::WeakPassword { .. } => ClinicError::Validation {
                message: err.to_string(),
            },
            AuthError::Crypto(msg) => ClinicError::Crypto(msg),
            AuthError::InvalidCredentials
            | AuthError::AccountLocked
            | AuthError::AccountInactive
            | AuthError::AccountPendingVerification
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_) => ClinicError::AuthenticationFailed {
                reason: err.to_string(),
            },
        }
    }
}
