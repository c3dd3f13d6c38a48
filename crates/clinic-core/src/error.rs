//! Error types for the clinic platform.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::tenant::QuotaResource;

#[derive(Debug, Error)]
pub enum ClinicError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// Access to another tenant's data, or to a tenant the user is not
    /// linked to. Kept distinct from `NotFound`.
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Plan limit reached for {resource} ({limit})")]
    QuotaExceeded { resource: QuotaResource, limit: u32 },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("{message}")]
    RateLimited {
        message: String,
        blocked_until: Option<DateTime<Utc>>,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClinicError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

pub type ClinicResult<T> = Result<T, ClinicError>;
