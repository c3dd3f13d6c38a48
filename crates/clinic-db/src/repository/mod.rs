//! SurrealDB repository implementations.

mod audit;
mod patient;
mod patient_authorization;
mod session;
mod tenant;
mod tenant_link;
mod user;
mod user_settings;

pub use audit::SurrealAuditLogRepository;
pub use patient::SurrealPatientRepository;
pub use patient_authorization::SurrealPatientAuthorizationRepository;
pub use session::SurrealSessionRepository;
pub use tenant::SurrealTenantRepository;
pub use tenant_link::SurrealUserTenantLinkRepository;
pub use user::{SurrealUserRepository, verify_password};
pub use user_settings::SurrealUserSettingsRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for `count() ... GROUP ALL` queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

fn parse_opt_uuid(raw: Option<String>, what: &str) -> Result<Option<Uuid>, DbError> {
    raw.as_deref().map(|s| parse_uuid(s, what)).transpose()
}

fn empty_metadata(metadata: Option<serde_json::Value>) -> serde_json::Value {
    metadata.unwrap_or(serde_json::Value::Object(Default::default()))
}
