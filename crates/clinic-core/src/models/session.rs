//! Login sessions.
//!
//! A session is opened by a successful login in the user's primary tenant
//! and is the target of logout. It also backs the opaque refresh token:
//! only the token's SHA-256 digest is stored, and each refresh replaces
//! the session with a new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// Primary tenant of the user at login.
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    /// Hex SHA-256 of the refresh token.
    pub refresh_digest: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Clone)]
pub struct OpenSession {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub refresh_digest: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
}
