//! User ↔ tenant access links.
//!
//! A link grants a user access to a tenant other than their primary one
//! (e.g. a secretary working for several clinics).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LinkStatus {
    Active,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTenantLink {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub status: LinkStatus,
    pub valid_from: DateTime<Utc>,
    /// `None` means the link never expires.
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl UserTenantLink {
    /// Whether the link grants access at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == LinkStatus::Active
            && self.valid_from <= now
            && self.valid_until.is_none_or(|until| now <= until)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserTenantLink {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    /// Defaults to the creation time.
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}
