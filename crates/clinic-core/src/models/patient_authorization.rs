//! Cross-tenant patient authorization model.
//!
//! The only sanctioned way for one tenant to read another tenant's
//! patient. The source tenant owns the patient; the target tenant is the
//! one being granted access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessLevel {
    /// Read only.
    Read,
    /// Read and write.
    Write,
    /// Read, write and delete.
    Full,
}

/// Operation attempted through an authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedOperation {
    Read,
    Write,
    Delete,
}

impl AccessLevel {
    pub fn permits(self, op: SharedOperation) -> bool {
        match op {
            SharedOperation::Read => true,
            SharedOperation::Write => matches!(self, AccessLevel::Write | AccessLevel::Full),
            SharedOperation::Delete => self == AccessLevel::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthorizationStatus {
    Pending,
    Active,
    Rejected,
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientAuthorization {
    pub id: Uuid,
    pub patient_id: Uuid,
    /// Tenant owning the patient record.
    pub source_tenant_id: Uuid,
    /// Tenant receiving access.
    pub target_tenant_id: Uuid,
    pub access_level: AccessLevel,
    pub status: AuthorizationStatus,
    pub reason: String,
    /// Patient consent recorded (required before approval).
    pub consent_given: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub requested_by: Uuid,
    pub decided_by: Option<Uuid>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PatientAuthorization {
    /// Active status and inside the validity window.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == AuthorizationStatus::Active
            && self.valid_from <= now
            && self.valid_until.is_none_or(|until| now <= until)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientAuthorization {
    pub patient_id: Uuid,
    pub source_tenant_id: Uuid,
    pub target_tenant_id: Uuid,
    pub access_level: AccessLevel,
    pub reason: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub requested_by: Uuid,
}

/// A status transition decided by the source tenant.
#[derive(Debug, Clone)]
pub struct AuthorizationDecision {
    pub status: AuthorizationStatus,
    pub consent_given: bool,
    pub decided_by: Uuid,
}
