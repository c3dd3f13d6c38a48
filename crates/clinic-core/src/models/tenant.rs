//! Tenant domain model.
//!
//! A tenant is one clinic. All domain entities (users, patients,
//! authorizations, audit entries) are scoped to a tenant and must never
//! be visible to another one.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ClinicError, ClinicResult};

/// Default user ceiling when a tenant is created without one.
pub const DEFAULT_MAX_USERS: u32 = 5;
/// Default patient ceiling when a tenant is created without one.
pub const DEFAULT_MAX_PATIENTS: u32 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TenantPlan {
    Free,
    Basic,
    Professional,
    Enterprise,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TenantStatus {
    Active,
    Inactive,
    Suspended,
}

/// Resources counted against a tenant's plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuotaResource {
    Users,
    Patients,
}

impl fmt::Display for QuotaResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaResource::Users => f.write_str("users"),
            QuotaResource::Patients => f.write_str("patients"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Human-readable clinic name.
    pub name: String,
    /// URL-safe globally unique identifier (e.g., `clinica-centro`).
    pub slug: String,
    pub plan: TenantPlan,
    pub status: TenantStatus,
    pub max_users: u32,
    pub max_patients: u32,
    /// Arbitrary key-value metadata.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Plan ceiling for the given resource.
    pub fn limit_for(&self, resource: QuotaResource) -> u32 {
        match resource {
            QuotaResource::Users => self.max_users,
            QuotaResource::Patients => self.max_patients,
        }
    }

    /// Fails with [`ClinicError::QuotaExceeded`] when `current_count`
    /// already reached the plan ceiling, i.e. one more record would not
    /// fit.
    pub fn ensure_capacity(&self, resource: QuotaResource, current_count: u64) -> ClinicResult<()> {
        let limit = self.limit_for(resource);
        if current_count >= u64::from(limit) {
            return Err(ClinicError::QuotaExceeded { resource, limit });
        }
        Ok(())
    }
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub slug: String,
    pub plan: TenantPlan,
    /// Defaults to [`DEFAULT_MAX_USERS`].
    pub max_users: Option<u32>,
    /// Defaults to [`DEFAULT_MAX_PATIENTS`].
    pub max_patients: Option<u32>,
    pub metadata: Option<serde_json::Value>,
}

/// Fields that can be updated on an existing tenant.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub plan: Option<TenantPlan>,
    pub status: Option<TenantStatus>,
    pub max_users: Option<u32>,
    pub max_patients: Option<u32>,
    pub metadata: Option<serde_json::Value>,
}
