//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-scoped repositories
//! require a `tenant_id` parameter on every read and write; it is
//! applied as a mandatory predicate by the implementations.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ClinicResult;
use crate::models::{
    audit::{AuditAction, AuditLogEntry, CreateAuditLogEntry},
    patient::{CreatePatient, Patient, UpdatePatient},
    patient_authorization::{
        AuthorizationDecision, CreatePatientAuthorization, PatientAuthorization,
    },
    session::{OpenSession, Session},
    tenant::{CreateTenant, Tenant, UpdateTenant},
    tenant_link::{CreateUserTenantLink, UserTenantLink},
    user::{CreateUser, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenants (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = ClinicResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = ClinicResult<Tenant>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = ClinicResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = ClinicResult<Tenant>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = ClinicResult<PaginatedResult<Tenant>>> + Send;
}

// ---------------------------------------------------------------------------
// Users and tenant access
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = ClinicResult<User>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = ClinicResult<User>> + Send;
    /// Look up a user by username or email across all tenants.
    ///
    /// The only unscoped user query; reserved for authentication, where
    /// the tenant is not known yet.
    fn find_for_login(
        &self,
        username_or_email: &str,
    ) -> impl Future<Output = ClinicResult<User>> + Send;
    /// Look up a user by id without a tenant predicate. Used to find the
    /// primary tenant before any tenant context exists.
    fn get_identity(&self, id: Uuid) -> impl Future<Output = ClinicResult<User>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = ClinicResult<User>> + Send;
    /// Soft-delete: sets status to Inactive.
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = ClinicResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = ClinicResult<PaginatedResult<User>>> + Send;
    /// Users counted against the tenant's plan (all but Inactive).
    fn count(&self, tenant_id: Uuid) -> impl Future<Output = ClinicResult<u64>> + Send;
}

pub trait UserTenantLinkRepository: Send + Sync {
    fn create(
        &self,
        input: CreateUserTenantLink,
    ) -> impl Future<Output = ClinicResult<UserTenantLink>> + Send;
    /// All links of a user, in any status.
    fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = ClinicResult<Vec<UserTenantLink>>> + Send;
    /// Mark every active link between the user and the tenant as revoked.
    /// Fails with `NotFound` when there is none.
    fn revoke(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> impl Future<Output = ClinicResult<()>> + Send;
}

/// Per-user persisted preferences (currently only the active tenant).
pub trait UserSettingsRepository: Send + Sync {
    fn get_active_tenant(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = ClinicResult<Option<Uuid>>> + Send;
    /// Upsert the active tenant selection.
    fn set_active_tenant(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
    ) -> impl Future<Output = ClinicResult<()>> + Send;
}

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: OpenSession) -> impl Future<Output = ClinicResult<Session>> + Send;
    fn find_by_refresh_digest(
        &self,
        tenant_id: Uuid,
        refresh_digest: &str,
    ) -> impl Future<Output = ClinicResult<Session>> + Send;
    /// Delete a single session. Deleting a missing session is not an error.
    fn invalidate(&self, tenant_id: Uuid, id: Uuid)
    -> impl Future<Output = ClinicResult<()>> + Send;
    /// Delete sessions of the tenant that expired at or before `now`.
    fn purge_expired(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> impl Future<Output = ClinicResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Clinical records (tenant-scoped)
// ---------------------------------------------------------------------------

pub trait PatientRepository: Send + Sync {
    fn create(&self, input: CreatePatient) -> impl Future<Output = ClinicResult<Patient>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = ClinicResult<Patient>> + Send;
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdatePatient,
    ) -> impl Future<Output = ClinicResult<Patient>> + Send;
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = ClinicResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = ClinicResult<PaginatedResult<Patient>>> + Send;
    fn count(&self, tenant_id: Uuid) -> impl Future<Output = ClinicResult<u64>> + Send;
}

pub trait PatientAuthorizationRepository: Send + Sync {
    fn create(
        &self,
        input: CreatePatientAuthorization,
    ) -> impl Future<Output = ClinicResult<PatientAuthorization>> + Send;
    /// Fetch an authorization visible to `tenant_id` (as source or target).
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = ClinicResult<PatientAuthorization>> + Send;
    /// Apply a decision. Only the source tenant may decide.
    fn decide(
        &self,
        source_tenant_id: Uuid,
        id: Uuid,
        decision: AuthorizationDecision,
    ) -> impl Future<Output = ClinicResult<PatientAuthorization>> + Send;
    /// Authorizations in Active status granting `target_tenant_id` access
    /// to `patient_id`. Validity windows are checked by the caller.
    fn list_active_for_patient(
        &self,
        target_tenant_id: Uuid,
        patient_id: Uuid,
    ) -> impl Future<Output = ClinicResult<Vec<PatientAuthorization>>> + Send;
    /// Authorizations where the tenant is source or target.
    fn list_for_tenant(
        &self,
        tenant_id: Uuid,
    ) -> impl Future<Output = ClinicResult<Vec<PatientAuthorization>>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only, tenant-scoped)
// ---------------------------------------------------------------------------

/// Query filters for audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub entity_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new audit log entry. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = ClinicResult<AuditLogEntry>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = ClinicResult<PaginatedResult<AuditLogEntry>>> + Send;
}
