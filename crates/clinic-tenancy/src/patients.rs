//! Tenant-scoped patient access.
//!
//! Every call takes the acting tenant from the [`RequestContext`]; the
//! repository applies it as a mandatory predicate, so rows of other
//! tenants surface as `NotFound`.

use chrono::{DateTime, Utc};
use clinic_core::error::{ClinicError, ClinicResult};
use clinic_core::models::audit::{AuditAction, AuditEntityType};
use clinic_core::models::patient::{CreatePatient, Patient, UpdatePatient};
use clinic_core::models::tenant::QuotaResource;
use clinic_core::repository::{
    AuditLogRepository, PaginatedResult, Pagination, PatientRepository, TenantRepository,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::Auditor;
use crate::context::RequestContext;

/// A patient record packaged for export.
#[derive(Debug, Clone, Serialize)]
pub struct PatientExport {
    pub tenant_id: Uuid,
    pub exported_by: Uuid,
    pub exported_at: DateTime<Utc>,
    pub patient: Patient,
}

pub struct PatientService<P, T, A>
where
    P: PatientRepository,
    T: TenantRepository,
    A: AuditLogRepository,
{
    patient_repo: P,
    tenant_repo: T,
    auditor: Auditor<A>,
}

impl<P, T, A> PatientService<P, T, A>
where
    P: PatientRepository,
    T: TenantRepository,
    A: AuditLogRepository,
{
    pub fn new(patient_repo: P, tenant_repo: T, audit_repo: A) -> Self {
        Self {
            patient_repo,
            tenant_repo,
            auditor: Auditor::new(audit_repo),
        }
    }

    pub async fn create(&self, ctx: &RequestContext, input: CreatePatient) -> ClinicResult<Patient> {
        if input.tenant_id != ctx.tenant_id() {
            warn!(
                user_id = %ctx.user_id,
                tenant_id = %ctx.tenant_id(),
                requested_tenant = %input.tenant_id,
                "Patient create aimed at another tenant"
            );
            return Err(ClinicError::forbidden(
                "cannot create records for another tenant",
            ));
        }
        if input.full_name.trim().is_empty() {
            return Err(ClinicError::Validation {
                message: "full_name is required".into(),
            });
        }

        // Fresh read: the plan may have changed since the context was built.
        let tenant = self.tenant_repo.get_by_id(ctx.tenant_id()).await?;
        let current = self.patient_repo.count(tenant.id).await?;
        tenant.ensure_capacity(QuotaResource::Patients, current)?;

        let patient = self.patient_repo.create(input).await?;
        self.auditor
            .success(ctx, AuditAction::Create, AuditEntityType::Patient, patient.id)
            .await;
        info!(tenant_id = %patient.tenant_id, patient_id = %patient.id, "Patient created");
        Ok(patient)
    }

    pub async fn get(&self, ctx: &RequestContext, id: Uuid) -> ClinicResult<Patient> {
        let patient = self.patient_repo.get_by_id(ctx.tenant_id(), id).await?;
        self.auditor
            .success(ctx, AuditAction::View, AuditEntityType::Patient, id)
            .await;
        Ok(patient)
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        pagination: Pagination,
    ) -> ClinicResult<PaginatedResult<Patient>> {
        self.patient_repo.list(ctx.tenant_id(), pagination).await
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        input: UpdatePatient,
    ) -> ClinicResult<Patient> {
        if input.full_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ClinicError::Validation {
                message: "full_name cannot be empty".into(),
            });
        }
        let patient = self.patient_repo.update(ctx.tenant_id(), id, input).await?;
        self.auditor
            .success(ctx, AuditAction::Update, AuditEntityType::Patient, id)
            .await;
        Ok(patient)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> ClinicResult<()> {
        self.patient_repo.delete(ctx.tenant_id(), id).await?;
        self.auditor
            .success(ctx, AuditAction::Delete, AuditEntityType::Patient, id)
            .await;
        info!(tenant_id = %ctx.tenant_id(), patient_id = %id, "Patient deleted");
        Ok(())
    }

    pub async fn export(&self, ctx: &RequestContext, id: Uuid) -> ClinicResult<PatientExport> {
        let patient = self.patient_repo.get_by_id(ctx.tenant_id(), id).await?;
        self.auditor
            .success(ctx, AuditAction::Export, AuditEntityType::Patient, id)
            .await;
        Ok(PatientExport {
            tenant_id: ctx.tenant_id(),
            exported_by: ctx.user_id,
            exported_at: Utc::now(),
            patient,
        })
    }

    pub fn auditor(&self) -> &Auditor<A> {
        &self.auditor
    }
}
