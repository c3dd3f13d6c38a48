//! Cross-tenant patient authorizations.
//!
//! The target tenant requests access to a patient of the source tenant;
//! the source tenant approves it (with recorded patient consent),
//! rejects it, or later revokes it. Reads across the tenant boundary
//! only happen through an authorization that is active right now.

use chrono::{DateTime, Utc};
use clinic_core::error::{ClinicError, ClinicResult};
use clinic_core::models::audit::{AuditAction, AuditEntityType, AuditOutcome};
use clinic_core::models::patient::{Patient, UpdatePatient};
use clinic_core::models::patient_authorization::{
    AccessLevel, AuthorizationDecision, AuthorizationStatus, CreatePatientAuthorization,
    PatientAuthorization, SharedOperation,
};
use clinic_core::repository::{
    AuditLogRepository, PatientAuthorizationRepository, PatientRepository,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::Auditor;
use crate::context::RequestContext;

/// Access request filed by the target tenant.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessRequest {
    pub patient_id: Uuid,
    /// Tenant that owns the patient.
    pub source_tenant_id: Uuid,
    pub access_level: AccessLevel,
    pub reason: String,
    pub valid_until: Option<DateTime<Utc>>,
}

pub struct AuthorizationService<Z, P, A>
where
    Z: PatientAuthorizationRepository,
    P: PatientRepository,
    A: AuditLogRepository,
{
    authorization_repo: Z,
    patient_repo: P,
    auditor: Auditor<A>,
}

impl<Z, P, A> AuthorizationService<Z, P, A>
where
    Z: PatientAuthorizationRepository,
    P: PatientRepository,
    A: AuditLogRepository,
{
    pub fn new(authorization_repo: Z, patient_repo: P, audit_repo: A) -> Self {
        Self {
            authorization_repo,
            patient_repo,
            auditor: Auditor::new(audit_repo),
        }
    }

    pub async fn request_access(
        &self,
        ctx: &RequestContext,
        request: AccessRequest,
    ) -> ClinicResult<PatientAuthorization> {
        if request.source_tenant_id == ctx.tenant_id() {
            return Err(ClinicError::Validation {
                message: "patient already belongs to the requesting tenant".into(),
            });
        }
        if request.reason.trim().is_empty() {
            return Err(ClinicError::Validation {
                message: "a reason is required".into(),
            });
        }
        if request.valid_until.is_some_and(|until| until <= Utc::now()) {
            return Err(ClinicError::Validation {
                message: "valid_until must be in the future".into(),
            });
        }

        let authorization = self
            .authorization_repo
            .create(CreatePatientAuthorization {
                patient_id: request.patient_id,
                source_tenant_id: request.source_tenant_id,
                target_tenant_id: ctx.tenant_id(),
                access_level: request.access_level,
                reason: request.reason,
                valid_from: None,
                valid_until: request.valid_until,
                requested_by: ctx.user_id,
            })
            .await?;

        self.auditor
            .success(
                ctx,
                AuditAction::Create,
                AuditEntityType::Authorization,
                authorization.id,
            )
            .await;
        Ok(authorization)
    }

    /// Load an authorization the context's tenant owns as source.
    async fn owned(&self, ctx: &RequestContext, id: Uuid) -> ClinicResult<PatientAuthorization> {
        let authorization = self.authorization_repo.get_by_id(ctx.tenant_id(), id).await?;
        if authorization.source_tenant_id != ctx.tenant_id() {
            return Err(ClinicError::forbidden(
                "only the tenant owning the patient can decide",
            ));
        }
        Ok(authorization)
    }

    fn expect_status(
        authorization: &PatientAuthorization,
        expected: AuthorizationStatus,
    ) -> ClinicResult<()> {
        if authorization.status != expected {
            return Err(ClinicError::Validation {
                message: format!(
                    "authorization is {:?}, expected {:?}",
                    authorization.status, expected
                ),
            });
        }
        Ok(())
    }

    /// Approve a pending request. Patient consent is mandatory.
    pub async fn approve(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        consent_given: bool,
    ) -> ClinicResult<PatientAuthorization> {
        let authorization = self.owned(ctx, id).await?;
        Self::expect_status(&authorization, AuthorizationStatus::Pending)?;
        if !consent_given {
            return Err(ClinicError::Validation {
                message: "patient consent is required".into(),
            });
        }
        // The patient must really belong to the approving tenant.
        self.patient_repo
            .get_by_id(ctx.tenant_id(), authorization.patient_id)
            .await?;

        let approved = self
            .authorization_repo
            .decide(
                ctx.tenant_id(),
                id,
                AuthorizationDecision {
                    status: AuthorizationStatus::Active,
                    consent_given: true,
                    decided_by: ctx.user_id,
                },
            )
            .await?;

        self.auditor
            .success(ctx, AuditAction::Authorize, AuditEntityType::Authorization, id)
            .await;
        info!(
            authorization_id = %id,
            source_tenant = %approved.source_tenant_id,
            target_tenant = %approved.target_tenant_id,
            "Patient authorization approved"
        );
        Ok(approved)
    }

    pub async fn reject(&self, ctx: &RequestContext, id: Uuid) -> ClinicResult<PatientAuthorization> {
        let authorization = self.owned(ctx, id).await?;
        Self::expect_status(&authorization, AuthorizationStatus::Pending)?;

        let rejected = self
            .authorization_repo
            .decide(
                ctx.tenant_id(),
                id,
                AuthorizationDecision {
                    status: AuthorizationStatus::Rejected,
                    consent_given: authorization.consent_given,
                    decided_by: ctx.user_id,
                },
            )
            .await?;

        self.auditor
            .record(
                ctx,
                AuditAction::Authorize,
                AuditEntityType::Authorization,
                Some(id),
                AuditOutcome::Denied,
                Some(serde_json::json!({ "decision": "rejected" })),
            )
            .await;
        Ok(rejected)
    }

    pub async fn revoke(&self, ctx: &RequestContext, id: Uuid) -> ClinicResult<PatientAuthorization> {
        let authorization = self.owned(ctx, id).await?;
        Self::expect_status(&authorization, AuthorizationStatus::Active)?;

        let revoked = self
            .authorization_repo
            .decide(
                ctx.tenant_id(),
                id,
                AuthorizationDecision {
                    status: AuthorizationStatus::Revoked,
                    consent_given: authorization.consent_given,
                    decided_by: ctx.user_id,
                },
            )
            .await?;

        self.auditor
            .success(ctx, AuditAction::Revoke, AuditEntityType::Authorization, id)
            .await;
        info!(authorization_id = %id, "Patient authorization revoked");
        Ok(revoked)
    }

    /// Authorizations where the context's tenant is source or target.
    pub async fn list(&self, ctx: &RequestContext) -> ClinicResult<Vec<PatientAuthorization>> {
        self.authorization_repo.list_for_tenant(ctx.tenant_id()).await
    }

    /// Find an authorization granting `op` on the patient to the
    /// context's tenant right now.
    async fn grant_for(
        &self,
        ctx: &RequestContext,
        patient_id: Uuid,
        op: SharedOperation,
        action: AuditAction,
    ) -> ClinicResult<PatientAuthorization> {
        let now = Utc::now();
        let grant = self
            .authorization_repo
            .list_active_for_patient(ctx.tenant_id(), patient_id)
            .await?
            .into_iter()
            .find(|a| a.is_active_at(now) && a.access_level.permits(op));

        match grant {
            Some(grant) => Ok(grant),
            None => {
                warn!(
                    user_id = %ctx.user_id,
                    tenant_id = %ctx.tenant_id(),
                    patient_id = %patient_id,
                    "Cross-tenant access without authorization"
                );
                self.auditor
                    .denied(
                        ctx,
                        action,
                        AuditEntityType::Patient,
                        patient_id,
                        "no active authorization",
                    )
                    .await;
                Err(ClinicError::forbidden(
                    "no active authorization for this patient",
                ))
            }
        }
    }

    /// Read another tenant's patient through an active authorization.
    pub async fn get_shared_patient(
        &self,
        ctx: &RequestContext,
        patient_id: Uuid,
    ) -> ClinicResult<Patient> {
        let grant = self
            .grant_for(ctx, patient_id, SharedOperation::Read, AuditAction::View)
            .await?;
        let patient = self
            .patient_repo
            .get_by_id(grant.source_tenant_id, patient_id)
            .await?;

        self.auditor
            .record(
                ctx,
                AuditAction::View,
                AuditEntityType::Patient,
                Some(patient_id),
                AuditOutcome::Success,
                Some(serde_json::json!({
                    "source_tenant_id": grant.source_tenant_id,
                    "authorization_id": grant.id,
                })),
            )
            .await;
        Ok(patient)
    }

    /// Update another tenant's patient; requires Write or Full access.
    pub async fn update_shared_patient(
        &self,
        ctx: &RequestContext,
        patient_id: Uuid,
        input: UpdatePatient,
    ) -> ClinicResult<Patient> {
        let grant = self
            .grant_for(ctx, patient_id, SharedOperation::Write, AuditAction::Update)
            .await?;
        let patient = self
            .patient_repo
            .update(grant.source_tenant_id, patient_id, input)
            .await?;

        self.auditor
            .record(
                ctx,
                AuditAction::Update,
                AuditEntityType::Patient,
                Some(patient_id),
                AuditOutcome::Success,
                Some(serde_json::json!({
                    "source_tenant_id": grant.source_tenant_id,
                    "authorization_id": grant.id,
                })),
            )
            .await;
        Ok(patient)
    }
}
