//! SurrealDB implementation of [`PatientAuthorizationRepository`].

use chrono::{DateTime, Utc};
use clinic_core::error::ClinicResult;
use clinic_core::models::patient_authorization::{
    AccessLevel, AuthorizationDecision, AuthorizationStatus, CreatePatientAuthorization,
    PatientAuthorization,
};
use clinic_core::repository::PatientAuthorizationRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{parse_opt_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuthorizationRow {
    record_id: String,
    patient_id: String,
    source_tenant_id: String,
    target_tenant_id: String,
    access_level: String,
    status: String,
    reason: String,
    consent_given: bool,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    requested_by: String,
    decided_by: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn parse_access_level(s: &str) -> Result<AccessLevel, DbError> {
    match s {
        "Read" => Ok(AccessLevel::Read),
        "Write" => Ok(AccessLevel::Write),
        "Full" => Ok(AccessLevel::Full),
        other => Err(DbError::Decode(format!("unknown access level: {other}"))),
    }
}

fn access_level_to_string(level: AccessLevel) -> &'static str {
    match level {
        AccessLevel::Read => "Read",
        AccessLevel::Write => "Write",
        AccessLevel::Full => "Full",
    }
}

fn parse_status(s: &str) -> Result<AuthorizationStatus, DbError> {
    match s {
        "Pending" => Ok(AuthorizationStatus::Pending),
        "Active" => Ok(AuthorizationStatus::Active),
        "Rejected" => Ok(AuthorizationStatus::Rejected),
        "Revoked" => Ok(AuthorizationStatus::Revoked),
        other => Err(DbError::Decode(format!(
            "unknown authorization status: {other}"
        ))),
    }
}

fn status_to_string(status: AuthorizationStatus) -> &'static str {
    match status {
        AuthorizationStatus::Pending => "Pending",
        AuthorizationStatus::Active => "Active",
        AuthorizationStatus::Rejected => "Rejected",
        AuthorizationStatus::Revoked => "Revoked",
    }
}

impl AuthorizationRow {
    fn try_into_authorization(self) -> Result<PatientAuthorization, DbError> {
        Ok(PatientAuthorization {
            id: parse_uuid(&self.record_id, "authorization")?,
            patient_id: parse_uuid(&self.patient_id, "patient")?,
            source_tenant_id: parse_uuid(&self.source_tenant_id, "source tenant")?,
            target_tenant_id: parse_uuid(&self.target_tenant_id, "target tenant")?,
            access_level: parse_access_level(&self.access_level)?,
            status: parse_status(&self.status)?,
            reason: self.reason,
            consent_given: self.consent_given,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            requested_by: parse_uuid(&self.requested_by, "requester")?,
            decided_by: parse_opt_uuid(self.decided_by, "decider")?,
            decided_at: self.decided_at,
            created_at: self.created_at,
        })
    }
}

fn collect(rows: Vec<AuthorizationRow>) -> ClinicResult<Vec<PatientAuthorization>> {
    Ok(rows
        .into_iter()
        .map(AuthorizationRow::try_into_authorization)
        .collect::<Result<Vec<_>, DbError>>()?)
}

fn first(rows: Vec<AuthorizationRow>, id: String) -> ClinicResult<PatientAuthorization> {
    let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
        entity: "patient_authorization".into(),
        id,
    })?;
    Ok(row.try_into_authorization()?)
}

/// SurrealDB implementation of the cross-tenant authorization repository.
#[derive(Clone)]
pub struct SurrealPatientAuthorizationRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPatientAuthorizationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PatientAuthorizationRepository for SurrealPatientAuthorizationRepository<C> {
    async fn create(&self, input: CreatePatientAuthorization) -> ClinicResult<PatientAuthorization> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('patient_authorization', $id) SET \
                 patient_id = $patient_id, \
                 source_tenant_id = $source_tenant_id, \
                 target_tenant_id = $target_tenant_id, \
                 access_level = $access_level, \
                 status = 'Pending', \
                 reason = $reason, \
                 consent_given = false, \
                 valid_from = $valid_from, valid_until = $valid_until, \
                 requested_by = $requested_by; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('patient_authorization', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("patient_id", input.patient_id.to_string()))
            .bind(("source_tenant_id", input.source_tenant_id.to_string()))
            .bind(("target_tenant_id", input.target_tenant_id.to_string()))
            .bind((
                "access_level",
                access_level_to_string(input.access_level).to_string(),
            ))
            .bind(("reason", input.reason))
            .bind(("valid_from", input.valid_from.unwrap_or_else(Utc::now)))
            .bind(("valid_until", input.valid_until))
            .bind(("requested_by", input.requested_by.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<AuthorizationRow> = result.take(1).map_err(DbError::from)?;
        first(rows, id_str)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> ClinicResult<PatientAuthorization> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('patient_authorization', $id) \
                 WHERE source_tenant_id = $tenant_id \
                 OR target_tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AuthorizationRow> = result.take(0).map_err(DbError::from)?;
        first(rows, id_str)
    }

    async fn decide(
        &self,
        source_tenant_id: Uuid,
        id: Uuid,
        decision: AuthorizationDecision,
    ) -> ClinicResult<PatientAuthorization> {
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "UPDATE type::record('patient_authorization', $id) SET \
                 status = $status, consent_given = $consent_given, \
                 decided_by = $decided_by, decided_at = time::now() \
                 WHERE source_tenant_id = $tenant_id; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('patient_authorization', $id) \
                 WHERE source_tenant_id = $tenant_id;",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", source_tenant_id.to_string()))
            .bind(("status", status_to_string(decision.status).to_string()))
            .bind(("consent_given", decision.consent_given))
            .bind(("decided_by", decision.decided_by.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<AuthorizationRow> = result.take(1).map_err(DbError::from)?;
        first(rows, id_str)
    }

    async fn list_active_for_patient(
        &self,
        target_tenant_id: Uuid,
        patient_id: Uuid,
    ) -> ClinicResult<Vec<PatientAuthorization>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM patient_authorization \
                 WHERE target_tenant_id = $tenant_id \
                 AND patient_id = $patient_id AND status = 'Active'",
            )
            .bind(("tenant_id", target_tenant_id.to_string()))
            .bind(("patient_id", patient_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AuthorizationRow> = result.take(0).map_err(DbError::from)?;
        collect(rows)
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> ClinicResult<Vec<PatientAuthorization>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM patient_authorization \
                 WHERE source_tenant_id = $tenant_id \
                 OR target_tenant_id = $tenant_id \
                 ORDER BY created_at DESC",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AuthorizationRow> = result.take(0).map_err(DbError::from)?;
        collect(rows)
    }
}
