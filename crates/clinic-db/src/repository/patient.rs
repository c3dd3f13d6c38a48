//! SurrealDB implementation of [`PatientRepository`].
//!
//! Every statement carries `tenant_id = $tenant_id`; a record owned by
//! another tenant is indistinguishable from a missing one.

use chrono::{DateTime, Utc};
use clinic_core::error::ClinicResult;
use clinic_core::models::patient::{CreatePatient, Patient, UpdatePatient};
use clinic_core::repository::{PaginatedResult, Pagination, PatientRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, empty_metadata, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct PatientRow {
    record_id: String,
    tenant_id: String,
    full_name: String,
    email: Option<String>,
    phone: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PatientRow {
    fn try_into_patient(self) -> Result<Patient, DbError> {
        Ok(Patient {
            id: parse_uuid(&self.record_id, "patient")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            full_name: self.full_name,
            email: self.email,
            phone: self.phone,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn first_patient(rows: Vec<PatientRow>, id: String) -> ClinicResult<Patient> {
    let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
        entity: "patient".into(),
        id,
    })?;
    Ok(row.try_into_patient()?)
}

/// SurrealDB implementation of the Patient repository.
#[derive(Clone)]
pub struct SurrealPatientRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPatientRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> PatientRepository for SurrealPatientRepository<C> {
    async fn create(&self, input: CreatePatient) -> ClinicResult<Patient> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('patient', $id) SET \
                 tenant_id = $tenant_id, full_name = $full_name, \
                 email = $email, phone = $phone, metadata = $metadata; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('patient', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("full_name", input.full_name))
            .bind(("email", input.email))
            .bind(("phone", input.phone))
            .bind(("metadata", empty_metadata(input.metadata)))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<PatientRow> = result.take(1).map_err(DbError::from)?;
        first_patient(rows, id_str)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> ClinicResult<Patient> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('patient', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PatientRow> = result.take(0).map_err(DbError::from)?;
        first_patient(rows, id_str)
    }

    async fn update(&self, tenant_id: Uuid, id: Uuid, input: UpdatePatient) -> ClinicResult<Patient> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.full_name.is_some() {
            sets.push("full_name = $full_name");
        }
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.phone.is_some() {
            sets.push("phone = $phone");
        }
        if input.metadata.is_some() {
            sets.push("metadata = $metadata");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('patient', $id) SET {} \
             WHERE tenant_id = $tenant_id; \
             SELECT meta::id(id) AS record_id, * \
             FROM type::record('patient', $id) \
             WHERE tenant_id = $tenant_id;",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()));

        if let Some(full_name) = input.full_name {
            builder = builder.bind(("full_name", full_name));
        }
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(phone) = input.phone {
            builder = builder.bind(("phone", phone));
        }
        if let Some(metadata) = input.metadata {
            builder = builder.bind(("metadata", metadata));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<PatientRow> = result.take(1).map_err(DbError::from)?;
        first_patient(rows, id_str)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> ClinicResult<()> {
        // Surface NotFound for foreign or missing records.
        self.get_by_id(tenant_id, id).await?;

        self.db
            .query(
                "DELETE type::record('patient', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> ClinicResult<PaginatedResult<Patient>> {
        let total = self.count(tenant_id).await?;

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM patient \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PatientRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(PatientRow::try_into_patient)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn count(&self, tenant_id: Uuid) -> ClinicResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM patient \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
