//! SurrealDB implementation of [`TenantRepository`].

use chrono::{DateTime, Utc};
use clinic_core::error::ClinicResult;
use clinic_core::models::tenant::{
    CreateTenant, DEFAULT_MAX_PATIENTS, DEFAULT_MAX_USERS, Tenant, TenantPlan, TenantStatus,
    UpdateTenant,
};
use clinic_core::repository::{PaginatedResult, Pagination, TenantRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, empty_metadata, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TenantRow {
    record_id: String,
    name: String,
    slug: String,
    plan: String,
    status: String,
    max_users: u32,
    max_patients: u32,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub(crate) fn parse_plan(s: &str) -> Result<TenantPlan, DbError> {
    match s {
        "Free" => Ok(TenantPlan::Free),
        "Basic" => Ok(TenantPlan::Basic),
        "Professional" => Ok(TenantPlan::Professional),
        "Enterprise" => Ok(TenantPlan::Enterprise),
        other => Err(DbError::Decode(format!("unknown tenant plan: {other}"))),
    }
}

fn plan_to_string(plan: TenantPlan) -> &'static str {
    match plan {
        TenantPlan::Free => "Free",
        TenantPlan::Basic => "Basic",
        TenantPlan::Professional => "Professional",
        TenantPlan::Enterprise => "Enterprise",
    }
}

fn parse_status(s: &str) -> Result<TenantStatus, DbError> {
    match s {
        "Active" => Ok(TenantStatus::Active),
        "Inactive" => Ok(TenantStatus::Inactive),
        "Suspended" => Ok(TenantStatus::Suspended),
        other => Err(DbError::Decode(format!("unknown tenant status: {other}"))),
    }
}

fn status_to_string(status: TenantStatus) -> &'static str {
    match status {
        TenantStatus::Active => "Active",
        TenantStatus::Inactive => "Inactive",
        TenantStatus::Suspended => "Suspended",
    }
}

impl TenantRow {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        Ok(Tenant {
            id: parse_uuid(&self.record_id, "tenant")?,
            name: self.name,
            slug: self.slug,
            plan: parse_plan(&self.plan)?,
            status: parse_status(&self.status)?,
            max_users: self.max_users,
            max_patients: self.max_patients,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_one(
        &self,
        query: &str,
        key: &'static str,
        value: String,
    ) -> ClinicResult<Tenant> {
        let mut result = self
            .db
            .query(query)
            .bind((key, value.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: format!("{key}={value}"),
        })?;

        Ok(row.try_into_tenant()?)
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> ClinicResult<Tenant> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('tenant', $id) SET \
                 name = $name, slug = $slug, \
                 plan = $plan, status = 'Active', \
                 max_users = $max_users, max_patients = $max_patients, \
                 metadata = $metadata; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('tenant', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("slug", input.slug))
            .bind(("plan", plan_to_string(input.plan).to_string()))
            .bind(("max_users", input.max_users.unwrap_or(DEFAULT_MAX_USERS)))
            .bind((
                "max_patients",
                input.max_patients.unwrap_or(DEFAULT_MAX_PATIENTS),
            ))
            .bind(("metadata", empty_metadata(input.metadata)))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<TenantRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.try_into_tenant()?)
    }

    async fn get_by_id(&self, id: Uuid) -> ClinicResult<Tenant> {
        self.fetch_one(
            "SELECT meta::id(id) AS record_id, * FROM type::record('tenant', $id)",
            "id",
            id.to_string(),
        )
        .await
    }

    async fn get_by_slug(&self, slug: &str) -> ClinicResult<Tenant> {
        self.fetch_one(
            "SELECT meta::id(id) AS record_id, * FROM tenant WHERE slug = $slug",
            "slug",
            slug.to_string(),
        )
        .await
    }

    async fn update(&self, id: Uuid, input: UpdateTenant) -> ClinicResult<Tenant> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.slug.is_some() {
            sets.push("slug = $slug");
        }
        if input.plan.is_some() {
            sets.push("plan = $plan");
        }
        if input.status.is_some() {
            sets.push("status = $status");
        }
        if input.max_users.is_some() {
            sets.push("max_users = $max_users");
        }
        if input.max_patients.is_some() {
            sets.push("max_patients = $max_patients");
        }
        if input.metadata.is_some() {
            sets.push("metadata = $metadata");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('tenant', $id) SET {}; \
             SELECT meta::id(id) AS record_id, * \
             FROM type::record('tenant', $id);",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(slug) = input.slug {
            builder = builder.bind(("slug", slug));
        }
        if let Some(plan) = input.plan {
            builder = builder.bind(("plan", plan_to_string(plan).to_string()));
        }
        if let Some(status) = input.status {
            builder = builder.bind(("status", status_to_string(status).to_string()));
        }
        if let Some(max_users) = input.max_users {
            builder = builder.bind(("max_users", max_users));
        }
        if let Some(max_patients) = input.max_patients {
            builder = builder.bind(("max_patients", max_patients));
        }
        if let Some(metadata) = input.metadata {
            builder = builder.bind(("metadata", metadata));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<TenantRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;

        Ok(row.try_into_tenant()?)
    }

    async fn list(&self, pagination: Pagination) -> ClinicResult<PaginatedResult<Tenant>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM tenant GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM tenant \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(TenantRow::try_into_tenant)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
