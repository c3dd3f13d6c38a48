//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! The table is append-only: it defines no update or delete permissions
//! and this repository exposes neither.

use chrono::{DateTime, Utc};
use clinic_core::error::ClinicResult;
use clinic_core::models::audit::{
    AuditAction, AuditEntityType, AuditLogEntry, AuditOutcome, CreateAuditLogEntry,
};
use clinic_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, empty_metadata, parse_opt_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditRow {
    record_id: String,
    tenant_id: String,
    actor_id: Option<String>,
    action: String,
    entity_type: String,
    entity_id: Option<String>,
    outcome: String,
    ip_address: Option<String>,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

fn action_to_string(action: AuditAction) -> &'static str {
    match action {
        AuditAction::Create => "Create",
        AuditAction::Update => "Update",
        AuditAction::Delete => "Delete",
        AuditAction::View => "View",
        AuditAction::Export => "Export",
        AuditAction::Login => "Login",
        AuditAction::Logout => "Logout",
        AuditAction::Authorize => "Authorize",
        AuditAction::Revoke => "Revoke",
    }
}

fn parse_action(s: &str) -> Result<AuditAction, DbError> {
    match s {
        "Create" => Ok(AuditAction::Create),
        "Update" => Ok(AuditAction::Update),
        "Delete" => Ok(AuditAction::Delete),
        "View" => Ok(AuditAction::View),
        "Export" => Ok(AuditAction::Export),
        "Login" => Ok(AuditAction::Login),
        "Logout" => Ok(AuditAction::Logout),
        "Authorize" => Ok(AuditAction::Authorize),
        "Revoke" => Ok(AuditAction::Revoke),
        other => Err(DbError::Decode(format!("unknown audit action: {other}"))),
    }
}

fn entity_type_to_string(entity: AuditEntityType) -> &'static str {
    match entity {
        AuditEntityType::Patient => "Patient",
        AuditEntityType::User => "User",
        AuditEntityType::Tenant => "Tenant",
        AuditEntityType::Authorization => "Authorization",
        AuditEntityType::Session => "Session",
    }
}

fn parse_entity_type(s: &str) -> Result<AuditEntityType, DbError> {
    match s {
        "Patient" => Ok(AuditEntityType::Patient),
        "User" => Ok(AuditEntityType::User),
        "Tenant" => Ok(AuditEntityType::Tenant),
        "Authorization" => Ok(AuditEntityType::Authorization),
        "Session" => Ok(AuditEntityType::Session),
        other => Err(DbError::Decode(format!("unknown audit entity: {other}"))),
    }
}

fn outcome_to_string(outcome: AuditOutcome) -> &'static str {
    match outcome {
        AuditOutcome::Success => "Success",
        AuditOutcome::Failure => "Failure",
        AuditOutcome::Denied => "Denied",
    }
}

fn parse_outcome(s: &str) -> Result<AuditOutcome, DbError> {
    match s {
        "Success" => Ok(AuditOutcome::Success),
        "Failure" => Ok(AuditOutcome::Failure),
        "Denied" => Ok(AuditOutcome::Denied),
        other => Err(DbError::Decode(format!("unknown audit outcome: {other}"))),
    }
}

impl AuditRow {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        Ok(AuditLogEntry {
            id: parse_uuid(&self.record_id, "audit entry")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            actor_id: parse_opt_uuid(self.actor_id, "actor")?,
            action: parse_action(&self.action)?,
            entity_type: parse_entity_type(&self.entity_type)?,
            entity_id: parse_opt_uuid(self.entity_id, "entity")?,
            outcome: parse_outcome(&self.outcome)?,
            ip_address: self.ip_address,
            metadata: self.metadata,
            timestamp: self.timestamp,
        })
    }
}

/// SurrealDB implementation of the audit log repository.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> ClinicResult<AuditLogEntry> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 tenant_id = $tenant_id, actor_id = $actor_id, \
                 action = $action, entity_type = $entity_type, \
                 entity_id = $entity_id, outcome = $outcome, \
                 ip_address = $ip_address, metadata = $metadata; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('audit_log', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("actor_id", input.actor_id.map(|id| id.to_string())))
            .bind(("action", action_to_string(input.action).to_string()))
            .bind((
                "entity_type",
                entity_type_to_string(input.entity_type).to_string(),
            ))
            .bind(("entity_id", input.entity_id.map(|id| id.to_string())))
            .bind(("outcome", outcome_to_string(input.outcome).to_string()))
            .bind(("ip_address", input.ip_address))
            .bind(("metadata", empty_metadata(input.metadata)))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<AuditRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log".into(),
            id: id_str,
        })?;

        Ok(row.try_into_entry()?)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> ClinicResult<PaginatedResult<AuditLogEntry>> {
        let mut conditions = vec!["tenant_id = $tenant_id"];
        if filter.actor_id.is_some() {
            conditions.push("actor_id = $actor_id");
        }
        if filter.action.is_some() {
            conditions.push("action = $action");
        }
        if filter.entity_id.is_some() {
            conditions.push("entity_id = $entity_id");
        }
        if filter.from.is_some() {
            conditions.push("timestamp >= $from");
        }
        if filter.to.is_some() {
            conditions.push("timestamp <= $to");
        }
        let where_clause = conditions.join(" AND ");

        let query = format!(
            "SELECT count() AS total FROM audit_log WHERE {where_clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM audit_log \
             WHERE {where_clause} \
             ORDER BY timestamp DESC \
             LIMIT $limit START $offset;"
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));

        if let Some(actor_id) = filter.actor_id {
            builder = builder.bind(("actor_id", actor_id.to_string()));
        }
        if let Some(action) = filter.action {
            builder = builder.bind(("action", action_to_string(action).to_string()));
        }
        if let Some(entity_id) = filter.entity_id {
            builder = builder.bind(("entity_id", entity_id.to_string()));
        }
        if let Some(from) = filter.from {
            builder = builder.bind(("from", from));
        }
        if let Some(to) = filter.to {
            builder = builder.bind(("to", to));
        }

        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let rows: Vec<AuditRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(AuditRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
