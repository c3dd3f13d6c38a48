//! SurrealDB implementation of [`SessionRepository`].

use chrono::{DateTime, Utc};
use clinic_core::error::ClinicResult;
use clinic_core::models::session::{OpenSession, Session};
use clinic_core::repository::SessionRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct SessionRow {
    record_id: String,
    tenant_id: String,
    user_id: String,
    refresh_digest: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = DbError;

    fn try_from(row: SessionRow) -> Result<Self, DbError> {
        Ok(Session {
            id: parse_uuid(&row.record_id, "session")?,
            tenant_id: parse_uuid(&row.tenant_id, "tenant")?,
            user_id: parse_uuid(&row.user_id, "user")?,
            refresh_digest: row.refresh_digest,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct SurrealSessionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSessionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SessionRepository for SurrealSessionRepository<C> {
    async fn create(&self, input: OpenSession) -> ClinicResult<Session> {
        let id = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('session', $id) SET \
                 tenant_id = $tenant_id, \
                 user_id = $user_id, \
                 refresh_digest = $refresh_digest, \
                 ip_address = $ip_address, \
                 user_agent = $user_agent, \
                 expires_at = $expires_at; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('session', $id);",
            )
            .bind(("id", id.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("refresh_digest", input.refresh_digest))
            .bind(("ip_address", input.ip_address))
            .bind(("user_agent", input.user_agent))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<SessionRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id,
        })?;

        Ok(Session::try_from(row)?)
    }

    async fn find_by_refresh_digest(
        &self,
        tenant_id: Uuid,
        refresh_digest: &str,
    ) -> ClinicResult<Session> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM session \
                 WHERE tenant_id = $tenant_id AND refresh_digest = $refresh_digest",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("refresh_digest", refresh_digest.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "session".into(),
            id: "<refresh token>".into(),
        })?;

        Ok(Session::try_from(row)?)
    }

    async fn invalidate(&self, tenant_id: Uuid, id: Uuid) -> ClinicResult<()> {
        self.db
            .query("DELETE type::record('session', $id) WHERE tenant_id = $tenant_id")
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn purge_expired(&self, tenant_id: Uuid, now: DateTime<Utc>) -> ClinicResult<u64> {
        let result = self
            .db
            .query(
                "SELECT count() AS total FROM session \
                 WHERE tenant_id = $tenant_id AND expires_at <= $now GROUP ALL; \
                 DELETE session WHERE tenant_id = $tenant_id AND expires_at <= $now;",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
