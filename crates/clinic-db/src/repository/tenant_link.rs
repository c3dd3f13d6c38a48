//! SurrealDB implementation of [`UserTenantLinkRepository`].

use chrono::{DateTime, Utc};
use clinic_core::error::ClinicResult;
use clinic_core::models::tenant_link::{CreateUserTenantLink, LinkStatus, UserTenantLink};
use clinic_core::repository::UserTenantLinkRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct LinkRow {
    record_id: String,
    user_id: String,
    tenant_id: String,
    status: String,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, SurrealValue)]
struct RevokedRow {
    #[allow(dead_code)]
    record_id: String,
}

fn parse_status(s: &str) -> Result<LinkStatus, DbError> {
    match s {
        "Active" => Ok(LinkStatus::Active),
        "Revoked" => Ok(LinkStatus::Revoked),
        other => Err(DbError::Decode(format!("unknown link status: {other}"))),
    }
}

impl LinkRow {
    fn try_into_link(self) -> Result<UserTenantLink, DbError> {
        Ok(UserTenantLink {
            id: parse_uuid(&self.record_id, "link")?,
            user_id: parse_uuid(&self.user_id, "user")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            status: parse_status(&self.status)?,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            created_at: self.created_at,
            revoked_at: self.revoked_at,
        })
    }
}

/// SurrealDB implementation of the user/tenant link repository.
#[derive(Clone)]
pub struct SurrealUserTenantLinkRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserTenantLinkRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserTenantLinkRepository for SurrealUserTenantLinkRepository<C> {
    async fn create(&self, input: CreateUserTenantLink) -> ClinicResult<UserTenantLink> {
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('user_tenant_link', $id) SET \
                 user_id = $user_id, tenant_id = $tenant_id, \
                 status = 'Active', \
                 valid_from = $valid_from, valid_until = $valid_until; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('user_tenant_link', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("valid_from", input.valid_from.unwrap_or_else(Utc::now)))
            .bind(("valid_until", input.valid_until))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<LinkRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user_tenant_link".into(),
            id: id_str,
        })?;

        Ok(row.try_into_link()?)
    }

    async fn list_for_user(&self, user_id: Uuid) -> ClinicResult<Vec<UserTenantLink>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user_tenant_link \
                 WHERE user_id = $user_id ORDER BY created_at ASC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<LinkRow> = result.take(0).map_err(DbError::from)?;
        let links = rows
            .into_iter()
            .map(LinkRow::try_into_link)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(links)
    }

    async fn revoke(&self, user_id: Uuid, tenant_id: Uuid) -> ClinicResult<()> {
        let result = self
            .db
            .query(
                "UPDATE user_tenant_link SET \
                 status = 'Revoked', revoked_at = time::now() \
                 WHERE user_id = $user_id AND tenant_id = $tenant_id \
                 AND status = 'Active' \
                 RETURN meta::id(id) AS record_id",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| DbError::Query(e.to_string()))?;
        let revoked: Vec<RevokedRow> = result.take(0).map_err(DbError::from)?;
        if revoked.is_empty() {
            return Err(DbError::NotFound {
                entity: "user_tenant_link".into(),
                id: format!("{user_id}/{tenant_id}"),
            }
            .into());
        }

        Ok(())
    }
}
