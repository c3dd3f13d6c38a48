//! SurrealDB implementation of [`UserSettingsRepository`].
//!
//! One `user_setting` record per user, keyed by the user id.

use clinic_core::error::ClinicResult;
use clinic_core::repository::UserSettingsRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct SettingRow {
    active_tenant_id: String,
}

#[derive(Clone)]
pub struct SurrealUserSettingsRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserSettingsRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserSettingsRepository for SurrealUserSettingsRepository<C> {
    async fn get_active_tenant(&self, user_id: Uuid) -> ClinicResult<Option<Uuid>> {
        let mut result = self
            .db
            .query("SELECT active_tenant_id FROM type::record('user_setting', $user_id)")
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SettingRow> = result.take(0).map_err(DbError::from)?;
        let tenant_id = rows
            .into_iter()
            .next()
            .map(|row| parse_uuid(&row.active_tenant_id, "tenant"))
            .transpose()?;

        Ok(tenant_id)
    }

    async fn set_active_tenant(&self, user_id: Uuid, tenant_id: Uuid) -> ClinicResult<()> {
        self.db
            .query(
                "UPSERT type::record('user_setting', $user_id) SET \
                 active_tenant_id = $tenant_id, updated_at = time::now()",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }
}
