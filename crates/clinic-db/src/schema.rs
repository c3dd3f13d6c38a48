//! Schema definitions and migration runner for SurrealDB.
//!
//! All tables are SCHEMAFULL. UUIDs are stored as strings; enums are
//! stored as strings guarded by ASSERT constraints.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "tenancy",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "clinical_records",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: tenants, users, tenant access, sessions, audit
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global scope)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD slug ON TABLE tenant TYPE string;
DEFINE FIELD plan ON TABLE tenant TYPE string \
    ASSERT $value IN ['Free', 'Basic', 'Professional', 'Enterprise'];
DEFINE FIELD status ON TABLE tenant TYPE string \
    ASSERT $value IN ['Active', 'Inactive', 'Suspended'];
DEFINE FIELD max_users ON TABLE tenant TYPE int;
DEFINE FIELD max_patients ON TABLE tenant TYPE int;
DEFINE FIELD metadata ON TABLE tenant TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_slug ON TABLE tenant COLUMNS slug UNIQUE;

-- =======================================================================
-- Users (primary tenant scope)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE user TYPE string;
DEFINE FIELD username ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD status ON TABLE user TYPE string \
    ASSERT $value IN ['Active', 'Inactive', 'Locked', \
    'PendingVerification'];
DEFINE FIELD metadata ON TABLE user TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_username ON TABLE user COLUMNS username UNIQUE;
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;
DEFINE INDEX idx_user_tenant ON TABLE user COLUMNS tenant_id;

-- =======================================================================
-- User -> tenant access links
-- =======================================================================
DEFINE TABLE user_tenant_link SCHEMAFULL;
DEFINE FIELD user_id ON TABLE user_tenant_link TYPE string;
DEFINE FIELD tenant_id ON TABLE user_tenant_link TYPE string;
DEFINE FIELD status ON TABLE user_tenant_link TYPE string \
    ASSERT $value IN ['Active', 'Revoked'];
DEFINE FIELD valid_from ON TABLE user_tenant_link TYPE datetime;
DEFINE FIELD valid_until ON TABLE user_tenant_link TYPE option<datetime>;
DEFINE FIELD revoked_at ON TABLE user_tenant_link TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE user_tenant_link TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_link_user ON TABLE user_tenant_link COLUMNS user_id;

-- =======================================================================
-- Per-user settings (record id = user id)
-- =======================================================================
DEFINE TABLE user_setting SCHEMAFULL;
DEFINE FIELD active_tenant_id ON TABLE user_setting TYPE string;
DEFINE FIELD updated_at ON TABLE user_setting TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Sessions (tenant scope)
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE session TYPE string;
DEFINE FIELD user_id ON TABLE session TYPE string;
DEFINE FIELD refresh_digest ON TABLE session TYPE string;
DEFINE FIELD ip_address ON TABLE session TYPE option<string>;
DEFINE FIELD user_agent ON TABLE session TYPE option<string>;
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE FIELD created_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_session_refresh ON TABLE session \
    COLUMNS tenant_id, refresh_digest UNIQUE;
DEFINE INDEX idx_session_expiry ON TABLE session \
    COLUMNS tenant_id, expires_at;

-- =======================================================================
-- Audit log (append-only, tenant scope)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD tenant_id ON TABLE audit_log TYPE string;
DEFINE FIELD actor_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD action ON TABLE audit_log TYPE string \
    ASSERT $value IN ['Create', 'Update', 'Delete', 'View', 'Export', \
    'Login', 'Logout', 'Authorize', 'Revoke'];
DEFINE FIELD entity_type ON TABLE audit_log TYPE string \
    ASSERT $value IN ['Patient', 'User', 'Tenant', 'Authorization', \
    'Session'];
DEFINE FIELD entity_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD outcome ON TABLE audit_log TYPE string \
    ASSERT $value IN ['Success', 'Failure', 'Denied'];
DEFINE FIELD ip_address ON TABLE audit_log TYPE option<string>;
DEFINE FIELD metadata ON TABLE audit_log TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_tenant_time ON TABLE audit_log \
    COLUMNS tenant_id, timestamp;
";

// -----------------------------------------------------------------------
// Schema v2: patients and cross-tenant authorizations
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
DEFINE TABLE patient SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE patient TYPE string;
DEFINE FIELD full_name ON TABLE patient TYPE string;
DEFINE FIELD email ON TABLE patient TYPE option<string>;
DEFINE FIELD phone ON TABLE patient TYPE option<string>;
DEFINE FIELD metadata ON TABLE patient TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE patient TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE patient TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_patient_tenant ON TABLE patient COLUMNS tenant_id;

DEFINE TABLE patient_authorization SCHEMAFULL;
DEFINE FIELD patient_id ON TABLE patient_authorization TYPE string;
DEFINE FIELD source_tenant_id ON TABLE patient_authorization TYPE string;
DEFINE FIELD target_tenant_id ON TABLE patient_authorization TYPE string;
DEFINE FIELD access_level ON TABLE patient_authorization TYPE string \
    ASSERT $value IN ['Read', 'Write', 'Full'];
DEFINE FIELD status ON TABLE patient_authorization TYPE string \
    ASSERT $value IN ['Pending', 'Active', 'Rejected', 'Revoked'];
DEFINE FIELD reason ON TABLE patient_authorization TYPE string;
DEFINE FIELD consent_given ON TABLE patient_authorization TYPE bool \
    DEFAULT false;
DEFINE FIELD valid_from ON TABLE patient_authorization TYPE datetime;
DEFINE FIELD valid_until ON TABLE patient_authorization \
    TYPE option<datetime>;
DEFINE FIELD requested_by ON TABLE patient_authorization TYPE string;
DEFINE FIELD decided_by ON TABLE patient_authorization TYPE option<string>;
DEFINE FIELD decided_at ON TABLE patient_authorization \
    TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE patient_authorization TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_pauth_target_patient ON TABLE patient_authorization \
    COLUMNS target_tenant_id, patient_id;
DEFINE INDEX idx_pauth_source ON TABLE patient_authorization \
    COLUMNS source_tenant_id;
";

/// Apply every pending migration in version order.
///
/// Safe to call on every startup; already-applied versions are skipped.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "Migration v{} '{}' failed: {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn every_tenant_scoped_table_has_tenant_field() {
        for table in ["user", "session", "audit_log"] {
            let needle = format!("DEFINE FIELD tenant_id ON TABLE {table} ");
            assert!(SCHEMA_V1.contains(&needle), "{table} lacks tenant_id");
        }
        assert!(SCHEMA_V2.contains("DEFINE FIELD tenant_id ON TABLE patient "));
    }
}
