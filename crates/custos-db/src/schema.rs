//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings, both as record keys and as references.

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
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "refresh_token_lookup_indexes",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD first_name ON TABLE user TYPE string DEFAULT '';
DEFINE FIELD last_name ON TABLE user TYPE string DEFAULT '';
DEFINE FIELD patronymic ON TABLE user TYPE string DEFAULT '';
DEFINE FIELD is_active ON TABLE user TYPE bool DEFAULT true;
DEFINE FIELD is_superuser ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- =======================================================================
-- Roles
-- =======================================================================
DEFINE TABLE role SCHEMAFULL;
DEFINE FIELD name ON TABLE role TYPE string;
DEFINE FIELD created_at ON TABLE role TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_role_name ON TABLE role COLUMNS name UNIQUE;

-- =======================================================================
-- Role assignments (user <-> role, many-to-many)
-- =======================================================================
DEFINE TABLE role_assignment SCHEMAFULL;
DEFINE FIELD user_id ON TABLE role_assignment TYPE string;
DEFINE FIELD role_id ON TABLE role_assignment TYPE string;
DEFINE FIELD created_at ON TABLE role_assignment TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_role_assignment_user_role ON TABLE role_assignment \
    COLUMNS user_id, role_id UNIQUE;
DEFINE INDEX idx_role_assignment_role ON TABLE role_assignment \
    COLUMNS role_id;

-- =======================================================================
-- Business elements (protected resource categories)
-- =======================================================================
DEFINE TABLE business_element SCHEMAFULL;
DEFINE FIELD slug ON TABLE business_element TYPE string;
DEFINE FIELD name ON TABLE business_element TYPE string;
DEFINE FIELD description ON TABLE business_element TYPE string \
    DEFAULT '';
DEFINE FIELD created_at ON TABLE business_element TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_business_element_slug ON TABLE business_element \
    COLUMNS slug UNIQUE;

-- =======================================================================
-- Access rules (one per role and element)
-- =======================================================================
DEFINE TABLE access_rule SCHEMAFULL;
DEFINE FIELD role_id ON TABLE access_rule TYPE string;
DEFINE FIELD element_id ON TABLE access_rule TYPE string;
DEFINE FIELD read_permission ON TABLE access_rule TYPE bool DEFAULT false;
DEFINE FIELD read_all_permission ON TABLE access_rule TYPE bool \
    DEFAULT false;
DEFINE FIELD create_permission ON TABLE access_rule TYPE bool \
    DEFAULT false;
DEFINE FIELD update_permission ON TABLE access_rule TYPE bool \
    DEFAULT false;
DEFINE FIELD update_all_permission ON TABLE access_rule TYPE bool \
    DEFAULT false;
DEFINE FIELD delete_permission ON TABLE access_rule TYPE bool \
    DEFAULT false;
DEFINE FIELD delete_all_permission ON TABLE access_rule TYPE bool \
    DEFAULT false;
DEFINE FIELD created_at ON TABLE access_rule TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE access_rule TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_access_rule_role_element ON TABLE access_rule \
    COLUMNS role_id, element_id UNIQUE;
DEFINE INDEX idx_access_rule_element ON TABLE access_rule \
    COLUMNS element_id;

-- =======================================================================
-- Refresh tokens (hash only, never the raw secret)
-- =======================================================================
DEFINE TABLE refresh_token SCHEMAFULL;
DEFINE FIELD user_id ON TABLE refresh_token TYPE string;
DEFINE FIELD token_hash ON TABLE refresh_token TYPE string;
DEFINE FIELD created_at ON TABLE refresh_token TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD expires_at ON TABLE refresh_token TYPE datetime;
DEFINE FIELD revoked_at ON TABLE refresh_token TYPE option<datetime>;
DEFINE FIELD replaced_by ON TABLE refresh_token TYPE option<string>;
DEFINE FIELD family ON TABLE refresh_token TYPE string;
DEFINE FIELD user_agent ON TABLE refresh_token TYPE string DEFAULT '';
DEFINE FIELD ip_address ON TABLE refresh_token TYPE option<string>;
DEFINE INDEX idx_refresh_token_hash ON TABLE refresh_token \
    COLUMNS token_hash UNIQUE;
";

// -----------------------------------------------------------------------
// Schema v2: family and per-user revocation sweeps
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
DEFINE INDEX idx_refresh_token_family ON TABLE refresh_token \
    COLUMNS family;
DEFINE INDEX idx_refresh_token_user ON TABLE refresh_token \
    COLUMNS user_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// Returns the schema version after the run.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let mut current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

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

        db.query(
            "CREATE _migration SET version = $version, \
             name = $name",
        )
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

        current_version = migration.version;
    }

    info!(version = current_version, "Schema is up to date");
    Ok(current_version)
}

/// Latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
