//! libSQL-backed profile store.
//!
//! One row per user in a local database file (or in memory). Columns
//! stay string-typed and nullable the way the dialogue expects: a
//! profile that never chose languages stores NULL, not an empty list.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, params};
use tracing::{debug, info};

use crate::error::StorageError;
use crate::profile::{Profile, Sex, WizardState};
use crate::store::ProfileStore;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "profiles",
    sql: r#"
        CREATE TABLE IF NOT EXISTS profiles (
            user_id INTEGER PRIMARY KEY,
            wizard TEXT NOT NULL DEFAULT 'none',
            wizard_step TEXT,
            languages TEXT,
            sex TEXT,
            partner_sex TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_profiles_wizard ON profiles(wizard);
    "#,
}];

/// Local libSQL database holding one row per profile.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Open(format!("create database directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StorageError::Open(e.to_string()))?;
        let conn = db
            .connect()
            .map_err(|e| StorageError::Open(e.to_string()))?;

        run_migrations(&conn).await?;
        info!(path = %path.display(), "profile database opened");
        Ok(Self { db, conn })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StorageError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StorageError::Open(e.to_string()))?;
        let conn = db
            .connect()
            .map_err(|e| StorageError::Open(e.to_string()))?;

        run_migrations(&conn).await?;
        Ok(Self { db, conn })
    }
}

async fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        (),
    )
    .await
    .map_err(|e| StorageError::Migration(format!("create _migrations: {e}")))?;

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| StorageError::Migration(format!("read version: {e}")))?;
    let current: i64 = match rows.next().await {
        Ok(Some(row)) => row.get(0).unwrap_or(0),
        _ => 0,
    };

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        conn.execute_batch(migration.sql)
            .await
            .map_err(|e| StorageError::Migration(format!("{}: {e}", migration.name)))?;
        conn.execute(
            "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, Utc::now().to_rfc3339()],
        )
        .await
        .map_err(|e| StorageError::Migration(format!("record {}: {e}", migration.name)))?;
        debug!(version = migration.version, name = migration.name, "migration applied");
    }
    Ok(())
}

/// Parse an RFC 3339 or SQLite datetime string.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<&str>` to a libsql value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn row_to_profile(row: &libsql::Row) -> Result<Profile, StorageError> {
    let user_id: i64 = row
        .get(0)
        .map_err(|e| StorageError::Query(format!("user_id: {e}")))?;
    let wizard: String = row
        .get(1)
        .map_err(|e| StorageError::Query(format!("wizard: {e}")))?;
    let step: Option<String> = row.get(2).ok();
    let languages_raw: Option<String> = row.get(3).ok();
    let sex_raw: Option<String> = row.get(4).ok();
    let partner_raw: Option<String> = row.get(5).ok();
    let created_raw: String = row
        .get(6)
        .map_err(|e| StorageError::Query(format!("created_at: {e}")))?;
    let updated_raw: String = row
        .get(7)
        .map_err(|e| StorageError::Query(format!("updated_at: {e}")))?;

    let languages = match languages_raw {
        Some(raw) => Some(
            serde_json::from_str::<Vec<String>>(&raw)
                .map_err(|e| StorageError::Query(format!("decode languages: {e}")))?,
        ),
        None => None,
    };

    Ok(Profile::from_parts(
        user_id,
        WizardState::from_stored(&wizard, step.as_deref()),
        languages,
        sex_raw.as_deref().and_then(Sex::from_stored),
        partner_raw.as_deref().and_then(Sex::from_stored),
        parse_datetime(&created_raw),
        parse_datetime(&updated_raw),
    ))
}

#[async_trait]
impl ProfileStore for LibSqlStore {
    async fn load(&self, user_id: i64) -> Result<Option<Profile>, StorageError> {
        let mut rows = self
            .conn
            .query(
                "SELECT user_id, wizard, wizard_step, languages, sex, partner_sex,
                        created_at, updated_at
                 FROM profiles WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| StorageError::Query(format!("load: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_profile(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StorageError::Query(format!("load: {e}"))),
        }
    }

    async fn save(&self, profile: &Profile) -> Result<(), StorageError> {
        let (wizard, step) = profile.wizard().as_stored();
        let languages = if profile.is_novice() {
            None
        } else {
            Some(
                serde_json::to_string(profile.languages())
                    .map_err(|e| StorageError::Query(format!("encode languages: {e}")))?,
            )
        };

        self.conn
            .execute(
                "INSERT INTO profiles (user_id, wizard, wizard_step, languages, sex,
                                       partner_sex, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(user_id) DO UPDATE SET
                     wizard = excluded.wizard,
                     wizard_step = excluded.wizard_step,
                     languages = excluded.languages,
                     sex = excluded.sex,
                     partner_sex = excluded.partner_sex,
                     updated_at = excluded.updated_at",
                params![
                    profile.user_id(),
                    wizard,
                    opt_text(step),
                    opt_text(languages.as_deref()),
                    opt_text(profile.sex().map(|s| s.as_stored())),
                    opt_text(profile.partner_sex().map(|s| s.as_stored())),
                    profile.created_at().to_rfc3339(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StorageError::Query(format!("save: {e}")))?;

        debug!(user_id = profile.user_id(), "profile saved");
        Ok(())
    }
}
