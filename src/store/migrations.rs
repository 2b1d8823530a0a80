//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.
//! On first run against a legacy DB (a `scheduled_posts` table exists, no
//! `_migrations` table), the legacy rows are copied into `jobs` with their
//! timestamps renormalized. The legacy table is left in place.

use libsql::{Connection, params};

use crate::error::DatabaseError;
use crate::jobs::model::{parse_timestamp, to_canonical};

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                link TEXT,
                visibility TEXT NOT NULL DEFAULT 'PUBLIC',
                scheduled_at TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'published', 'failed', 'cancelled')),
                created_at TEXT NOT NULL,
                published_at TEXT,
                external_ref TEXT,
                error TEXT,
                attempt_count INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_status_scheduled ON jobs(status, scheduled_at);
            CREATE INDEX IF NOT EXISTS idx_jobs_scheduled ON jobs(scheduled_at);
            CREATE INDEX IF NOT EXISTS idx_jobs_created ON jobs(created_at);
        "#,
}];

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    if current_version == 0 && legacy_table_exists(conn).await? {
        let imported = import_legacy_posts(conn).await?;
        tracing::info!(imported, "Legacy scheduled_posts table detected, rows imported");
    }

    let version = get_current_version(conn).await?;
    tracing::debug!(version, "Database migrations complete");
    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => {
            let version: i64 = row.get(0).map_err(|e| {
                DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
            })?;
            Ok(version)
        }
        None => Ok(0),
    }
}

/// Check if the legacy `scheduled_posts` table exists.
async fn legacy_table_exists(conn: &Connection) -> Result<bool, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='scheduled_posts'",
            (),
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to check legacy tables: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("Failed to read legacy check: {e}")))?;

    match row {
        Some(row) => {
            let count: i64 = row.get(0).unwrap_or(0);
            Ok(count > 0)
        }
        None => Ok(false),
    }
}

/// A `scheduled_posts` row with canonical timestamps.
struct LegacyRow {
    id: String,
    content: String,
    link: Option<String>,
    visibility: String,
    scheduled_at: String,
    status: String,
    created_at: String,
    published_at: Option<String>,
    external_ref: Option<String>,
    error: Option<String>,
    attempt_count: i64,
}

/// Copy legacy rows into `jobs`, renormalizing every timestamp.
///
/// Rows whose timestamps cannot be parsed are skipped. Returns the number of
/// rows copied.
async fn import_legacy_posts(conn: &Connection) -> Result<usize, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT id, commentary, url, visibility, scheduled_time, status, created_at, \
             published_at, post_urn, error_message, retry_count FROM scheduled_posts",
            (),
        )
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read scheduled_posts: {e}")))?;

    let mut legacy = Vec::new();
    while let Ok(Some(row)) = rows.next().await {
        let id: String = match row.get(0) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Skipping legacy row without id: {e}");
                continue;
            }
        };
        let scheduled_raw: String = row.get(4).unwrap_or_default();
        let created_raw: String = row.get(6).unwrap_or_default();
        let published_raw: Option<String> = row.get(7).ok();

        let (Ok(scheduled_at), Ok(created_at)) =
            (parse_timestamp(&scheduled_raw), parse_timestamp(&created_raw))
        else {
            tracing::warn!(id = %id, "Skipping legacy row with unparseable timestamps");
            continue;
        };
        let published_at = published_raw
            .as_deref()
            .and_then(|s| parse_timestamp(s).ok())
            .map(to_canonical);

        legacy.push(LegacyRow {
            id,
            content: row.get::<String>(1).unwrap_or_default(),
            link: row.get::<String>(2).ok(),
            visibility: row.get::<String>(3).unwrap_or_else(|_| "PUBLIC".to_string()),
            scheduled_at: to_canonical(scheduled_at),
            status: row.get::<String>(5).unwrap_or_else(|_| "pending".to_string()),
            created_at: to_canonical(created_at),
            published_at,
            external_ref: row.get::<String>(8).ok(),
            error: row.get::<String>(9).ok(),
            attempt_count: row.get::<i64>(10).unwrap_or(0),
        });
    }

    let mut imported = 0;
    for legacy_row in legacy {
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO jobs (id, content, link, visibility, scheduled_at, status, \
                 created_at, published_at, external_ref, error, attempt_count) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    legacy_row.id,
                    legacy_row.content,
                    opt_value(legacy_row.link),
                    legacy_row.visibility,
                    legacy_row.scheduled_at,
                    legacy_row.status,
                    legacy_row.created_at,
                    opt_value(legacy_row.published_at),
                    opt_value(legacy_row.external_ref),
                    opt_value(legacy_row.error),
                    legacy_row.attempt_count,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Migration(format!("Failed to import legacy row: {e}")))?;
        imported += inserted as usize;
    }
    Ok(imported)
}

fn opt_value(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
