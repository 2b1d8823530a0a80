//! libSQL backend: async `JobStore` implementation.
//!
//! Supports local file and in-memory databases. Each status transition is a
//! single conditional `UPDATE ... WHERE status = ? RETURNING`, so the read of
//! the current status and the write cannot interleave with another writer.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Rows, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::jobs::model::{DEFAULT_RETRY_DELAY_MINUTES, to_canonical};
use crate::jobs::{Job, JobStatus, JobUpdate, NewJob, QueueSummary, StatusCounts, Transition};
use crate::store::migrations;
use crate::store::traits::JobStore;

/// How long a writer waits on a lock held by another process.
const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        // The daemon and request handlers may live in separate processes.
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| DatabaseError::Pool(format!("Failed to set busy timeout: {e}")))?;
        let mut mode = conn
            .query("PRAGMA journal_mode = WAL", ())
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to enable WAL: {e}")))?;
        mode.next()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to enable WAL: {e}")))?;
        drop(mode);

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

const JOB_COLUMNS: &str = "id, content, link, visibility, scheduled_at, status, created_at, published_at, external_ref, error, attempt_count";

/// Parse a stored timestamp. Canonical rows are RFC 3339; SQLite
/// `datetime()` output is accepted for hand-edited rows.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    None
}

fn required_datetime(column: &str, s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    parse_datetime(s)
        .ok_or_else(|| DatabaseError::Serialization(format!("bad {column} timestamp: {s:?}")))
}

/// Map a libsql Row to a Job.
///
/// Column order matches JOB_COLUMNS:
/// 0:id, 1:content, 2:link, 3:visibility, 4:scheduled_at, 5:status,
/// 6:created_at, 7:published_at, 8:external_ref, 9:error, 10:attempt_count
fn row_to_job(row: &libsql::Row) -> Result<Job, DatabaseError> {
    let col = |e: libsql::Error| DatabaseError::Serialization(format!("job row: {e}"));

    let id_str: String = row.get(0).map_err(col)?;
    let visibility_str: String = row.get(3).map_err(col)?;
    let scheduled_str: String = row.get(4).map_err(col)?;
    let status_str: String = row.get(5).map_err(col)?;
    let created_str: String = row.get(6).map_err(col)?;
    let published_str: Option<String> = row.get(7).ok();
    let attempt_count: i64 = row.get(10).map_err(col)?;

    Ok(Job {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("bad job id {id_str:?}: {e}")))?,
        content: row.get(1).map_err(col)?,
        link: row.get(2).ok(),
        visibility: visibility_str
            .parse()
            .map_err(|e| DatabaseError::Serialization(format!("{e}")))?,
        scheduled_at: required_datetime("scheduled_at", &scheduled_str)?,
        status: status_str
            .parse()
            .map_err(|e| DatabaseError::Serialization(format!("{e}")))?,
        created_at: required_datetime("created_at", &created_str)?,
        published_at: published_str.as_deref().and_then(parse_datetime),
        external_ref: row.get(8).ok(),
        error: row.get(9).ok(),
        attempt_count: u32::try_from(attempt_count).unwrap_or(0),
    })
}

/// Read the first row of a result set as a Job.
async fn first_job(mut rows: Rows, op: &str) -> Result<Option<Job>, DatabaseError> {
    match rows.next().await {
        Ok(Some(row)) => Ok(Some(row_to_job(&row)?)),
        Ok(None) => Ok(None),
        Err(e) => Err(DatabaseError::Query(format!("{op}: {e}"))),
    }
}

/// Collect a result set, skipping rows that fail to parse.
async fn collect_jobs(mut rows: Rows, op: &str) -> Result<Vec<Job>, DatabaseError> {
    let mut jobs = Vec::new();
    loop {
        match rows.next().await {
            Ok(Some(row)) => match row_to_job(&row) {
                Ok(job) => jobs.push(job),
                Err(e) => warn!("{op}: skipping job row: {e}"),
            },
            Ok(None) => break,
            Err(e) => return Err(DatabaseError::Query(format!("{op}: {e}"))),
        }
    }
    Ok(jobs)
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl JobStore for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn create(&self, job: &NewJob) -> Result<Job, DatabaseError> {
        let id = Uuid::new_v4();
        let now = to_canonical(Utc::now());
        let rows = self
            .conn()
            .query(
                &format!(
                    "INSERT INTO jobs (id, content, link, visibility, scheduled_at, status, created_at, attempt_count) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0) RETURNING {JOB_COLUMNS}"
                ),
                params![
                    id.to_string(),
                    job.content.clone(),
                    opt_text(job.link.as_deref().map(str::trim).filter(|l| !l.is_empty())),
                    job.visibility.as_str(),
                    to_canonical(job.scheduled_at),
                    JobStatus::Pending.as_str(),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create: {e}")))?;

        let created = first_job(rows, "create")
            .await?
            .ok_or_else(|| DatabaseError::Query("create: insert returned no row".to_string()))?;

        debug!(job_id = %created.id, scheduled_at = %created.scheduled_at, "Job created");
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get: {e}")))?;
        first_job(rows, "get").await
    }

    async fn list(
        &self,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<Job>, DatabaseError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match status {
            Some(status) => self
                .conn()
                .query(
                    &format!(
                        "SELECT {JOB_COLUMNS} FROM jobs WHERE status = ?1 \
                         ORDER BY scheduled_at ASC, created_at ASC LIMIT ?2"
                    ),
                    params![status.as_str(), limit],
                )
                .await,
            None => self
                .conn()
                .query(
                    &format!(
                        "SELECT {JOB_COLUMNS} FROM jobs \
                         ORDER BY scheduled_at ASC, created_at ASC LIMIT ?1"
                    ),
                    params![limit],
                )
                .await,
        }
        .map_err(|e| DatabaseError::Query(format!("list: {e}")))?;

        collect_jobs(rows, "list").await
    }

    async fn get_due(&self, now: DateTime<Utc>) -> Result<Vec<Job>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE status = ?1 AND scheduled_at <= ?2 \
                     ORDER BY scheduled_at ASC, created_at ASC"
                ),
                params![JobStatus::Pending.as_str(), to_canonical(now)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_due: {e}")))?;

        collect_jobs(rows, "get_due").await
    }

    async fn update(&self, id: Uuid, update: &JobUpdate) -> Result<Option<Job>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "UPDATE jobs SET content = COALESCE(?1, content), link = CASE WHEN ?2 IS NULL THEN link ELSE NULLIF(?2, '') END, \
                     visibility = COALESCE(?3, visibility) \
                     WHERE id = ?4 AND status = ?5 RETURNING {JOB_COLUMNS}"
                ),
                params![
                    opt_text(update.content.as_deref()),
                    opt_text(update.link.as_deref().map(str::trim)),
                    opt_text(update.visibility.as_ref().map(|v| v.as_str())),
                    id.to_string(),
                    Transition::Edit.source().as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update: {e}")))?;

        let job = first_job(rows, "update").await?;
        if job.is_some() {
            debug!(job_id = %id, "Job updated");
        }
        Ok(job)
    }

    async fn reschedule(
        &self,
        id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Option<Job>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "UPDATE jobs SET scheduled_at = ?1 WHERE id = ?2 AND status = ?3 \
                     RETURNING {JOB_COLUMNS}"
                ),
                params![
                    to_canonical(scheduled_at),
                    id.to_string(),
                    Transition::Edit.source().as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("reschedule: {e}")))?;

        let job = first_job(rows, "reschedule").await?;
        if let Some(ref job) = job {
            debug!(job_id = %id, scheduled_at = %job.scheduled_at, "Job rescheduled");
        }
        Ok(job)
    }

    async fn cancel(&self, id: Uuid) -> Result<Option<Job>, DatabaseError> {
        let transition = Transition::Cancel;
        let rows = self
            .conn()
            .query(
                &format!(
                    "UPDATE jobs SET status = ?1 WHERE id = ?2 AND status = ?3 \
                     RETURNING {JOB_COLUMNS}"
                ),
                params![
                    transition.target().as_str(),
                    id.to_string(),
                    transition.source().as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("cancel: {e}")))?;

        let job = first_job(rows, "cancel").await?;
        if job.is_some() {
            debug!(job_id = %id, "Job cancelled");
        }
        Ok(job)
    }

    async fn mark_published(
        &self,
        id: Uuid,
        external_ref: &str,
    ) -> Result<Option<Job>, DatabaseError> {
        let transition = Transition::Publish;
        let rows = self
            .conn()
            .query(
                &format!(
                    "UPDATE jobs SET status = ?1, published_at = ?2, external_ref = ?3 \
                     WHERE id = ?4 AND status = ?5 RETURNING {JOB_COLUMNS}"
                ),
                params![
                    transition.target().as_str(),
                    to_canonical(Utc::now()),
                    external_ref,
                    id.to_string(),
                    transition.source().as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_published: {e}")))?;

        let job = first_job(rows, "mark_published").await?;
        if job.is_some() {
            debug!(job_id = %id, external_ref, "Job marked published");
        }
        Ok(job)
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<Option<Job>, DatabaseError> {
        let transition = Transition::Fail;
        let rows = self
            .conn()
            .query(
                &format!(
                    "UPDATE jobs SET status = ?1, error = ?2, attempt_count = attempt_count + 1 \
                     WHERE id = ?3 AND status = ?4 RETURNING {JOB_COLUMNS}"
                ),
                params![
                    transition.target().as_str(),
                    error,
                    id.to_string(),
                    transition.source().as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_failed: {e}")))?;

        let job = first_job(rows, "mark_failed").await?;
        if let Some(ref job) = job {
            debug!(job_id = %id, attempt_count = job.attempt_count, "Job marked failed");
        }
        Ok(job)
    }

    async fn retry(
        &self,
        id: Uuid,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Job>, DatabaseError> {
        let transition = Transition::Retry;
        let scheduled_at = scheduled_at
            .unwrap_or_else(|| Utc::now() + Duration::minutes(DEFAULT_RETRY_DELAY_MINUTES));
        let rows = self
            .conn()
            .query(
                &format!(
                    "UPDATE jobs SET status = ?1, scheduled_at = ?2, error = NULL \
                     WHERE id = ?3 AND status = ?4 RETURNING {JOB_COLUMNS}"
                ),
                params![
                    transition.target().as_str(),
                    to_canonical(scheduled_at),
                    id.to_string(),
                    transition.source().as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("retry: {e}")))?;

        let job = first_job(rows, "retry").await?;
        if let Some(ref job) = job {
            debug!(job_id = %id, scheduled_at = %job.scheduled_at, "Job reset to pending");
        }
        Ok(job)
    }

    async fn summary(&self) -> Result<QueueSummary, DatabaseError> {
        let conn = self.conn();

        let mut rows = conn
            .query("SELECT status, COUNT(*) FROM jobs GROUP BY status", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("summary counts: {e}")))?;

        let mut counts = StatusCounts::default();
        while let Ok(Some(row)) = rows.next().await {
            let status_str: String = row.get(0).unwrap_or_default();
            let count: i64 = row.get(1).unwrap_or(0);
            match status_str.parse::<JobStatus>() {
                Ok(status) => counts.set(status, count.max(0) as u64),
                Err(e) => warn!("summary: {e}"),
            }
        }

        let next_due_rows = conn
            .query(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE status = ?1 \
                     ORDER BY scheduled_at ASC, created_at ASC LIMIT 1"
                ),
                params![JobStatus::Pending.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("summary next_due: {e}")))?;
        let next_due = first_job(next_due_rows, "summary next_due").await?;

        let failure_rows = conn
            .query(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE status = ?1 \
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![JobStatus::Failed.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("summary recent_failure: {e}")))?;
        let recent_failure = first_job(failure_rows, "summary recent_failure").await?;

        Ok(QueueSummary {
            counts,
            next_due,
            recent_failure,
        })
    }
}
