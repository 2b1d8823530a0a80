//! `JobStore` trait: the single async interface for job persistence.
//!
//! Every status-changing operation is conditional on the job's current
//! status and applied atomically. `Ok(None)` means the job is missing or in
//! the wrong state; `Err` is reserved for storage failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::jobs::{Job, JobStatus, JobUpdate, NewJob, QueueSummary};

/// Backend-agnostic job store.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create the schema if it does not exist yet.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Insert a new pending job with a fresh id and `attempt_count = 0`.
    async fn create(&self, job: &NewJob) -> Result<Job, DatabaseError>;

    /// Get a job by ID.
    async fn get(&self, id: Uuid) -> Result<Option<Job>, DatabaseError>;

    /// List jobs ascending by `scheduled_at`, optionally filtered by status.
    async fn list(&self, status: Option<JobStatus>, limit: usize)
    -> Result<Vec<Job>, DatabaseError>;

    /// Pending jobs with `scheduled_at <= now`, ascending by `scheduled_at`.
    async fn get_due(&self, now: DateTime<Utc>) -> Result<Vec<Job>, DatabaseError>;

    /// Apply the supplied fields to a pending job.
    async fn update(&self, id: Uuid, update: &JobUpdate) -> Result<Option<Job>, DatabaseError>;

    /// Move a pending job to a new time.
    async fn reschedule(
        &self,
        id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Option<Job>, DatabaseError>;

    /// pending → cancelled.
    async fn cancel(&self, id: Uuid) -> Result<Option<Job>, DatabaseError>;

    /// pending → published. A second call for the same job is a no-op.
    async fn mark_published(
        &self,
        id: Uuid,
        external_ref: &str,
    ) -> Result<Option<Job>, DatabaseError>;

    /// pending → failed, recording the error and incrementing `attempt_count`.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<Option<Job>, DatabaseError>;

    /// failed → pending. Clears the error; `scheduled_at` defaults to now + 5 minutes.
    async fn retry(
        &self,
        id: Uuid,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Job>, DatabaseError>;

    /// Counts by status, next due pending job, and most recent failure.
    async fn summary(&self) -> Result<QueueSummary, DatabaseError>;
}
