//! Job data model: scheduled posts, their lifecycle, and timestamp handling.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Reference stored when the publisher response carries no usable id.
pub const UNKNOWN_EXTERNAL_REF: &str = "unknown";

/// Delay applied by `retry` when no explicit time is supplied.
pub const DEFAULT_RETRY_DELAY_MINUTES: i64 = 5;

/// Lifecycle status of a scheduled post.
///
/// ```text
/// pending --publish ok-->   published   (terminal)
/// pending --publish err-->  failed
/// pending --cancel-->       cancelled   (terminal)
/// failed  --retry-->        pending
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Published,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Published,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Published => "published",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "published" => Ok(JobStatus::Published),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(ValidationError::InvalidStatus(s.to_string())),
        }
    }
}

/// A status-changing operation on a job.
///
/// The store applies a transition only when the job's current status equals
/// [`Transition::source`]; otherwise the operation is not applicable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Payload edit or reschedule; status unchanged.
    Edit,
    Publish,
    Fail,
    Cancel,
    Retry,
}

impl Transition {
    /// Status the job must be in for the transition to apply.
    pub fn source(&self) -> JobStatus {
        match self {
            Transition::Retry => JobStatus::Failed,
            Transition::Edit | Transition::Publish | Transition::Fail | Transition::Cancel => {
                JobStatus::Pending
            }
        }
    }

    /// Status the job ends up in.
    pub fn target(&self) -> JobStatus {
        match self {
            Transition::Edit | Transition::Retry => JobStatus::Pending,
            Transition::Publish => JobStatus::Published,
            Transition::Fail => JobStatus::Failed,
            Transition::Cancel => JobStatus::Cancelled,
        }
    }
}

/// Audience of a published post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Public,
    Connections,
    LoggedIn,
    Container,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "PUBLIC",
            Visibility::Connections => "CONNECTIONS",
            Visibility::LoggedIn => "LOGGED_IN",
            Visibility::Container => "CONTAINER",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUBLIC" => Ok(Visibility::Public),
            "CONNECTIONS" => Ok(Visibility::Connections),
            "LOGGED_IN" => Ok(Visibility::LoggedIn),
            "CONTAINER" => Ok(Visibility::Container),
            _ => Err(ValidationError::InvalidVisibility(s.to_string())),
        }
    }
}

/// A scheduled post tracked by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique ID, assigned at creation.
    pub id: Uuid,
    /// Post text.
    pub content: String,
    /// Optional article URL attached to the post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub visibility: Visibility,
    /// When the post becomes due.
    pub scheduled_at: DateTime<Utc>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    /// Set once, on successful publish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Reference returned by the publisher, set once on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    /// Last failure message; cleared on retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of failed publish attempts. Never reset.
    pub attempt_count: u32,
}

impl Job {
    /// The attached link, unless it is missing or blank.
    pub fn link_url(&self) -> Option<&str> {
        self.link.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }
}

/// Fields for a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub content: String,
    pub scheduled_at: DateTime<Utc>,
    pub link: Option<String>,
    pub visibility: Visibility,
}

impl NewJob {
    pub fn new(content: impl Into<String>, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            scheduled_at,
            link: None,
            visibility: Visibility::default(),
        }
    }

    /// Builder: attach a link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Builder: set visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Partial edit of a pending job. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub content: Option<String>,
    /// A blank link removes the attached link.
    pub link: Option<String>,
    pub visibility: Option<Visibility>,
}

/// Number of jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub published: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl StatusCounts {
    pub fn get(&self, status: JobStatus) -> u64 {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Published => self.published,
            JobStatus::Failed => self.failed,
            JobStatus::Cancelled => self.cancelled,
        }
    }

    pub fn set(&mut self, status: JobStatus, count: u64) {
        match status {
            JobStatus::Pending => self.pending = count,
            JobStatus::Published => self.published = count,
            JobStatus::Failed => self.failed = count,
            JobStatus::Cancelled => self.cancelled = count,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.published + self.failed + self.cancelled
    }
}

/// Aggregate view of the queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub counts: StatusCounts,
    /// Earliest-scheduled pending job.
    pub next_due: Option<Job>,
    /// Most recently created failed job.
    pub recent_failure: Option<Job>,
}

// ── Timestamps ──────────────────────────────────────────────────────

/// Canonical stored form: UTC, RFC 3339, microsecond precision, `Z` suffix.
///
/// Fixed width, so string comparison in SQL matches chronological order.
pub fn to_canonical(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a caller-supplied ISO 8601 timestamp into UTC.
///
/// Accepts a `Z` suffix or any explicit offset. A timestamp without an
/// offset is taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = value.trim();
    let parsed = DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"]
                .into_iter()
                .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
                .map(|ndt| ndt.and_utc())
        });
    match parsed {
        // Canonical form is only fixed width for four-digit years.
        Some(dt) if (0..=9999).contains(&dt.year()) => Ok(dt),
        Some(dt) => Err(ValidationError::InvalidTimestamp {
            value: value.to_string(),
            reason: format!("year {} is outside 0000-9999", dt.year()),
        }),
        None => Err(ValidationError::InvalidTimestamp {
            value: value.to_string(),
            reason: "expected ISO 8601, e.g. 2026-02-15T14:00:00Z".to_string(),
        }),
    }
}

/// Parse a caller-supplied timestamp and require it to be after `now`.
pub fn parse_future_timestamp(
    value: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ValidationError> {
    let dt = parse_timestamp(value)?;
    if dt <= now {
        return Err(ValidationError::NotInFuture);
    }
    Ok(dt)
}
