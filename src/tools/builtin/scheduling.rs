//! Scheduling tools: schedule, list, inspect, edit, cancel, and retry posts.
//!
//! Every handler validates its parameters before touching the store. Store
//! operations that return `None` surface as `ToolError::NotApplicable`
//! (or `NotFound` for a plain lookup).

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{DatabaseError, ValidationError};
use crate::jobs::model::{parse_future_timestamp, to_canonical};
use crate::jobs::{Job, JobStatus, JobUpdate, NewJob, QueueSummary, Visibility};
use crate::store::JobStore;
use crate::tools::tool::{Tool, ToolError, ToolOutput, optional_str, require_str};

const DEFAULT_LIST_LIMIT: i64 = 50;
const PREVIEW_CHARS: usize = 80;

const VISIBILITY_VALUES: [&str; 4] = ["PUBLIC", "CONNECTIONS", "LOGGED_IN", "CONTAINER"];
const STATUS_VALUES: [&str; 4] = ["pending", "published", "failed", "cancelled"];

/// All eight scheduling tools, sharing one store.
pub fn all_tools(store: Arc<dyn JobStore>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(SchedulePostTool::new(Arc::clone(&store))),
        Arc::new(ListScheduledPostsTool::new(Arc::clone(&store))),
        Arc::new(GetScheduledPostTool::new(Arc::clone(&store))),
        Arc::new(CancelScheduledPostTool::new(Arc::clone(&store))),
        Arc::new(UpdateScheduledPostTool::new(Arc::clone(&store))),
        Arc::new(ReschedulePostTool::new(Arc::clone(&store))),
        Arc::new(RetryFailedPostTool::new(Arc::clone(&store))),
        Arc::new(QueueSummaryTool::new(store)),
    ]
}

// ── Shared helpers ──────────────────────────────────────────────────

fn invalid(e: ValidationError) -> ToolError {
    ToolError::InvalidParameters(e.to_string())
}

fn storage(e: DatabaseError) -> ToolError {
    ToolError::ExecutionFailed(e.to_string())
}

fn job_json(job: &Job) -> Result<serde_json::Value, ToolError> {
    serde_json::to_value(job).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
}

/// A malformed id can never match a job.
fn parse_post_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

fn not_in_status(post_id: &str, status: JobStatus) -> ToolError {
    ToolError::NotApplicable(format!(
        "Post not found or not in {status} status: {post_id}"
    ))
}

fn parse_visibility(raw: &str) -> Result<Visibility, ToolError> {
    raw.parse().map_err(invalid)
}

fn non_empty_content(raw: &str) -> Result<String, ToolError> {
    if raw.trim().is_empty() {
        return Err(invalid(ValidationError::EmptyContent));
    }
    Ok(raw.to_string())
}

fn post_id_schema(action: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "string",
        "description": format!("The UUID of the scheduled post to {action}.")
    })
}

// ── schedule_post ───────────────────────────────────────────────────

/// Create a pending job.
pub struct SchedulePostTool {
    store: Arc<dyn JobStore>,
}

impl SchedulePostTool {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SchedulePostTool {
    fn name(&self) -> &str {
        "schedule_post"
    }

    fn description(&self) -> &str {
        "Schedule a LinkedIn post for future publication. The post is stored locally \
         and published by the daemon when the scheduled time arrives."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "commentary": {
                    "type": "string",
                    "description": "Post text content."
                },
                "scheduled_time": {
                    "type": "string",
                    "description": "ISO 8601 datetime for when to publish, e.g. 2026-02-15T14:00:00Z. Must be in the future."
                },
                "url": {
                    "type": "string",
                    "description": "Optional article URL to attach."
                },
                "visibility": {
                    "type": "string",
                    "enum": VISIBILITY_VALUES,
                    "description": "Post visibility (default: PUBLIC)."
                }
            },
            "required": ["commentary", "scheduled_time"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let content = non_empty_content(require_str(&params, "commentary")?)?;
        let scheduled_at =
            parse_future_timestamp(require_str(&params, "scheduled_time")?, Utc::now())
                .map_err(invalid)?;
        let link = optional_str(&params, "url")?
            .map(str::trim)
            .filter(|url| !url.is_empty());
        let visibility = optional_str(&params, "visibility")?
            .map(parse_visibility)
            .transpose()?
            .unwrap_or_default();

        let mut new_job = NewJob::new(content, scheduled_at).with_visibility(visibility);
        if let Some(link) = link {
            new_job = new_job.with_link(link);
        }
        let job = self.store.create(&new_job).await.map_err(storage)?;

        let scheduled = to_canonical(job.scheduled_at);
        Ok(ToolOutput::success(
            serde_json::json!({
                "postId": job.id.to_string(),
                "scheduledTime": scheduled,
                "status": job.status,
                "message": format!("Post scheduled for {scheduled}"),
            }),
            start.elapsed(),
        ))
    }
}

// ── list_scheduled_posts ────────────────────────────────────────────

/// List jobs by schedule time, optionally filtered by status.
pub struct ListScheduledPostsTool {
    store: Arc<dyn JobStore>,
}

impl ListScheduledPostsTool {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListScheduledPostsTool {
    fn name(&self) -> &str {
        "list_scheduled_posts"
    }

    fn description(&self) -> &str {
        "List scheduled posts in order of scheduled time, optionally filtered by status."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": STATUS_VALUES,
                    "description": "Filter by status."
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of posts to return (default: 50)."
                }
            }
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let status = optional_str(&params, "status")?
            .map(|s| s.parse::<JobStatus>().map_err(invalid))
            .transpose()?;
        let limit = match params.get("limit") {
            None | Some(serde_json::Value::Null) => DEFAULT_LIST_LIMIT,
            Some(v) => v.as_i64().ok_or_else(|| {
                ToolError::InvalidParameters("'limit' must be an integer".to_string())
            })?,
        }
        .max(1);

        let jobs = self
            .store
            .list(status, usize::try_from(limit).unwrap_or(usize::MAX))
            .await
            .map_err(storage)?;
        let posts = jobs.iter().map(job_json).collect::<Result<Vec<_>, _>>()?;
        let label = status.map(|s| s.as_str()).unwrap_or("all");

        Ok(ToolOutput::success(
            serde_json::json!({
                "count": posts.len(),
                "message": format!("Found {} {label} scheduled posts", posts.len()),
                "posts": posts,
            }),
            start.elapsed(),
        ))
    }
}

// ── get_scheduled_post ──────────────────────────────────────────────

/// Fetch one job.
pub struct GetScheduledPostTool {
    store: Arc<dyn JobStore>,
}

impl GetScheduledPostTool {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for GetScheduledPostTool {
    fn name(&self) -> &str {
        "get_scheduled_post"
    }

    fn description(&self) -> &str {
        "Get details of a scheduled post by its UUID."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "post_id": post_id_schema("retrieve") },
            "required": ["post_id"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let raw_id = require_str(&params, "post_id")?;
        let not_found = || ToolError::NotFound(format!("Scheduled post not found: {raw_id}"));

        let id = parse_post_id(raw_id).ok_or_else(not_found)?;
        let job = self
            .store
            .get(id)
            .await
            .map_err(storage)?
            .ok_or_else(not_found)?;

        Ok(ToolOutput::success(
            serde_json::json!({
                "post": job_json(&job)?,
                "message": format!("Status: {}", job.status),
            }),
            start.elapsed(),
        ))
    }
}

// ── cancel_scheduled_post ───────────────────────────────────────────

/// pending → cancelled.
pub struct CancelScheduledPostTool {
    store: Arc<dyn JobStore>,
}

impl CancelScheduledPostTool {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CancelScheduledPostTool {
    fn name(&self) -> &str {
        "cancel_scheduled_post"
    }

    fn description(&self) -> &str {
        "Cancel a scheduled post. Only pending posts can be cancelled."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "post_id": post_id_schema("cancel") },
            "required": ["post_id"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let raw_id = require_str(&params, "post_id")?;
        let not_applicable = || not_in_status(raw_id, JobStatus::Pending);

        let id = parse_post_id(raw_id).ok_or_else(not_applicable)?;
        let job = self
            .store
            .cancel(id)
            .await
            .map_err(storage)?
            .ok_or_else(not_applicable)?;

        Ok(ToolOutput::success(
            serde_json::json!({
                "postId": job.id.to_string(),
                "status": job.status,
                "message": "Scheduled post cancelled successfully",
                "success": true,
            }),
            start.elapsed(),
        ))
    }
}

// ── update_scheduled_post ───────────────────────────────────────────

/// Edit content, link, or visibility of a pending job.
pub struct UpdateScheduledPostTool {
    store: Arc<dyn JobStore>,
}

impl UpdateScheduledPostTool {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for UpdateScheduledPostTool {
    fn name(&self) -> &str {
        "update_scheduled_post"
    }

    fn description(&self) -> &str {
        "Edit fields of a pending scheduled post in place. Only provided fields are updated."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "post_id": post_id_schema("update"),
                "commentary": {
                    "type": "string",
                    "description": "New post text content."
                },
                "url": {
                    "type": "string",
                    "description": "New article URL to attach. An empty string removes the link."
                },
                "visibility": {
                    "type": "string",
                    "enum": VISIBILITY_VALUES,
                    "description": "New visibility."
                }
            },
            "required": ["post_id"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let raw_id = require_str(&params, "post_id")?;
        let update = JobUpdate {
            content: optional_str(&params, "commentary")?
                .map(non_empty_content)
                .transpose()?,
            link: optional_str(&params, "url")?.map(|s| s.to_string()),
            visibility: optional_str(&params, "visibility")?
                .map(parse_visibility)
                .transpose()?,
        };
        let not_applicable = || not_in_status(raw_id, JobStatus::Pending);

        let id = parse_post_id(raw_id).ok_or_else(not_applicable)?;
        let job = self
            .store
            .update(id, &update)
            .await
            .map_err(storage)?
            .ok_or_else(not_applicable)?;

        Ok(ToolOutput::success(
            serde_json::json!({
                "post": job_json(&job)?,
                "message": "Scheduled post updated successfully",
                "success": true,
            }),
            start.elapsed(),
        ))
    }
}

// ── reschedule_post ─────────────────────────────────────────────────

/// Move a pending job to a new future time.
pub struct ReschedulePostTool {
    store: Arc<dyn JobStore>,
}

impl ReschedulePostTool {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ReschedulePostTool {
    fn name(&self) -> &str {
        "reschedule_post"
    }

    fn description(&self) -> &str {
        "Change the scheduled time of a pending post."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "post_id": post_id_schema("reschedule"),
                "scheduled_time": {
                    "type": "string",
                    "description": "New ISO 8601 datetime for when to publish. Must be in the future."
                }
            },
            "required": ["post_id", "scheduled_time"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let raw_id = require_str(&params, "post_id")?;
        let scheduled_at =
            parse_future_timestamp(require_str(&params, "scheduled_time")?, Utc::now())
                .map_err(invalid)?;
        let not_applicable = || not_in_status(raw_id, JobStatus::Pending);

        let id = parse_post_id(raw_id).ok_or_else(not_applicable)?;
        let job = self
            .store
            .reschedule(id, scheduled_at)
            .await
            .map_err(storage)?
            .ok_or_else(not_applicable)?;

        Ok(ToolOutput::success(
            serde_json::json!({
                "post": job_json(&job)?,
                "message": format!("Post rescheduled to {}", to_canonical(job.scheduled_at)),
                "success": true,
            }),
            start.elapsed(),
        ))
    }
}

// ── retry_failed_post ───────────────────────────────────────────────

/// failed → pending.
pub struct RetryFailedPostTool {
    store: Arc<dyn JobStore>,
}

impl RetryFailedPostTool {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RetryFailedPostTool {
    fn name(&self) -> &str {
        "retry_failed_post"
    }

    fn description(&self) -> &str {
        "Reset a failed post to pending so the daemon publishes it again."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "post_id": post_id_schema("retry"),
                "scheduled_time": {
                    "type": "string",
                    "description": "Optional new ISO 8601 datetime. Defaults to now + 5 minutes."
                }
            },
            "required": ["post_id"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let raw_id = require_str(&params, "post_id")?;
        let scheduled_at = optional_str(&params, "scheduled_time")?
            .map(|s| parse_future_timestamp(s, Utc::now()).map_err(invalid))
            .transpose()?;
        let not_applicable = || not_in_status(raw_id, JobStatus::Failed);

        let id = parse_post_id(raw_id).ok_or_else(not_applicable)?;
        let job = self
            .store
            .retry(id, scheduled_at)
            .await
            .map_err(storage)?
            .ok_or_else(not_applicable)?;

        Ok(ToolOutput::success(
            serde_json::json!({
                "post": job_json(&job)?,
                "message": format!(
                    "Post reset to pending, scheduled for {}",
                    to_canonical(job.scheduled_at)
                ),
                "success": true,
            }),
            start.elapsed(),
        ))
    }
}

// ── queue_summary ───────────────────────────────────────────────────

/// Counts, next due job, and most recent failure.
pub struct QueueSummaryTool {
    store: Arc<dyn JobStore>,
}

impl QueueSummaryTool {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for QueueSummaryTool {
    fn name(&self) -> &str {
        "queue_summary"
    }

    fn description(&self) -> &str {
        "Get an overview of the scheduling queue: counts by status, next due post, \
         and most recent failure."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let summary = self.store.summary().await.map_err(storage)?;

        Ok(ToolOutput::success(
            serde_json::json!({
                "summary": format_summary(&summary),
                "counts": summary.counts,
                "next_due": summary.next_due.as_ref().map(job_json).transpose()?,
                "recent_failure": summary.recent_failure.as_ref().map(job_json).transpose()?,
            }),
            start.elapsed(),
        ))
    }
}

/// Human-readable queue overview.
pub fn format_summary(summary: &QueueSummary) -> String {
    let counts = &summary.counts;
    let mut lines = vec![
        "Queue Summary".to_string(),
        "=============".to_string(),
        String::new(),
        format!("Total posts: {}", counts.total()),
    ];
    for status in JobStatus::ALL {
        lines.push(format!("  {status}: {}", counts.get(status)));
    }
    lines.push(String::new());

    match &summary.next_due {
        Some(job) => {
            lines.push(format!("Next due: {}", to_canonical(job.scheduled_at)));
            lines.push(format!("  \"{}\"", preview(&job.content)));
        }
        None => lines.push("Next due: none".to_string()),
    }
    lines.push(String::new());

    match &summary.recent_failure {
        Some(job) => {
            lines.push(format!("Most recent failure: {}", job.id));
            lines.push(format!(
                "  Error: {}",
                job.error.as_deref().unwrap_or("unknown")
            ));
            lines.push(format!("  Failed attempts: {}", job.attempt_count));
        }
        None => lines.push("No recent failures.".to_string()),
    }

    lines.join("\n")
}

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::model::parse_timestamp;
    use crate::store::LibSqlBackend;
    use serde_json::json;

    const PAST_TIME: &str = "2000-01-01T00:00:00Z";
    const FUTURE_TIME: &str = "2099-12-31T23:59:59Z";

    async fn test_store() -> Arc<dyn JobStore> {
        Arc::new(LibSqlBackend::new_memory().await.unwrap())
    }

    /// Insert directly, bypassing the future-time check.
    async fn seed(store: &Arc<dyn JobStore>, content: &str, when: &str) -> Job {
        store
            .create(&NewJob::new(content, parse_timestamp(when).unwrap()))
            .await
            .unwrap()
    }

    // ── schedule_post ───────────────────────────────────────────────

    #[tokio::test]
    async fn schedule_post_creates_pending_job() {
        let store = test_store().await;
        let tool = SchedulePostTool::new(Arc::clone(&store));

        let output = tool
            .execute(json!({
                "commentary": "Hello LinkedIn",
                "scheduled_time": "2099-12-31T23:59:59+00:00",
                "url": "https://example.com",
                "visibility": "CONNECTIONS"
            }))
            .await
            .unwrap();

        assert_eq!(output.result["status"], "pending");
        assert_eq!(output.result["scheduledTime"], "2099-12-31T23:59:59.000000Z");
        let id: Uuid = output.result["postId"].as_str().unwrap().parse().unwrap();

        let job = store.get(id).await.unwrap().unwrap();
        assert_eq!(job.content, "Hello LinkedIn");
        assert_eq!(job.link.as_deref(), Some("https://example.com"));
        assert_eq!(job.visibility, Visibility::Connections);
    }

    #[tokio::test]
    async fn schedule_post_defaults_visibility() {
        let store = test_store().await;
        let tool = SchedulePostTool::new(Arc::clone(&store));
        let output = tool
            .execute(json!({"commentary": "Hi", "scheduled_time": FUTURE_TIME}))
            .await
            .unwrap();
        let id: Uuid = output.result["postId"].as_str().unwrap().parse().unwrap();
        assert_eq!(
            store.get(id).await.unwrap().unwrap().visibility,
            Visibility::Public
        );
    }

    #[tokio::test]
    async fn schedule_post_rejects_past_time() {
        let store = test_store().await;
        let tool = SchedulePostTool::new(Arc::clone(&store));
        let err = tool
            .execute(json!({"commentary": "Hi", "scheduled_time": PAST_TIME}))
            .await
            .unwrap_err();
        match err {
            ToolError::InvalidParameters(msg) => assert!(msg.contains("future")),
            other => panic!("expected InvalidParameters, got {other:?}"),
        }
        assert_eq!(store.summary().await.unwrap().counts.total(), 0);
    }

    #[tokio::test]
    async fn schedule_post_rejects_bad_input() {
        let store = test_store().await;
        let tool = SchedulePostTool::new(Arc::clone(&store));

        for params in [
            json!({"commentary": "Hi", "scheduled_time": FUTURE_TIME, "visibility": "EVERYONE"}),
            json!({"commentary": "Hi", "scheduled_time": FUTURE_TIME, "visibility": "public"}),
            json!({"commentary": "Hi", "scheduled_time": "tomorrow-ish"}),
            json!({"commentary": "   ", "scheduled_time": FUTURE_TIME}),
            json!({"scheduled_time": FUTURE_TIME}),
        ] {
            let err = tool.execute(params.clone()).await.unwrap_err();
            assert!(
                matches!(err, ToolError::InvalidParameters(_)),
                "{params} gave {err:?}"
            );
        }
        assert_eq!(store.summary().await.unwrap().counts.total(), 0);
    }

    #[tokio::test]
    async fn schedule_post_rejects_five_digit_year() {
        let store = test_store().await;
        let tool = SchedulePostTool::new(Arc::clone(&store));
        let err = tool
            .execute(json!({"commentary": "Hi", "scheduled_time": "+10000-01-01T00:00:00"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)), "{err:?}");

        let summary = store.summary().await.unwrap();
        assert_eq!(summary.counts.total(), 0);
        assert!(store.list(None, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn schedule_post_blank_url_means_no_link() {
        let store = test_store().await;
        let tool = SchedulePostTool::new(Arc::clone(&store));
        for url in ["", "  "] {
            let output = tool
                .execute(json!({"commentary": "Hi", "scheduled_time": FUTURE_TIME, "url": url}))
                .await
                .unwrap();
            let id: Uuid = output.result["postId"].as_str().unwrap().parse().unwrap();
            assert_eq!(store.get(id).await.unwrap().unwrap().link, None);
        }
    }

    // ── list / get ──────────────────────────────────────────────────

    #[tokio::test]
    async fn list_filters_and_limits() {
        let store = test_store().await;
        let a = seed(&store, "a", PAST_TIME).await;
        seed(&store, "b", FUTURE_TIME).await;
        store.cancel(a.id).await.unwrap();

        let tool = ListScheduledPostsTool::new(Arc::clone(&store));

        let all = tool.execute(json!({})).await.unwrap();
        assert_eq!(all.result["count"], 2);
        assert_eq!(all.result["posts"][0]["content"], "a");

        let pending = tool.execute(json!({"status": "pending"})).await.unwrap();
        assert_eq!(pending.result["count"], 1);
        assert_eq!(pending.result["posts"][0]["content"], "b");
        assert!(
            pending.result["message"]
                .as_str()
                .unwrap()
                .contains("pending")
        );

        let limited = tool.execute(json!({"limit": 0})).await.unwrap();
        assert_eq!(limited.result["count"], 1);

        let err = tool.execute(json!({"status": "archived"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn get_existing_missing_and_malformed() {
        let store = test_store().await;
        let job = seed(&store, "hello", FUTURE_TIME).await;
        let tool = GetScheduledPostTool::new(Arc::clone(&store));

        let output = tool
            .execute(json!({"post_id": job.id.to_string()}))
            .await
            .unwrap();
        assert_eq!(output.result["post"]["content"], "hello");
        assert_eq!(output.result["message"], "Status: pending");

        let missing = tool
            .execute(json!({"post_id": Uuid::new_v4().to_string()}))
            .await
            .unwrap_err();
        assert!(matches!(missing, ToolError::NotFound(_)));

        let malformed = tool
            .execute(json!({"post_id": "not-a-uuid"}))
            .await
            .unwrap_err();
        assert!(matches!(malformed, ToolError::NotFound(_)));
    }

    // ── transitions ─────────────────────────────────────────────────

    #[tokio::test]
    async fn cancel_then_cancel_again() {
        let store = test_store().await;
        let job = seed(&store, "x", FUTURE_TIME).await;
        let tool = CancelScheduledPostTool::new(Arc::clone(&store));
        let params = json!({"post_id": job.id.to_string()});

        let output = tool.execute(params.clone()).await.unwrap();
        assert_eq!(output.result["status"], "cancelled");
        assert_eq!(output.result["success"], true);

        let err = tool.execute(params).await.unwrap_err();
        match err {
            ToolError::NotApplicable(msg) => assert!(msg.contains("not in pending status")),
            other => panic!("expected NotApplicable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_partial_fields() {
        let store = test_store().await;
        let job = seed(&store, "original", FUTURE_TIME).await;
        let tool = UpdateScheduledPostTool::new(Arc::clone(&store));

        let output = tool
            .execute(json!({"post_id": job.id.to_string(), "visibility": "LOGGED_IN"}))
            .await
            .unwrap();
        assert_eq!(output.result["post"]["content"], "original");
        assert_eq!(output.result["post"]["visibility"], "LOGGED_IN");

        let err = tool
            .execute(json!({"post_id": job.id.to_string(), "visibility": "NOBODY"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn update_blank_url_removes_link() {
        let store = test_store().await;
        let job = store
            .create(
                &NewJob::new("linked", parse_timestamp(FUTURE_TIME).unwrap())
                    .with_link("https://example.com"),
            )
            .await
            .unwrap();
        let tool = UpdateScheduledPostTool::new(Arc::clone(&store));

        tool.execute(json!({"post_id": job.id.to_string(), "commentary": "still linked"}))
            .await
            .unwrap();
        assert_eq!(
            store.get(job.id).await.unwrap().unwrap().link.as_deref(),
            Some("https://example.com")
        );

        let output = tool
            .execute(json!({"post_id": job.id.to_string(), "url": ""}))
            .await
            .unwrap();
        assert!(output.result["post"].get("link").is_none());
        assert_eq!(store.get(job.id).await.unwrap().unwrap().link, None);
    }

    #[tokio::test]
    async fn update_published_not_applicable() {
        let store = test_store().await;
        let job = seed(&store, "x", PAST_TIME).await;
        store.mark_published(job.id, "urn:1").await.unwrap();

        let tool = UpdateScheduledPostTool::new(Arc::clone(&store));
        let err = tool
            .execute(json!({"post_id": job.id.to_string(), "commentary": "late edit"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotApplicable(_)));
        assert_eq!(store.get(job.id).await.unwrap().unwrap().content, "x");
    }

    #[tokio::test]
    async fn reschedule_validates_and_applies() {
        let store = test_store().await;
        let job = seed(&store, "x", FUTURE_TIME).await;
        let tool = ReschedulePostTool::new(Arc::clone(&store));

        let output = tool
            .execute(json!({
                "post_id": job.id.to_string(),
                "scheduled_time": "2098-06-01T10:00:00+02:00"
            }))
            .await
            .unwrap();
        assert!(
            output.result["message"]
                .as_str()
                .unwrap()
                .contains("2098-06-01T08:00:00.000000Z")
        );

        let err = tool
            .execute(json!({"post_id": job.id.to_string(), "scheduled_time": PAST_TIME}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn retry_only_failed_posts() {
        let store = test_store().await;
        let job = seed(&store, "x", PAST_TIME).await;
        let tool = RetryFailedPostTool::new(Arc::clone(&store));
        let params = json!({"post_id": job.id.to_string()});

        let err = tool.execute(params.clone()).await.unwrap_err();
        match err {
            ToolError::NotApplicable(msg) => assert!(msg.contains("not in failed status")),
            other => panic!("expected NotApplicable, got {other:?}"),
        }

        store.mark_failed(job.id, "API exploded").await.unwrap();
        let output = tool.execute(params).await.unwrap();
        assert_eq!(output.result["post"]["status"], "pending");
        assert!(output.result["post"].get("error").is_none());
        assert_eq!(output.result["post"]["attempt_count"], 1);
    }

    #[tokio::test]
    async fn retry_rejects_past_time() {
        let store = test_store().await;
        let job = seed(&store, "x", PAST_TIME).await;
        store.mark_failed(job.id, "boom").await.unwrap();

        let tool = RetryFailedPostTool::new(Arc::clone(&store));
        let err = tool
            .execute(json!({"post_id": job.id.to_string(), "scheduled_time": PAST_TIME}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
        assert_eq!(
            store.get(job.id).await.unwrap().unwrap().status,
            JobStatus::Failed
        );
    }

    // ── queue_summary ───────────────────────────────────────────────

    #[tokio::test]
    async fn summary_empty_queue() {
        let store = test_store().await;
        let tool = QueueSummaryTool::new(store);
        let output = tool.execute(json!({})).await.unwrap();

        let text = output.result["summary"].as_str().unwrap();
        assert!(text.starts_with("Queue Summary\n============="));
        assert!(text.contains("Total posts: 0"));
        assert!(text.contains("  cancelled: 0"));
        assert!(text.contains("Next due: none"));
        assert!(text.contains("No recent failures."));
        assert_eq!(output.result["counts"]["failed"], 0);
        assert!(output.result["next_due"].is_null());
    }

    #[tokio::test]
    async fn summary_with_next_due_and_failure() {
        let store = test_store().await;
        let long = "x".repeat(100);
        seed(&store, &long, FUTURE_TIME).await;
        let failed = seed(&store, "broken", PAST_TIME).await;
        store.mark_failed(failed.id, "API exploded").await.unwrap();

        let tool = QueueSummaryTool::new(store);
        let output = tool.execute(json!({})).await.unwrap();
        let text = output.result["summary"].as_str().unwrap();

        assert!(text.contains("Total posts: 2"));
        assert!(text.contains("  pending: 1"));
        assert!(text.contains("  failed: 1"));
        assert!(text.contains("Next due: 2099-12-31T23:59:59.000000Z"));
        assert!(text.contains(&format!("  \"{}...\"", "x".repeat(80))));
        assert!(text.contains(&format!("Most recent failure: {}", failed.id)));
        assert!(text.contains("  Error: API exploded"));
        assert!(text.contains("  Failed attempts: 1"));
        assert_eq!(output.result["recent_failure"]["content"], "broken");
    }

    #[test]
    fn preview_counts_chars_not_bytes() {
        let short = "é".repeat(80);
        assert_eq!(preview(&short), short);
        let long = "é".repeat(81);
        assert_eq!(preview(&long), format!("{}...", "é".repeat(80)));
    }
}
