//! Error types for the post scheduler.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by a publish capability.
///
/// Every variant is caught per job by the dispatcher and recorded on the job.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("No credentials available: {0}")]
    MissingCredentials(String),

    #[error("Publish request failed: {0}")]
    RequestFailed(String),

    #[error("Publish rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid publish response: {0}")]
    InvalidResponse(String),

    #[error("Publish request timed out after {0:?}")]
    Timeout(Duration),
}

/// Caller-supplied input that is rejected before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("scheduled_time must be in the future")]
    NotInFuture,

    #[error("Invalid visibility '{0}': expected PUBLIC, CONNECTIONS, LOGGED_IN, or CONTAINER")]
    InvalidVisibility(String),

    #[error("Invalid status '{0}': expected pending, published, failed, or cancelled")]
    InvalidStatus(String),

    #[error("Post content must not be empty")]
    EmptyContent,
}
