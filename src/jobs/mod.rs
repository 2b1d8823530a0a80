//! Scheduled post jobs.

pub mod model;

pub use model::{
    Job, JobStatus, JobUpdate, NewJob, QueueSummary, StatusCounts, Transition, Visibility,
};
