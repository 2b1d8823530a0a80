//! LinkedIn post scheduler: durable job queue and dispatch loop.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod jobs;
pub mod publisher;
pub mod store;
pub mod tools;
