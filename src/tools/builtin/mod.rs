//! Built-in tools for managing the post schedule.

pub mod scheduling;
