//! Archival scheduler.
//!
//! Periodically moves closed tickets through archival and deletion:
//! - **Archive**: Closed tickets past their guild's archive delay
//! - **Delete**: Archived tickets past the delete delay
//! - **Release**: channels of deleted tickets whose removal failed earlier

mod config;
mod runner;
mod types;

pub use config::SchedulerConfig;
pub use runner::ArchivalScheduler;
pub use types::{BackoffEntry, CycleReport, Phase, SchedulerError, SchedulerStatus};
