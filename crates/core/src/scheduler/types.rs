//! Types for the archival scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::TicketId;
use crate::ticket::TicketError;

/// Errors that stop a whole scheduler phase.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Listing the tickets of a phase failed.
    #[error("failed to list tickets for {phase}: {source}")]
    Listing {
        phase: Phase,
        #[source]
        source: TicketError,
    },
}

/// One step of a scheduler cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Archive,
    Delete,
    Release,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Archive => "archive",
            Phase::Delete => "delete",
            Phase::Release => "release",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one scheduler cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: Option<DateTime<Utc>>,
    /// Tickets moved to Archived.
    pub archived: usize,
    /// Tickets moved to Deleted.
    pub deleted: usize,
    /// Channels removed for already deleted tickets.
    pub released: usize,
    /// Tickets that failed and were put in backoff.
    pub failed: usize,
    /// Tickets left alone: still in backoff, or changed since they were listed.
    pub skipped: usize,
    /// Whether the cycle stopped early on shutdown.
    pub interrupted: bool,
}

impl CycleReport {
    pub fn processed(&self) -> usize {
        self.archived + self.deleted + self.released
    }
}

/// A ticket waiting out its retry delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffEntry {
    pub ticket_id: TicketId,
    pub phase: Phase,
    pub failures: u32,
    pub retry_at: DateTime<Utc>,
    pub last_error: String,
}

/// Current status of the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Whether the background loop is running.
    pub running: bool,
    pub interval_secs: u64,
    pub last_cycle: Option<CycleReport>,
    pub backoff: Vec<BackoffEntry>,
}
