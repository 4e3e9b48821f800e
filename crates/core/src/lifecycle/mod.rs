//! Ticket lifecycle: user commands and scheduler-driven transitions.

mod config;
mod engine;
mod error;

pub use config::EngineConfig;
pub use engine::{Collaborators, TicketLifecycleEngine, TranscriptSnapshot};
pub use error::{ErrorKind, LifecycleError};
