//! Tickets, their status transitions and the registry that persists them.

mod registry;
mod sqlite_registry;
mod types;

pub use registry::{StatusCount, TicketError, TicketRegistry};
pub use sqlite_registry::SqliteTicketRegistry;
pub use types::{Ticket, TicketStatus, TicketTypeSnapshot, Transition};
