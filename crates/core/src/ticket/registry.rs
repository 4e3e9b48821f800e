//! Ticket registry trait and errors.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ids::{ChannelId, GuildId, TicketId, UserId};

use super::{Ticket, TicketStatus, Transition};

/// Error type for ticket registry operations.
#[derive(Debug, Error)]
pub enum TicketError {
    /// Ticket not found.
    #[error("ticket not found: {0}")]
    NotFound(TicketId),

    /// The requested transition is not legal from the current status.
    #[error("cannot {operation} ticket {ticket_id}: current status is {status}")]
    InvalidTransition {
        ticket_id: TicketId,
        status: TicketStatus,
        operation: &'static str,
    },

    /// The owner already holds the maximum number of open tickets of this type.
    #[error("user {owner_id} already has {open} open '{ticket_type}' ticket(s) (limit {cap})")]
    CapReached {
        owner_id: UserId,
        ticket_type: String,
        open: u32,
        cap: u32,
    },

    /// Another open ticket already uses this channel.
    #[error("channel {0} is already bound to an open ticket")]
    ChannelInUse(ChannelId),

    /// A ticket with this id already exists.
    #[error("ticket {0} already exists")]
    Duplicate(TicketId),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

impl TicketError {
    /// Conflicts are caused by current state, not by storage failures.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            TicketError::InvalidTransition { .. }
                | TicketError::CapReached { .. }
                | TicketError::ChannelInUse(_)
                | TicketError::Duplicate(_)
        )
    }
}

/// Number of tickets in one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCount {
    pub status: TicketStatus,
    pub count: u64,
}

/// Durable index of tickets.
///
/// Every method is atomic with respect to the others: a reader sees a ticket
/// either before or after a transition, never halfway.
pub trait TicketRegistry: Send + Sync {
    /// Reserve the next ticket number of a guild. Numbers are never reused.
    fn allocate_id(&self, guild_id: GuildId) -> Result<TicketId, TicketError>;

    /// Store a new ticket.
    ///
    /// Fails with `CapReached` if the owner already holds the snapshot's cap
    /// of open tickets of that type, and with `ChannelInUse` if another open
    /// ticket owns the channel. Nothing is written on failure.
    fn insert(&self, ticket: Ticket) -> Result<Ticket, TicketError>;

    /// Get a ticket by id.
    fn get(&self, id: TicketId) -> Result<Ticket, TicketError>;

    /// Open and claimed tickets of a user in a guild, oldest first.
    fn find_open_by_user(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Vec<Ticket>, TicketError>;

    /// Open and claimed tickets of every user in a guild, oldest first.
    fn list_open_in_guild(&self, guild_id: GuildId) -> Result<Vec<Ticket>, TicketError>;

    /// Apply a transition, checking legality against the stored status.
    fn update(&self, id: TicketId, transition: &Transition) -> Result<Ticket, TicketError>;

    /// Record that the ticket's channel no longer exists on the platform.
    fn mark_channel_released(&self, id: TicketId) -> Result<Ticket, TicketError>;

    /// Closed tickets whose archive delay has elapsed at `now`.
    fn list_due_for_archival(&self, now: DateTime<Utc>) -> Result<Vec<Ticket>, TicketError>;

    /// Archived tickets whose delete delay has elapsed at `now`.
    fn list_due_for_deletion(&self, now: DateTime<Utc>) -> Result<Vec<Ticket>, TicketError>;

    /// Deleted tickets whose channel still has to be removed.
    fn list_pending_channel_release(&self) -> Result<Vec<Ticket>, TicketError>;

    /// Ticket counts for every status, including zeroes.
    fn count_by_status(&self) -> Result<Vec<StatusCount>, TicketError>;
}
