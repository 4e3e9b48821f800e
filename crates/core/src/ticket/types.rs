//! Ticket records and the transition rules between their statuses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::guild_config::{GuildTicketConfig, TicketTypeDef};
use crate::ids::{CategoryId, ChannelId, RoleId, TicketId, UserId};

use super::TicketError;

/// Lifecycle status of a ticket.
///
/// Statuses only move forward, except for the explicit
/// `Closed -> Open` reopen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Claimed,
    Closed,
    Archived,
    Deleted,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 5] = [
        TicketStatus::Open,
        TicketStatus::Claimed,
        TicketStatus::Closed,
        TicketStatus::Archived,
        TicketStatus::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Claimed => "claimed",
            TicketStatus::Closed => "closed",
            TicketStatus::Archived => "archived",
            TicketStatus::Deleted => "deleted",
        }
    }

    /// Open or Claimed: counts against the per-user cap and owns its channel.
    pub fn is_open(&self) -> bool {
        matches!(self, TicketStatus::Open | TicketStatus::Claimed)
    }

    /// Statuses that carry a `closed_at` timestamp.
    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown ticket status: {}", s))
    }
}

/// Ticket type settings frozen onto a ticket when it is created.
///
/// Later config edits do not change who may claim an existing ticket or
/// what cap it was opened under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketTypeSnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub category_id: CategoryId,
    /// Type staff roles merged with the guild-wide staff roles.
    pub staff_role_ids: Vec<RoleId>,
    #[serde(default)]
    pub welcome_template: String,
    #[serde(default)]
    pub staff_ping: bool,
    /// Per-user cap in force at creation.
    pub open_cap: u32,
}

impl TicketTypeSnapshot {
    /// Resolve a type definition against its guild config.
    pub fn resolve(config: &GuildTicketConfig, def: &TicketTypeDef) -> Self {
        Self {
            name: def.name.clone(),
            display_name: def.display_name.clone(),
            category_id: def.category_id,
            staff_role_ids: config.staff_roles_for(def),
            welcome_template: def.welcome_template.clone(),
            staff_ping: def.staff_ping,
            open_cap: config.open_cap_for(def),
        }
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// True if any of `roles` is a staff role for this type.
    pub fn is_staff(&self, roles: &[RoleId]) -> bool {
        roles.iter().any(|role| self.staff_role_ids.contains(role))
    }
}

/// A support ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,

    /// User who opened the ticket.
    pub owner_id: UserId,

    pub ticket_type: TicketTypeSnapshot,

    /// Dedicated channel of this ticket.
    pub channel_id: ChannelId,

    pub status: TicketStatus,

    pub created_at: DateTime<Utc>,

    /// Set on close, cleared on reopen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<UserId>,

    /// Where the transcript was stored at archival, if one was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,

    /// The channel has been deleted on the platform.
    #[serde(default)]
    pub channel_released: bool,

    pub updated_at: DateTime<Utc>,
}

/// A requested status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Claim { by: UserId, at: DateTime<Utc> },
    Close { at: DateTime<Utc> },
    Reopen { at: DateTime<Utc> },
    Archive {
        transcript: Option<String>,
        at: DateTime<Utc>,
    },
    Delete { at: DateTime<Utc> },
}

impl Transition {
    /// Operation name used in logs, errors and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Claim { .. } => "claim",
            Transition::Close { .. } => "close",
            Transition::Reopen { .. } => "reopen",
            Transition::Archive { .. } => "archive",
            Transition::Delete { .. } => "delete",
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Transition::Claim { at, .. }
            | Transition::Close { at }
            | Transition::Reopen { at }
            | Transition::Archive { at, .. }
            | Transition::Delete { at } => *at,
        }
    }

    fn allowed_from(&self) -> &'static [TicketStatus] {
        match self {
            Transition::Claim { .. } => &[TicketStatus::Open],
            Transition::Close { .. } => &[TicketStatus::Open, TicketStatus::Claimed],
            Transition::Reopen { .. } => &[TicketStatus::Closed],
            Transition::Archive { .. } => &[TicketStatus::Closed],
            Transition::Delete { .. } => &[TicketStatus::Archived],
        }
    }
}

impl Ticket {
    /// A freshly opened ticket.
    pub fn new(
        id: TicketId,
        owner_id: UserId,
        ticket_type: TicketTypeSnapshot,
        channel_id: ChannelId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            ticket_type,
            channel_id,
            status: TicketStatus::Open,
            created_at: now,
            closed_at: None,
            claimed_by: None,
            transcript: None,
            channel_released: false,
            updated_at: now,
        }
    }

    /// Compute the ticket after `transition`.
    ///
    /// Pure: an illegal transition returns an error and `self` is untouched.
    pub fn apply(&self, transition: &Transition) -> Result<Ticket, TicketError> {
        if !transition.allowed_from().contains(&self.status) {
            return Err(TicketError::InvalidTransition {
                ticket_id: self.id,
                status: self.status,
                operation: transition.name(),
            });
        }

        let mut next = self.clone();
        next.updated_at = transition.at();

        match transition {
            Transition::Claim { by, .. } => {
                next.status = TicketStatus::Claimed;
                next.claimed_by = Some(*by);
            }
            Transition::Close { at } => {
                next.status = TicketStatus::Closed;
                next.closed_at = Some(*at);
            }
            Transition::Reopen { .. } => {
                next.status = TicketStatus::Open;
                next.closed_at = None;
                next.claimed_by = None;
            }
            Transition::Archive { transcript, .. } => {
                next.status = TicketStatus::Archived;
                next.transcript = transcript.clone();
            }
            Transition::Delete { .. } => {
                next.status = TicketStatus::Deleted;
            }
        }

        Ok(next)
    }

    /// Owner, claimer, or a holder of one of the ticket's staff roles.
    pub fn is_participant(&self, user_id: UserId, roles: &[RoleId]) -> bool {
        self.owner_id == user_id
            || self.claimed_by == Some(user_id)
            || self.ticket_type.is_staff(roles)
    }
}
