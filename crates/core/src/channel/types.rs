//! Types exchanged with the chat platform.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{RoleId, UserId};

/// Discord's limit on channel name length.
pub const MAX_CHANNEL_NAME_LEN: usize = 100;

/// Who may see a newly created ticket channel.
///
/// Everyone else is denied view access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAccess {
    pub owner_id: UserId,
    pub staff_role_ids: Vec<RoleId>,
}

/// A guild member as seen by the ticket system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    pub display_name: String,
    #[serde(default)]
    pub role_ids: Vec<RoleId>,
}

impl Member {
    pub fn has_any_role(&self, roles: &[RoleId]) -> bool {
        self.role_ids.iter().any(|role| roles.contains(role))
    }
}

/// A message read back from a ticket channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub author_id: UserId,
    pub author_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Attachment URLs.
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Number of embeds on the message.
    #[serde(default)]
    pub embed_count: usize,
}

/// Reduce free text to a channel-name fragment: lowercase ASCII letters,
/// digits and single dashes.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Channel name of a fresh ticket, e.g. `support-0042`.
pub fn ticket_channel_name(type_name: &str, number: u64) -> String {
    format!("{}-{:04}", slugify(type_name), number)
}

/// Channel name once a staff member claimed the ticket, e.g.
/// `support-0042-alice`.
pub fn claimed_channel_name(type_name: &str, number: u64, claimer: &str) -> String {
    let base = ticket_channel_name(type_name, number);
    let claimer = slugify(claimer);
    if claimer.is_empty() {
        return base;
    }

    let mut name = format!("{}-{}", base, claimer);
    name.truncate(MAX_CHANNEL_NAME_LEN);
    name.trim_end_matches('-').to_string()
}
