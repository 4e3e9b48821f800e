//! Per-guild ticket configuration.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::ids::{CategoryId, ChannelId, GuildId, RoleId};

/// Upper bound for per-user open ticket caps.
pub const MAX_OPEN_TICKETS_LIMIT: u32 = 10;

/// Longest accepted ticket type name (it ends up in channel names).
pub const MAX_TYPE_NAME_LEN: usize = 32;

/// Ticket configuration for a single guild.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuildTicketConfig {
    pub guild_id: GuildId,

    /// When false, no new tickets can be created in this guild.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Ticket types offered to users, in display order.
    #[serde(default)]
    pub ticket_types: Vec<TicketTypeDef>,

    /// Guild-wide staff roles. Merged into every type's staff list when a
    /// ticket is created.
    #[serde(default)]
    pub staff_role_ids: Vec<RoleId>,

    /// Default cap on concurrently open tickets per user and ticket type.
    #[serde(default = "default_max_open")]
    pub max_open_per_user: u32,

    /// Seconds after closing before a ticket is archived.
    #[serde(default = "default_archive_delay")]
    pub archive_delay_secs: u64,

    /// Seconds after closing before an archived ticket is deleted.
    #[serde(default = "default_delete_delay")]
    pub delete_delay_secs: u64,

    /// Category archived ticket channels are moved to. Without one the
    /// channel is locked in place.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_category_id: Option<CategoryId>,

    /// Channel that receives a copy of lifecycle notices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_channel_id: Option<ChannelId>,

    /// Snapshot the channel history when archiving.
    #[serde(default = "default_true")]
    pub transcripts_enabled: bool,

    /// Allow closed tickets to be reopened.
    #[serde(default = "default_true")]
    pub reopen_allowed: bool,

    /// Stop the owner from posting once a ticket is closed.
    #[serde(default = "default_true")]
    pub lock_on_close: bool,
}

/// A named kind of ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketTypeDef {
    /// Slug used in commands and channel names (e.g. `support`).
    pub name: String,

    /// Human-friendly label (e.g. `Bug Report`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Category new ticket channels are created under.
    pub category_id: CategoryId,

    /// Roles allowed to claim and manage tickets of this type.
    #[serde(default)]
    pub staff_role_ids: Vec<RoleId>,

    /// Greeting posted in a new ticket. Supports `{user}`, `{type}` and
    /// `{ticket}` placeholders; empty uses the built-in greeting.
    #[serde(default)]
    pub welcome_template: String,

    /// Per-type cap override. Set above 1 to let users hold several tickets
    /// of this type at once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_open_per_user: Option<u32>,

    /// Mention the staff roles when a ticket of this type is opened.
    #[serde(default)]
    pub staff_ping: bool,
}

fn default_true() -> bool {
    true
}

fn default_max_open() -> u32 {
    1
}

fn default_archive_delay() -> u64 {
    24 * 60 * 60 // 1 day
}

fn default_delete_delay() -> u64 {
    7 * 24 * 60 * 60 // 1 week
}

impl GuildTicketConfig {
    /// A config with defaults and no ticket types.
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            enabled: true,
            ticket_types: Vec::new(),
            staff_role_ids: Vec::new(),
            max_open_per_user: default_max_open(),
            archive_delay_secs: default_archive_delay(),
            delete_delay_secs: default_delete_delay(),
            archive_category_id: None,
            log_channel_id: None,
            transcripts_enabled: true,
            reopen_allowed: true,
            lock_on_close: true,
        }
    }

    /// Add a ticket type.
    pub fn with_ticket_type(mut self, ticket_type: TicketTypeDef) -> Self {
        self.ticket_types.push(ticket_type);
        self
    }

    /// Add a guild-wide staff role.
    pub fn with_staff_role(mut self, role_id: RoleId) -> Self {
        self.staff_role_ids.push(role_id);
        self
    }

    /// Set the default per-user cap.
    pub fn with_max_open_per_user(mut self, max: u32) -> Self {
        self.max_open_per_user = max;
        self
    }

    /// Set archive and delete delays.
    pub fn with_retention(mut self, archive_delay_secs: u64, delete_delay_secs: u64) -> Self {
        self.archive_delay_secs = archive_delay_secs;
        self.delete_delay_secs = delete_delay_secs;
        self
    }

    /// Look up a ticket type by name.
    pub fn ticket_type(&self, name: &str) -> Option<&TicketTypeDef> {
        self.ticket_types.iter().find(|t| t.name == name)
    }

    /// Effective open-ticket cap for a type.
    pub fn open_cap_for(&self, ticket_type: &TicketTypeDef) -> u32 {
        ticket_type
            .max_open_per_user
            .unwrap_or(self.max_open_per_user)
    }

    /// Staff roles for a type merged with the guild-wide staff roles.
    pub fn staff_roles_for(&self, ticket_type: &TicketTypeDef) -> Vec<RoleId> {
        let mut roles = ticket_type.staff_role_ids.clone();
        for role in &self.staff_role_ids {
            if !roles.contains(role) {
                roles.push(*role);
            }
        }
        roles
    }

    /// Retention delays of this guild.
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            archive_delay_secs: self.archive_delay_secs,
            delete_delay_secs: self.delete_delay_secs,
        }
    }

    /// Check the config for structural problems.
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.guild_id.0 == 0 {
            return Err("guild_id cannot be 0".to_string());
        }

        if !(1..=MAX_OPEN_TICKETS_LIMIT).contains(&self.max_open_per_user) {
            return Err(format!(
                "max_open_per_user must be between 1 and {}",
                MAX_OPEN_TICKETS_LIMIT
            ));
        }

        if self.delete_delay_secs < self.archive_delay_secs {
            return Err("delete_delay_secs cannot be shorter than archive_delay_secs".to_string());
        }

        if matches!(self.archive_category_id, Some(CategoryId(0))) {
            return Err("archive_category_id cannot be 0".to_string());
        }

        if matches!(self.log_channel_id, Some(ChannelId(0))) {
            return Err("log_channel_id cannot be 0".to_string());
        }

        let mut seen = HashSet::new();
        for ticket_type in &self.ticket_types {
            ticket_type.validate()?;
            if !seen.insert(ticket_type.name.as_str()) {
                return Err(format!("duplicate ticket type name: {}", ticket_type.name));
            }
        }

        Ok(())
    }
}

impl TicketTypeDef {
    pub fn new(name: impl Into<String>, category_id: CategoryId) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            category_id,
            staff_role_ids: Vec::new(),
            welcome_template: String::new(),
            max_open_per_user: None,
            staff_ping: false,
        }
    }

    pub fn with_staff_role(mut self, role_id: RoleId) -> Self {
        self.staff_role_ids.push(role_id);
        self
    }

    pub fn with_welcome(mut self, template: impl Into<String>) -> Self {
        self.welcome_template = template.into();
        self
    }

    pub fn with_max_open(mut self, max: u32) -> Self {
        self.max_open_per_user = Some(max);
        self
    }

    /// Label shown to users.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("ticket type name cannot be empty".to_string());
        }
        if self.name.len() > MAX_TYPE_NAME_LEN {
            return Err(format!(
                "ticket type name '{}' is longer than {} characters",
                self.name, MAX_TYPE_NAME_LEN
            ));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(format!(
                "ticket type name '{}' may only contain a-z, 0-9, '-' and '_'",
                self.name
            ));
        }
        if self.category_id.0 == 0 {
            return Err(format!(
                "ticket type '{}' has an empty category reference",
                self.name
            ));
        }
        if let Some(max) = self.max_open_per_user {
            if !(1..=MAX_OPEN_TICKETS_LIMIT).contains(&max) {
                return Err(format!(
                    "ticket type '{}': max_open_per_user must be between 1 and {}",
                    self.name, MAX_OPEN_TICKETS_LIMIT
                ));
            }
        }
        Ok(())
    }
}

/// How long closed tickets linger before archival and deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    #[serde(default = "default_archive_delay")]
    pub archive_delay_secs: u64,
    #[serde(default = "default_delete_delay")]
    pub delete_delay_secs: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            archive_delay_secs: default_archive_delay(),
            delete_delay_secs: default_delete_delay(),
        }
    }
}
