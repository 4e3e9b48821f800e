//! Platform identifiers.
//!
//! Guilds, users, channels, roles and categories are all snowflakes on the
//! chat platform. Each gets its own newtype so a channel can never be passed
//! where a role is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Value as stored in SQLite (snowflakes fit in 63 bits).
            pub fn as_i64(self) -> i64 {
                self.0 as i64
            }

            /// Build from a SQLite integer column.
            pub fn from_i64(value: i64) -> Self {
                Self(value as u64)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    };
}

snowflake!(
    /// A community (server) the bot serves.
    GuildId
);
snowflake!(
    /// A platform user.
    UserId
);
snowflake!(
    /// A text channel.
    ChannelId
);
snowflake!(
    /// A guild role.
    RoleId
);
snowflake!(
    /// A channel category that ticket channels are created under.
    CategoryId
);

/// Ticket identifier: the guild plus a per-guild sequence number.
///
/// Rendered as `"<guild>-<number>"`, which is also its serialized form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TicketId {
    pub guild_id: GuildId,
    pub number: u64,
}

impl TicketId {
    pub fn new(guild_id: GuildId, number: u64) -> Self {
        Self { guild_id, number }
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.guild_id, self.number)
    }
}

/// Error parsing a [`TicketId`] from its string form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ticket id: {0}")]
pub struct ParseTicketIdError(pub String);

impl FromStr for TicketId {
    type Err = ParseTicketIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (guild, number) = s
            .split_once('-')
            .ok_or_else(|| ParseTicketIdError(s.to_string()))?;
        let guild_id = guild
            .parse()
            .map_err(|_| ParseTicketIdError(s.to_string()))?;
        let number = number
            .parse()
            .map_err(|_| ParseTicketIdError(s.to_string()))?;
        Ok(Self { guild_id, number })
    }
}

impl From<TicketId> for String {
    fn from(id: TicketId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for TicketId {
    type Error = ParseTicketIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_id_display_and_parse() {
        let id = TicketId::new(GuildId(42), 7);
        assert_eq!(id.to_string(), "42-7");
        assert_eq!("42-7".parse::<TicketId>().unwrap(), id);
    }

    #[test]
    fn test_ticket_id_rejects_garbage() {
        assert!("42".parse::<TicketId>().is_err());
        assert!("abc-1".parse::<TicketId>().is_err());
        assert!("1-".parse::<TicketId>().is_err());
    }

    #[test]
    fn test_ticket_id_serializes_as_string() {
        let id = TicketId::new(GuildId(900), 12);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"900-12\"");
        let back: TicketId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_snowflake_sqlite_round_trip() {
        let user = UserId(796_687_533_114_523_648);
        assert_eq!(UserId::from_i64(user.as_i64()), user);
    }
}
