//! Guild config storage trait and errors.

use thiserror::Error;

use crate::ids::GuildId;

use super::GuildTicketConfig;

/// Error type for guild config operations.
#[derive(Debug, Error)]
pub enum ConfigStoreError {
    /// No config stored for the guild.
    #[error("no ticket configuration for guild {0}")]
    NotFound(GuildId),

    /// The config was rejected before anything was written.
    #[error("invalid ticket configuration: {0}")]
    Validation(String),

    /// Storage failure.
    #[error("database error: {0}")]
    Database(String),
}

/// Trait for guild config storage backends.
///
/// Reads reflect the most recent completed write for the guild.
pub trait ConfigStore: Send + Sync {
    /// Get the config of a guild.
    fn get(&self, guild_id: GuildId) -> Result<GuildTicketConfig, ConfigStoreError>;

    /// Insert or replace the config of a guild after validating it.
    fn upsert(&self, config: GuildTicketConfig) -> Result<GuildTicketConfig, ConfigStoreError>;

    /// Remove the config of a guild.
    fn delete(&self, guild_id: GuildId) -> Result<(), ConfigStoreError>;

    /// All guilds that have a config.
    fn list_guilds(&self) -> Result<Vec<GuildId>, ConfigStoreError>;
}
