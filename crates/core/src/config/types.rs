use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::channel::RetryPolicy;
use crate::guild_config::RetentionPolicy;
use crate::scheduler::SchedulerConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub channel_retry: RetryPolicy,
    /// Fallback delays for tickets whose guild has no config any more.
    #[serde(default)]
    pub retention: RetentionPolicy,
    #[serde(default)]
    pub transcripts: TranscriptConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("warden.db")
}

/// HTTP API access control
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Bearer key required on every route except `/health`. Unset means open.
    #[serde(default)]
    pub key: Option<String>,
}

/// Discord REST client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordConfig {
    /// Bot token, sent as `Authorization: Bot <token>`
    pub bot_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Per-request timeout in seconds (default: 10)
    #[serde(default = "default_discord_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_discord_timeout() -> u64 {
    10
}

/// Transcript storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptConfig {
    #[serde(default = "default_transcript_dir")]
    pub directory: PathBuf,
    /// Upper bound on messages captured per transcript
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            directory: default_transcript_dir(),
            max_messages: default_max_messages(),
        }
    }
}

fn default_transcript_dir() -> PathBuf {
    PathBuf::from("transcripts")
}

fn default_max_messages() -> usize {
    1000
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: SanitizedApiConfig,
    pub discord: SanitizedDiscordConfig,
    pub scheduler: SchedulerConfig,
    pub channel_retry: RetryPolicy,
    pub retention: RetentionPolicy,
    pub transcripts: TranscriptConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedApiConfig {
    pub key_configured: bool,
}

/// Sanitized Discord config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDiscordConfig {
    pub api_base: String,
    pub bot_token_configured: bool,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            api: SanitizedApiConfig {
                key_configured: config.api.key.as_ref().is_some_and(|k| !k.is_empty()),
            },
            discord: SanitizedDiscordConfig {
                api_base: config.discord.api_base.clone(),
                bot_token_configured: !config.discord.bot_token.is_empty(),
                timeout_secs: config.discord.timeout_secs,
            },
            scheduler: config.scheduler.clone(),
            channel_retry: config.channel_retry.clone(),
            retention: config.retention,
            transcripts: config.transcripts.clone(),
        }
    }
}
