use super::{types::Config, ConfigError};

/// Semantic checks serde cannot express.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.discord.bot_token.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "discord.bot_token cannot be empty".to_string(),
        ));
    }

    if !config.discord.api_base.starts_with("http://")
        && !config.discord.api_base.starts_with("https://")
    {
        return Err(ConfigError::ValidationError(format!(
            "discord.api_base must be an http(s) URL, got '{}'",
            config.discord.api_base
        )));
    }

    if config.scheduler.interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.interval_secs cannot be 0".to_string(),
        ));
    }

    if config.channel_retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "channel_retry.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.retention.delete_delay_secs == 0 {
        return Err(ConfigError::ValidationError(
            "retention.delete_delay_secs cannot be 0".to_string(),
        ));
    }

    if config.transcripts.max_messages == 0 {
        return Err(ConfigError::ValidationError(
            "transcripts.max_messages cannot be 0".to_string(),
        ));
    }

    Ok(())
}
