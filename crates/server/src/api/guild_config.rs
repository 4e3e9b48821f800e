//! Guild ticket configuration handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use warden_core::{GuildId, GuildTicketConfig};

use super::error::{parse_path, ApiError};
use crate::state::AppState;

pub async fn get_guild_config(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<String>,
) -> Result<Json<GuildTicketConfig>, ApiError> {
    let guild_id: GuildId = parse_path("guild id", &guild_id)?;
    Ok(Json(state.engine().get_config(guild_id)?))
}

/// Replace a guild's ticket configuration
pub async fn put_guild_config(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<String>,
    Json(config): Json<GuildTicketConfig>,
) -> Result<Json<GuildTicketConfig>, ApiError> {
    let guild_id: GuildId = parse_path("guild id", &guild_id)?;
    let stored = state
        .engine()
        .handle_config_update(guild_id, config)
        .await?;
    Ok(Json(stored))
}

pub async fn delete_guild_config(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let guild_id: GuildId = parse_path("guild id", &guild_id)?;
    state.engine().handle_config_delete(guild_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
