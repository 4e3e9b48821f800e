//! Ticket API handlers.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warden_core::{GuildId, Ticket, TicketId, TicketStatus, UserId};

use super::error::{parse_path, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for opening a ticket
#[derive(Debug, Deserialize)]
pub struct CreateTicketBody {
    pub user_id: UserId,
    pub ticket_type: String,
}

/// Request body for claim, close and reopen
#[derive(Debug, Deserialize)]
pub struct ActorBody {
    pub actor_id: UserId,
}

/// Request body for adding a user to a ticket
#[derive(Debug, Deserialize)]
pub struct AddMemberBody {
    pub actor_id: UserId,
    pub user_id: UserId,
}

/// Response for ticket operations
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub id: String,
    pub guild_id: GuildId,
    pub number: u64,
    pub owner_id: UserId,
    pub ticket_type: String,
    pub ticket_type_label: String,
    pub channel_id: String,
    pub status: TicketStatus,
    pub created_at: String,
    pub closed_at: Option<String>,
    pub claimed_by: Option<UserId>,
    pub transcript: Option<String>,
    pub channel_released: bool,
    pub updated_at: String,
}

impl From<Ticket> for TicketResponse {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id.to_string(),
            guild_id: ticket.id.guild_id,
            number: ticket.id.number,
            owner_id: ticket.owner_id,
            ticket_type_label: ticket.ticket_type.label().to_string(),
            ticket_type: ticket.ticket_type.name,
            channel_id: ticket.channel_id.to_string(),
            status: ticket.status,
            created_at: ticket.created_at.to_rfc3339(),
            closed_at: ticket.closed_at.map(|at| at.to_rfc3339()),
            claimed_by: ticket.claimed_by,
            transcript: ticket.transcript,
            channel_released: ticket.channel_released,
            updated_at: ticket.updated_at.to_rfc3339(),
        }
    }
}

/// Response for listing a user's open tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<TicketResponse>,
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Open a ticket
pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<String>,
    Json(body): Json<CreateTicketBody>,
) -> Result<(StatusCode, Json<TicketResponse>), ApiError> {
    let guild_id: GuildId = parse_path("guild id", &guild_id)?;
    let ticket = state
        .engine()
        .handle_create(guild_id, body.user_id, body.ticket_type.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(ticket.into())))
}

/// Get a ticket by ID
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
) -> Result<Json<TicketResponse>, ApiError> {
    let ticket_id: TicketId = parse_path("ticket id", &ticket_id)?;
    Ok(Json(state.engine().get_ticket(ticket_id)?.into()))
}

/// List a user's open and claimed tickets in a guild
pub async fn list_user_tickets(
    State(state): State<Arc<AppState>>,
    Path((guild_id, user_id)): Path<(String, String)>,
) -> Result<Json<ListTicketsResponse>, ApiError> {
    let guild_id: GuildId = parse_path("guild id", &guild_id)?;
    let user_id: UserId = parse_path("user id", &user_id)?;

    let tickets: Vec<TicketResponse> = state
        .engine()
        .open_tickets_for(guild_id, user_id)?
        .into_iter()
        .map(TicketResponse::from)
        .collect();

    Ok(Json(ListTicketsResponse {
        total: tickets.len(),
        tickets,
    }))
}

pub async fn claim_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Result<Json<TicketResponse>, ApiError> {
    let ticket_id: TicketId = parse_path("ticket id", &ticket_id)?;
    let ticket = state.engine().handle_claim(ticket_id, body.actor_id).await?;
    Ok(Json(ticket.into()))
}

pub async fn close_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Result<Json<TicketResponse>, ApiError> {
    let ticket_id: TicketId = parse_path("ticket id", &ticket_id)?;
    let ticket = state.engine().handle_close(ticket_id, body.actor_id).await?;
    Ok(Json(ticket.into()))
}

pub async fn reopen_ticket(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Result<Json<TicketResponse>, ApiError> {
    let ticket_id: TicketId = parse_path("ticket id", &ticket_id)?;
    let ticket = state
        .engine()
        .handle_reopen(ticket_id, body.actor_id)
        .await?;
    Ok(Json(ticket.into()))
}

/// Give another user access to the ticket channel
pub async fn add_member(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
    Json(body): Json<AddMemberBody>,
) -> Result<Json<TicketResponse>, ApiError> {
    let ticket_id: TicketId = parse_path("ticket id", &ticket_id)?;
    let ticket = state
        .engine()
        .handle_add_member(ticket_id, body.actor_id, body.user_id)
        .await?;
    Ok(Json(ticket.into()))
}

/// Download the archived transcript of a ticket as plain text
pub async fn get_transcript(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket_id: TicketId = parse_path("ticket id", &ticket_id)?;
    let ticket = state.engine().get_ticket(ticket_id)?;
    let pointer = ticket
        .transcript
        .ok_or_else(|| ApiError::not_found(format!("transcript of ticket {}", ticket_id)))?;

    let text = state.engine().transcripts().load(&pointer).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text,
    ))
}

/// Render the current channel history of a ticket as an HTML download
pub async fn create_transcript(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket_id: TicketId = parse_path("ticket id", &ticket_id)?;
    let snapshot = state
        .engine()
        .handle_transcript(ticket_id, body.actor_id)
        .await?;

    let disposition = format!("attachment; filename=\"{}\"", snapshot.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        snapshot.html,
    ))
}

/// Close the open tickets of a guild whose channel was deleted by hand
pub async fn cleanup_ghost_tickets(
    State(state): State<Arc<AppState>>,
    Path(guild_id): Path<String>,
) -> Result<Json<ListTicketsResponse>, ApiError> {
    let guild_id: GuildId = parse_path("guild id", &guild_id)?;
    let tickets: Vec<TicketResponse> = state
        .engine()
        .handle_cleanup_ghosts(guild_id)
        .await?
        .into_iter()
        .map(TicketResponse::from)
        .collect();

    Ok(Json(ListTicketsResponse {
        total: tickets.len(),
        tickets,
    }))
}
