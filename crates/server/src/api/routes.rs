use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::{api_key_middleware, metrics_middleware};
use super::{guild_config, handlers, scheduler, tickets};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/config", get(handlers::get_config))
        .route("/metrics", get(handlers::metrics))
        // Guild configuration
        .route(
            "/guilds/{guild_id}/config",
            get(guild_config::get_guild_config)
                .put(guild_config::put_guild_config)
                .delete(guild_config::delete_guild_config),
        )
        // Tickets
        .route("/guilds/{guild_id}/tickets", post(tickets::create_ticket))
        .route(
            "/guilds/{guild_id}/tickets/cleanup",
            post(tickets::cleanup_ghost_tickets),
        )
        .route(
            "/guilds/{guild_id}/users/{user_id}/tickets",
            get(tickets::list_user_tickets),
        )
        .route("/tickets/{ticket_id}", get(tickets::get_ticket))
        .route("/tickets/{ticket_id}/claim", post(tickets::claim_ticket))
        .route("/tickets/{ticket_id}/close", post(tickets::close_ticket))
        .route("/tickets/{ticket_id}/reopen", post(tickets::reopen_ticket))
        .route("/tickets/{ticket_id}/members", post(tickets::add_member))
        .route(
            "/tickets/{ticket_id}/transcript",
            get(tickets::get_transcript).post(tickets::create_transcript),
        )
        // Archival scheduler
        .route("/scheduler", get(scheduler::get_status))
        .route("/scheduler/run", post(scheduler::run_now))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
