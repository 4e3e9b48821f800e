//! Archival scheduler API handlers.

use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::info;
use warden_core::{CycleReport, SchedulerStatus};

use crate::state::AppState;

/// Get scheduler status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    Json(state.scheduler().status().await)
}

/// Run one archival cycle now, whether or not the background loop is running
pub async fn run_now(State(state): State<Arc<AppState>>) -> Json<CycleReport> {
    info!("Archival cycle requested through the API");
    Json(state.scheduler().run_cycle_now().await)
}
