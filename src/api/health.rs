//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::connection_manager::ConnectionStats;
use crate::digest::DigestQueueStats;
use crate::notification::DispatcherStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub repository: String,
    pub outbound: String,
    pub connections: ConnectionStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub connections: ConnectionStats,
    pub dispatcher: DispatcherStatsSnapshot,
    pub digest: DigestQueueStats,
    /// Users with stored (non-default) preferences
    pub users_with_preferences: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        repository: state.repository.backend_type().to_string(),
        outbound: state.outbound.name().to_string(),
        connections: state.connection_manager.stats(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        connections: state.connection_manager.stats(),
        dispatcher: state.dispatcher.stats(),
        digest: state.digest_queue.stats(),
        users_with_preferences: state.preferences.len(),
    })
}
