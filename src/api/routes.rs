use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use crate::server::{api_key_auth, AppState};
use crate::triggers::submit_event;

use super::health::{health, stats};
use super::metrics::prometheus_metrics;
use super::notifications::{
    delete_notification, list_notifications, mark_all_read, mark_read, unread_count,
};
use super::preferences::{get_preferences, replace_preferences, reset_preferences};

pub fn api_routes(state: &AppState) -> Router<AppState> {
    // Producer ingestion sits behind the shared API key
    let producer = Router::new()
        .route("/events", post(submit_event))
        .route_layer(middleware::from_fn_with_state(state.clone(), api_key_auth));

    Router::new()
        // Health, stats & metrics
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api/v1",
            Router::new()
                // Preferences
                .route(
                    "/preferences",
                    get(get_preferences).put(replace_preferences),
                )
                .route("/preferences/reset", post(reset_preferences))
                // Notification history
                .route("/notifications", get(list_notifications))
                .route("/notifications/unread-count", get(unread_count))
                .route("/notifications/read-all", patch(mark_all_read))
                .route("/notifications/{id}/read", patch(mark_read))
                .route("/notifications/{id}", delete(delete_notification))
                .merge(producer),
        )
}
