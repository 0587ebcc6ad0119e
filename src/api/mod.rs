//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod metrics;
mod notifications;
mod preferences;
mod routes;

// Re-export all handlers for use in server/app.rs
pub use health::{health, stats, HealthResponse, StatsResponse};
pub use metrics::prometheus_metrics;
pub use notifications::{
    delete_notification, list_notifications, mark_all_read, mark_read, unread_count,
    MarkAllReadResponse, UnreadCountResponse,
};
pub use preferences::{get_preferences, replace_preferences, reset_preferences};
pub use routes::api_routes;
