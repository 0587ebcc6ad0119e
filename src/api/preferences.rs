//! Preference endpoints for the authenticated user.

use axum::{extract::State, Json};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::preferences::NotificationPreferences;
use crate::server::AppState;

/// GET /api/v1/preferences
#[tracing::instrument(name = "http.get_preferences", skip(state), fields(user_id = %user.user_id))]
pub async fn get_preferences(
    State(state): State<AppState>,
    user: AuthUser,
) -> Json<NotificationPreferences> {
    let prefs = state.preferences.get(&user.user_id);
    Json(prefs.as_ref().clone())
}

/// PUT /api/v1/preferences - whole-object replace
#[tracing::instrument(
    name = "http.replace_preferences",
    skip(state, prefs),
    fields(user_id = %user.user_id)
)]
pub async fn replace_preferences(
    State(state): State<AppState>,
    user: AuthUser,
    Json(prefs): Json<NotificationPreferences>,
) -> Result<Json<NotificationPreferences>> {
    let stored = state.preferences.replace(&user.user_id, prefs)?;
    Ok(Json(stored.as_ref().clone()))
}

/// POST /api/v1/preferences/reset
#[tracing::instrument(name = "http.reset_preferences", skip(state), fields(user_id = %user.user_id))]
pub async fn reset_preferences(
    State(state): State<AppState>,
    user: AuthUser,
) -> Json<NotificationPreferences> {
    let defaults = state.preferences.reset(&user.user_id);
    Json(defaults.as_ref().clone())
}
