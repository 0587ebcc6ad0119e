//! Notification history endpoints for the authenticated user.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::notification::{ListQuery, Notification, NotificationPage};
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub unread_count: u64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

/// GET /api/v1/notifications?page&limit&unreadOnly
#[tracing::instrument(name = "http.list_notifications", skip(state, query), fields(user_id = %user.user_id))]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<NotificationPage>> {
    let page = state.repository.list(&user.user_id, &query).await?;
    Ok(Json(page))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UnreadCountResponse>> {
    let unread_count = state.repository.unread_count(&user.user_id).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

/// PATCH /api/v1/notifications/{id}/read
#[tracing::instrument(name = "http.mark_read", skip(state), fields(user_id = %user.user_id))]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>> {
    let notification = state.dispatcher.mark_read(&user.user_id, id).await?;
    Ok(Json(notification))
}

/// PATCH /api/v1/notifications/read-all
#[tracing::instrument(name = "http.mark_all_read", skip(state), fields(user_id = %user.user_id))]
pub async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MarkAllReadResponse>> {
    let updated = state.dispatcher.mark_all_read(&user.user_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// DELETE /api/v1/notifications/{id}
#[tracing::instrument(name = "http.delete_notification", skip(state), fields(user_id = %user.user_id))]
pub async fn delete_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.repository.delete(&user.user_id, id).await?;
    tracing::info!(notification_id = %id, "Notification deleted");
    Ok(StatusCode::NO_CONTENT)
}
