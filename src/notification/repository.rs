//! Backend trait for notification storage.
//!
//! Serves the request/response operations (list, unread count, mark read,
//! delete). Storage schemas are outside the engine, so the only shipped
//! implementation is in-memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::Notification;

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: u32 = 100;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No notification with this id belongs to the user
    #[error("notification {0} not found")]
    NotFound(Uuid),

    /// Backend is temporarily unavailable
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Pagination and filtering for [`NotificationRepository::list`]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// 1-based page number
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub unread_only: bool,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            unread_only: false,
        }
    }
}

impl ListQuery {
    /// Page and limit clamped to usable values
    pub fn normalized(&self) -> (u32, u32) {
        (self.page.max(1), self.limit.clamp(1, MAX_PAGE_SIZE))
    }
}

/// One page of notifications, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub has_more: bool,
    pub unread_count: u64,
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Store a new notification
    async fn insert(&self, notification: Notification) -> Result<(), RepositoryError>;

    /// List a user's notifications, newest first
    async fn list(&self, user_id: &str, query: &ListQuery) -> Result<NotificationPage, RepositoryError>;

    /// Number of unread notifications for a user
    async fn unread_count(&self, user_id: &str) -> Result<u64, RepositoryError>;

    /// Mark one notification read. Returns the stored notification and
    /// whether it changed (it may already have been read).
    async fn mark_read(
        &self,
        user_id: &str,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(Notification, bool), RepositoryError>;

    /// Mark every unread notification read. Returns the ids that changed.
    async fn mark_all_read(&self, user_id: &str, at: DateTime<Utc>) -> Result<Vec<Uuid>, RepositoryError>;

    /// Delete one notification
    async fn delete(&self, user_id: &str, id: Uuid) -> Result<(), RepositoryError>;

    /// Backend type identifier
    fn backend_type(&self) -> &'static str;
}
