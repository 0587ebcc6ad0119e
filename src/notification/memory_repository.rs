//! In-memory notification repository using DashMap.
//!
//! Notifications are kept per user in insertion order and are lost on
//! restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::repository::{ListQuery, NotificationPage, NotificationRepository, RepositoryError};
use super::Notification;

/// In-memory notification repository.
///
/// Each user has a `Vec` ordered oldest to newest. When a user exceeds
/// `max_per_user` the oldest notifications are dropped.
pub struct MemoryNotificationRepository {
    notifications: DashMap<String, Vec<Notification>>,
    max_per_user: usize,
}

impl MemoryNotificationRepository {
    /// A cap of zero is treated as one.
    pub fn new(max_per_user: usize) -> Self {
        Self {
            notifications: DashMap::new(),
            max_per_user: max_per_user.max(1),
        }
    }
}

impl Default for MemoryNotificationRepository {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepository {
    async fn insert(&self, notification: Notification) -> Result<(), RepositoryError> {
        let mut list = self
            .notifications
            .entry(notification.user_id.clone())
            .or_default();

        if list.len() >= self.max_per_user {
            let overflow = list.len() + 1 - self.max_per_user;
            list.drain(..overflow);
            tracing::debug!(
                user_id = %notification.user_id,
                dropped = overflow,
                "Notification history full, dropped oldest entries"
            );
        }

        list.push(notification);
        Ok(())
    }

    async fn list(&self, user_id: &str, query: &ListQuery) -> Result<NotificationPage, RepositoryError> {
        let (page, limit) = query.normalized();

        let (items, total, unread_count) = match self.notifications.get(user_id) {
            Some(list) => {
                let unread = list.iter().filter(|n| !n.is_read).count() as u64;
                let matching: Vec<&Notification> = list
                    .iter()
                    .rev()
                    .filter(|n| !query.unread_only || !n.is_read)
                    .collect();
                let total = matching.len() as u64;
                let offset = ((page - 1) as usize).saturating_mul(limit as usize);
                let items = matching
                    .into_iter()
                    .skip(offset)
                    .take(limit as usize)
                    .cloned()
                    .collect::<Vec<_>>();
                (items, total, unread)
            }
            None => (Vec::new(), 0, 0),
        };

        let has_more = (page as u64) * (limit as u64) < total;

        Ok(NotificationPage {
            items,
            page,
            limit,
            total,
            has_more,
            unread_count,
        })
    }

    async fn unread_count(&self, user_id: &str) -> Result<u64, RepositoryError> {
        Ok(self
            .notifications
            .get(user_id)
            .map(|list| list.iter().filter(|n| !n.is_read).count() as u64)
            .unwrap_or(0))
    }

    async fn mark_read(
        &self,
        user_id: &str,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(Notification, bool), RepositoryError> {
        let mut list = self
            .notifications
            .get_mut(user_id)
            .ok_or(RepositoryError::NotFound(id))?;

        let notification = list
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(RepositoryError::NotFound(id))?;

        let changed = notification.mark_read(at);
        Ok((notification.clone(), changed))
    }

    async fn mark_all_read(&self, user_id: &str, at: DateTime<Utc>) -> Result<Vec<Uuid>, RepositoryError> {
        let Some(mut list) = self.notifications.get_mut(user_id) else {
            return Ok(Vec::new());
        };

        Ok(list
            .iter_mut()
            .filter_map(|n| n.mark_read(at).then_some(n.id))
            .collect())
    }

    async fn delete(&self, user_id: &str, id: Uuid) -> Result<(), RepositoryError> {
        let mut list = self
            .notifications
            .get_mut(user_id)
            .ok_or(RepositoryError::NotFound(id))?;

        let before = list.len();
        list.retain(|n| n.id != id);
        if list.len() == before {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
