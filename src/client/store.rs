use chrono::Utc;
use uuid::Uuid;

use crate::notification::{ListQuery, Notification, NotificationUpdate};
use crate::preferences::NotificationPreferences;
use crate::realtime::ChannelEvent;

use super::api::{NotificationApi, RequestError};

/// Most recent notifications kept in the cache
pub const MAX_CACHED: usize = 50;

/// Side effects the presentation layer should perform for a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresentationCues {
    pub play_sound: bool,
    pub show_desktop: bool,
}

/// Consumer-side cache of recent notifications plus the unread counter.
///
/// The cache is capped at [`MAX_CACHED`] newest-first entries and is not
/// the full history. The counter always equals the number of cached
/// entries with `is_read == false`; evicting an unread entry lowers it.
#[derive(Debug, Default)]
pub struct ClientNotificationStore {
    items: Vec<Notification>,
    unread_count: u64,
    sound_enabled: bool,
    desktop_notifications: bool,
}

impl ClientNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the cue flags from a preferences snapshot
    pub fn with_preferences(preferences: &NotificationPreferences) -> Self {
        let mut store = Self::new();
        store.set_preferences(preferences);
        store
    }

    pub fn set_preferences(&mut self, preferences: &NotificationPreferences) {
        self.sound_enabled = preferences.sound_enabled;
        self.desktop_notifications = preferences.desktop_notifications;
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    pub fn get(&self, id: Uuid) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == id)
    }

    pub fn unread_count(&self) -> u64 {
        self.unread_count
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.items.iter().position(|n| n.id == id)
    }

    fn decrement_unread(&mut self) {
        self.unread_count = self.unread_count.saturating_sub(1);
    }

    /// Merge a pushed or fetched notification.
    ///
    /// A known id is replaced in place, keeping its position; `is_read`
    /// never goes back to false. A new id is prepended and the cache
    /// truncated.
    pub fn merge(&mut self, mut notification: Notification) -> PresentationCues {
        if let Some(index) = self.position(notification.id) {
            let existing = &self.items[index];
            if existing.is_read {
                if !notification.is_read {
                    notification.is_read = true;
                    notification.read_at = existing.read_at;
                }
            } else if notification.is_read {
                self.decrement_unread();
            }
            self.items[index] = notification;
            return PresentationCues::default();
        }

        let is_new_unread = !notification.is_read;
        self.items.insert(0, notification);
        if is_new_unread {
            self.unread_count += 1;
        }
        for evicted in self.items.drain(MAX_CACHED.min(self.items.len())..) {
            if !evicted.is_read {
                self.unread_count = self.unread_count.saturating_sub(1);
            }
        }

        if !is_new_unread {
            return PresentationCues::default();
        }
        PresentationCues {
            play_sound: self.sound_enabled,
            show_desktop: self.desktop_notifications,
        }
    }

    /// Apply a `notification:updated` patch. Returns false for unknown ids
    /// or patches that change nothing.
    pub fn apply_update(&mut self, id: Uuid, update: &NotificationUpdate) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let changed = self.items[index].apply(update);
        if changed {
            self.decrement_unread();
        }
        changed
    }

    /// Feed one realtime channel event into the cache
    pub fn handle_event(&mut self, event: &ChannelEvent) -> PresentationCues {
        match event {
            ChannelEvent::Notification(notification) => self.merge(notification.clone()),
            ChannelEvent::NotificationUpdated(updated) => {
                self.apply_update(updated.notification_id, &updated.update);
                PresentationCues::default()
            }
            _ => PresentationCues::default(),
        }
    }

    /// Replace the cache with a full fetch. The counter is recounted from
    /// the kept entries.
    pub fn replace_snapshot(&mut self, mut items: Vec<Notification>) {
        items.truncate(MAX_CACHED);
        self.unread_count = items.iter().filter(|n| !n.is_read).count() as u64;
        self.items = items;
    }

    /// Fetch the newest page and replace the cache with it
    pub async fn refresh(&mut self, api: &dyn NotificationApi) -> Result<(), RequestError> {
        let query = ListQuery {
            page: 1,
            limit: MAX_CACHED as u32,
            unread_only: false,
        };
        let page = api.list(&query).await?;
        self.replace_snapshot(page.items);
        if page.unread_count > self.unread_count {
            tracing::debug!(
                server_unread = page.unread_count,
                cached_unread = self.unread_count,
                "Unread notifications beyond the cached page"
            );
        }
        Ok(())
    }

    /// Drop a notification from the cache
    pub fn remove(&mut self, id: Uuid) -> Option<Notification> {
        let index = self.position(id)?;
        let removed = self.items.remove(index);
        if !removed.is_read {
            self.decrement_unread();
        }
        Some(removed)
    }

    /// Flip one notification optimistically, then issue one request.
    /// The local flip stays even if the request fails.
    pub async fn mark_as_read(
        &mut self,
        id: Uuid,
        api: &dyn NotificationApi,
    ) -> Result<(), RequestError> {
        if let Some(index) = self.position(id) {
            if self.items[index].mark_read(Utc::now()) {
                self.decrement_unread();
            }
        }

        api.mark_read(id).await.map_err(|e| {
            tracing::warn!(notification_id = %id, error = %e, "Mark read request failed");
            e
        })
    }

    /// Flip every cached notification and zero the counter, then issue one
    /// bulk request. No rollback on failure; callers refetch to reconcile.
    pub async fn mark_all_as_read(&mut self, api: &dyn NotificationApi) -> Result<u64, RequestError> {
        let now = Utc::now();
        for notification in &mut self.items {
            notification.mark_read(now);
        }
        self.unread_count = 0;

        api.mark_all_read().await.map_err(|e| {
            tracing::warn!(error = %e, "Mark all read request failed");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{Category, EventType, NotificationPage, Priority, ProducerEvent};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio_test::assert_err;

    fn notification(title: &str) -> Notification {
        ProducerEvent {
            user_id: "u1".into(),
            event_type: EventType::from("comment.created"),
            category: Category::Comments,
            priority: Priority::Medium,
            title: title.into(),
            message: String::new(),
            action_url: None,
            metadata: serde_json::Value::Null,
        }
        .into_notification(Utc::now())
    }

    #[derive(Default)]
    struct FakeApi {
        fail: bool,
        bulk_calls: AtomicUsize,
        read_calls: Mutex<Vec<Uuid>>,
        page: Mutex<Option<NotificationPage>>,
    }

    #[async_trait]
    impl NotificationApi for FakeApi {
        async fn list(&self, _query: &ListQuery) -> Result<NotificationPage, RequestError> {
            self.page
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| RequestError::Other("no page".into()))
        }

        async fn mark_read(&self, id: Uuid) -> Result<(), RequestError> {
            self.read_calls.lock().unwrap().push(id);
            if self.fail {
                return Err(RequestError::Other("boom".into()));
            }
            Ok(())
        }

        async fn mark_all_read(&self) -> Result<u64, RequestError> {
            self.bulk_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RequestError::Other("boom".into()));
            }
            Ok(3)
        }
    }

    #[test]
    fn test_merge_prepends_and_caps() {
        let mut store = ClientNotificationStore::new();
        let mut last = None;
        for i in 0..60 {
            let n = notification(&format!("n{i}"));
            last = Some(n.id);
            store.merge(n);
        }

        assert_eq!(store.len(), MAX_CACHED);
        assert_eq!(store.items()[0].id, last.unwrap());
        assert_eq!(store.items()[0].title, "n59");
        assert_eq!(store.unread_count(), MAX_CACHED as u64);
    }

    #[test]
    fn test_eviction_of_read_entry_keeps_counter() {
        let mut store = ClientNotificationStore::new();
        let mut oldest = notification("oldest");
        oldest.mark_read(Utc::now());
        store.merge(oldest.clone());
        for i in 0..MAX_CACHED {
            store.merge(notification(&format!("n{i}")));
        }

        assert!(store.get(oldest.id).is_none());
        assert_eq!(store.len(), MAX_CACHED);
        assert_eq!(store.unread_count(), MAX_CACHED as u64);
    }

    #[test]
    fn test_remerge_updates_in_place_without_double_count() {
        let mut store = ClientNotificationStore::new();
        let first = notification("first");
        let second = notification("second");
        store.merge(first.clone());
        store.merge(second);
        assert_eq!(store.unread_count(), 2);

        let mut edited = first.clone();
        edited.title = "edited".into();
        store.merge(edited);

        assert_eq!(store.len(), 2);
        assert_eq!(store.items()[1].title, "edited");
        assert_eq!(store.unread_count(), 2);
    }

    #[test]
    fn test_read_is_monotonic_across_merges() {
        let mut store = ClientNotificationStore::new();
        let n = notification("n");
        store.merge(n.clone());

        let mut read = n.clone();
        read.mark_read(Utc::now());
        store.merge(read);
        assert_eq!(store.unread_count(), 0);

        // A stale unread copy must not resurrect it.
        store.merge(n.clone());
        assert!(store.get(n.id).unwrap().is_read);
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_cues_follow_preferences() {
        let mut prefs = NotificationPreferences::default();
        prefs.sound_enabled = false;
        prefs.desktop_notifications = true;
        let mut store = ClientNotificationStore::with_preferences(&prefs);

        let n = notification("n");
        let cues = store.merge(n.clone());
        assert!(!cues.play_sound);
        assert!(cues.show_desktop);

        // Re-merge is not a new arrival.
        assert_eq!(store.merge(n), PresentationCues::default());

        let mut read = notification("already read");
        read.mark_read(Utc::now());
        assert_eq!(store.merge(read), PresentationCues::default());
    }

    #[test]
    fn test_apply_update_and_remove_adjust_counter() {
        let mut store = ClientNotificationStore::new();
        let a = notification("a");
        let b = notification("b");
        store.merge(a.clone());
        store.merge(b.clone());

        assert!(store.apply_update(a.id, &NotificationUpdate::read(Utc::now())));
        assert!(!store.apply_update(a.id, &NotificationUpdate::read(Utc::now())));
        assert_eq!(store.unread_count(), 1);

        assert!(store.remove(b.id).is_some());
        assert_eq!(store.unread_count(), 0);
        assert!(store.remove(b.id).is_none());
        assert!(store.remove(a.id).is_some());
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_counter_never_negative() {
        let mut store = ClientNotificationStore::new();
        let n = notification("n");
        store.replace_snapshot(vec![n.clone()]);
        assert!(store.apply_update(n.id, &NotificationUpdate::read(Utc::now())));
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_snapshot_truncates_and_counts_cached_unread() {
        let mut store = ClientNotificationStore::new();
        let items: Vec<_> = (0..70).map(|i| notification(&format!("n{i}"))).collect();
        store.replace_snapshot(items);
        assert_eq!(store.len(), MAX_CACHED);
        assert_eq!(store.unread_count(), MAX_CACHED as u64);

        let a = notification("a");
        let mut b = notification("b");
        b.mark_read(Utc::now());
        store.replace_snapshot(vec![a, b]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.unread_count(), 1);
    }

    #[tokio::test]
    async fn test_mark_all_as_read_keeps_flip_on_failure() {
        let api = FakeApi {
            fail: true,
            ..Default::default()
        };
        let mut store = ClientNotificationStore::new();
        store.merge(notification("a"));
        store.merge(notification("b"));

        assert_err!(store.mark_all_as_read(&api).await);
        assert_eq!(api.bulk_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.unread_count(), 0);
        assert!(store.items().iter().all(|n| n.is_read));
    }

    #[tokio::test]
    async fn test_mark_as_read_sends_one_request() {
        let api = FakeApi::default();
        let mut store = ClientNotificationStore::new();
        let n = notification("a");
        store.merge(n.clone());

        store.mark_as_read(n.id, &api).await.unwrap();

        assert_eq!(*api.read_calls.lock().unwrap(), vec![n.id]);
        assert_eq!(store.unread_count(), 0);
        assert!(store.get(n.id).unwrap().read_at.is_some());
    }

    #[tokio::test]
    async fn test_refresh_replaces_cache() {
        let fresh = notification("fresh");
        let api = FakeApi::default();
        *api.page.lock().unwrap() = Some(NotificationPage {
            items: vec![fresh.clone()],
            page: 1,
            limit: MAX_CACHED as u32,
            total: 9,
            has_more: false,
            unread_count: 9,
        });

        let mut store = ClientNotificationStore::new();
        store.merge(notification("stale"));
        store.refresh(&api).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].id, fresh.id);
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_handle_channel_events() {
        let mut store = ClientNotificationStore::new();
        let n = notification("pushed");
        store.handle_event(&ChannelEvent::Notification(n.clone()));
        assert_eq!(store.unread_count(), 1);

        store.handle_event(&ChannelEvent::NotificationUpdated(
            crate::websocket::NotificationUpdated {
                notification_id: n.id,
                update: NotificationUpdate::read(Utc::now()),
            },
        ));
        assert_eq!(store.unread_count(), 0);
        assert_eq!(
            store.handle_event(&ChannelEvent::ReconnectFailed),
            PresentationCues::default()
        );
    }
}
