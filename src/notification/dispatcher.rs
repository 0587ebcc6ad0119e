use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use uuid::Uuid;

use crate::connection_manager::{ConnectionHandle, ConnectionManager};
use crate::digest::{self, DigestDecision, DigestQueue};
use crate::metrics::{DeliveryMetrics, ResolutionMetrics};
use crate::preferences::{resolve, NotificationPreferences, PreferenceStore, ResolutionOutcome};
use crate::websocket::ServerEvent;

use super::outbound::OutboundSender;
use super::repository::{NotificationRepository, RepositoryError};
use super::{Channel, Notification, NotificationUpdate, ProducerEvent};

/// Result of dispatching one producer event
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub notification_id: Uuid,
    pub outcome: ResolutionOutcome,
    /// Channels the resolver allowed
    pub channels: BTreeSet<Channel>,
    /// Live sessions the in-app push reached
    pub pushed_to: usize,
    /// Email was placed into a digest bucket instead of being sent
    pub queued_for_digest: bool,
    /// Channels whose delivery failed
    pub failed: Vec<Channel>,
}

impl DeliveryResult {
    pub fn delivered(&self) -> bool {
        !self.channels.is_empty()
    }
}

/// Statistics for the notification dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Producer events processed
    pub total_events: AtomicU64,
    /// Events with at least one channel allowed
    pub total_delivered: AtomicU64,
    /// Events dropped by preferences
    pub total_suppressed: AtomicU64,
    /// Live session pushes
    pub total_pushed: AtomicU64,
    /// Emails queued into digests
    pub total_digest_queued: AtomicU64,
    /// Channel deliveries that failed
    pub total_failed: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            total_events: self.total_events.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_suppressed: self.total_suppressed.load(Ordering::Relaxed),
            total_pushed: self.total_pushed.load(Ordering::Relaxed),
            total_digest_queued: self.total_digest_queued.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherStatsSnapshot {
    pub total_events: u64,
    pub total_delivered: u64,
    pub total_suppressed: u64,
    pub total_pushed: u64,
    pub total_digest_queued: u64,
    pub total_failed: u64,
}

/// Routes producer events through the user's preferences to every channel.
///
/// In-app notifications are stored and pushed to live sessions, email goes
/// through the digest scheduler, push and SMS go to the outbound sender.
pub struct NotificationDispatcher {
    preferences: Arc<PreferenceStore>,
    repository: Arc<dyn NotificationRepository>,
    connection_manager: Arc<ConnectionManager>,
    digest_queue: Arc<DigestQueue>,
    outbound: Arc<dyn OutboundSender>,
    stats: DispatcherStats,
}

impl NotificationDispatcher {
    pub fn new(
        preferences: Arc<PreferenceStore>,
        repository: Arc<dyn NotificationRepository>,
        connection_manager: Arc<ConnectionManager>,
        digest_queue: Arc<DigestQueue>,
        outbound: Arc<dyn OutboundSender>,
    ) -> Self {
        Self {
            preferences,
            repository,
            connection_manager,
            digest_queue,
            outbound,
            stats: DispatcherStats::default(),
        }
    }

    /// Get dispatcher statistics
    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Dispatch a producer event using the current time
    pub async fn dispatch(&self, event: ProducerEvent) -> DeliveryResult {
        self.dispatch_at(event, Utc::now()).await
    }

    /// Dispatch a producer event as if it happened at `now`
    #[tracing::instrument(
        name = "dispatcher.dispatch",
        skip(self, event),
        fields(user_id = %event.user_id, event_type = %event.event_type)
    )]
    pub async fn dispatch_at(&self, event: ProducerEvent, now: DateTime<Utc>) -> DeliveryResult {
        let mut notification = event.into_notification(now);
        let prefs = self.preferences.get(&notification.user_id);
        let resolution = resolve(&prefs, &notification.event(), now);

        ResolutionMetrics::record(resolution.outcome);
        self.stats.total_events.fetch_add(1, Ordering::Relaxed);

        let mut result = DeliveryResult {
            notification_id: notification.id,
            outcome: resolution.outcome,
            channels: resolution.channels.clone(),
            pushed_to: 0,
            queued_for_digest: false,
            failed: Vec::new(),
        };

        if !resolution.deliver {
            self.stats.total_suppressed.fetch_add(1, Ordering::Relaxed);

            // Quiet hours hold email back; a digest can still pick it up later.
            if resolution.outcome == ResolutionOutcome::QuietHours
                && resolution.held.contains(&Channel::Email)
            {
                if let Some(priority) = resolution.effective_priority {
                    notification.priority = priority;
                }
                result.queued_for_digest = self.queue_held_email(&prefs, &notification, now);
            }

            tracing::debug!(
                notification_id = %notification.id,
                outcome = %resolution.outcome.as_str(),
                queued_for_digest = result.queued_for_digest,
                "Notification suppressed by preferences"
            );
            return result;
        }

        if let Some(priority) = resolution.effective_priority {
            notification.priority = priority;
        }
        self.stats.total_delivered.fetch_add(1, Ordering::Relaxed);

        for channel in &resolution.channels {
            DeliveryMetrics::record_attempt(*channel);
            let delivered = match channel {
                Channel::InApp => match self.deliver_in_app(&notification).await {
                    Ok(pushed) => {
                        result.pushed_to = pushed;
                        true
                    }
                    Err(e) => {
                        tracing::error!(
                            notification_id = %notification.id,
                            error = %e,
                            "Failed to store in-app notification"
                        );
                        false
                    }
                },
                Channel::Email => match digest::on_event(
                    &notification.user_id,
                    &prefs.email_digest,
                    &notification.event(),
                    now,
                ) {
                    DigestDecision::Immediate => self.send_outbound(Channel::Email, &notification).await,
                    DigestDecision::QueueForBatch { bucket, .. } => {
                        self.digest_queue.enqueue(bucket, notification.clone());
                        self.stats.total_digest_queued.fetch_add(1, Ordering::Relaxed);
                        result.queued_for_digest = true;
                        true
                    }
                    DigestDecision::Skip(reason) => {
                        tracing::debug!(
                            notification_id = %notification.id,
                            reason = ?reason,
                            "Email skipped by digest filter"
                        );
                        true
                    }
                },
                Channel::Push | Channel::Sms => self.send_outbound(*channel, &notification).await,
            };

            if !delivered {
                DeliveryMetrics::record_failure(*channel);
                self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
                result.failed.push(*channel);
            }
        }

        tracing::debug!(
            notification_id = %notification.id,
            channels = ?result.channels,
            pushed_to = result.pushed_to,
            "Dispatched notification"
        );

        result
    }

    /// Mark one notification read and tell the user's other sessions
    pub async fn mark_read(&self, user_id: &str, id: Uuid) -> Result<Notification, RepositoryError> {
        let now = Utc::now();
        let (notification, changed) = self.repository.mark_read(user_id, id, now).await?;
        if changed {
            self.broadcast_update(user_id, id, NotificationUpdate::read(now)).await;
        }
        Ok(notification)
    }

    /// Mark all of a user's notifications read. Returns how many changed.
    pub async fn mark_all_read(&self, user_id: &str) -> Result<usize, RepositoryError> {
        let now = Utc::now();
        let ids = self.repository.mark_all_read(user_id, now).await?;
        for id in &ids {
            self.broadcast_update(user_id, *id, NotificationUpdate::read(now)).await;
        }
        Ok(ids.len())
    }

    fn queue_held_email(
        &self,
        prefs: &NotificationPreferences,
        notification: &Notification,
        now: DateTime<Utc>,
    ) -> bool {
        match digest::on_event(&notification.user_id, &prefs.email_digest, &notification.event(), now) {
            DigestDecision::QueueForBatch { bucket, .. } => {
                self.digest_queue.enqueue(bucket, notification.clone());
                self.stats.total_digest_queued.fetch_add(1, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    /// Store the notification and push it to every live session of the user
    async fn deliver_in_app(&self, notification: &Notification) -> Result<usize, RepositoryError> {
        self.repository.insert(notification.clone()).await?;

        let connections = self.connection_manager.get_user_connections(&notification.user_id);
        let pushed = send_to_connections(&connections, ServerEvent::NotificationNew(notification.clone())).await;

        DeliveryMetrics::record_pushed(pushed as u64);
        self.stats.total_pushed.fetch_add(pushed as u64, Ordering::Relaxed);
        Ok(pushed)
    }

    async fn send_outbound(&self, channel: Channel, notification: &Notification) -> bool {
        match self.outbound.send(channel, notification).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    channel = %channel,
                    notification_id = %notification.id,
                    sender = self.outbound.name(),
                    error = %e,
                    "Outbound delivery failed"
                );
                false
            }
        }
    }

    async fn broadcast_update(&self, user_id: &str, id: Uuid, update: NotificationUpdate) {
        let connections = self.connection_manager.get_user_connections(user_id);
        if connections.is_empty() {
            return;
        }
        send_to_connections(&connections, ServerEvent::updated(id, update)).await;
    }
}

/// Maximum number of concurrent session sends
const MAX_CONCURRENT_SENDS: usize = 100;

/// Send an event to several sessions concurrently; returns how many accepted it
async fn send_to_connections(connections: &[Arc<ConnectionHandle>], event: ServerEvent) -> usize {
    let mut delivered = 0;

    for chunk in connections.chunks(MAX_CONCURRENT_SENDS) {
        let mut sends: FuturesUnordered<_> = chunk
            .iter()
            .map(|handle| {
                let event = event.clone();
                async move {
                    let result = handle.send(event).await;
                    (handle.id, result)
                }
            })
            .collect();

        while let Some((connection_id, result)) = sends.next().await {
            match result {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::warn!(connection_id = %connection_id, "Session closed before push");
                }
            }
        }
    }

    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::DigestBucket;
    use crate::notification::memory_repository::MemoryNotificationRepository;
    use crate::notification::outbound::OutboundError;
    use crate::notification::{Category, EventType, Priority};
    use crate::preferences::{CategoryPreference, DigestFrequency, QuietHours};
    use async_trait::async_trait;
    use chrono::{NaiveTime, TimeZone};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(Channel, Uuid)>>,
    }

    #[async_trait]
    impl OutboundSender for RecordingSender {
        async fn send(&self, channel: Channel, notification: &Notification) -> Result<(), OutboundError> {
            self.sent.lock().unwrap().push((channel, notification.id));
            Ok(())
        }

        async fn send_digest(&self, _bucket: &DigestBucket) -> Result<(), OutboundError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct Harness {
        dispatcher: NotificationDispatcher,
        preferences: Arc<PreferenceStore>,
        repository: Arc<MemoryNotificationRepository>,
        connections: Arc<ConnectionManager>,
        digest_queue: Arc<DigestQueue>,
        outbound: Arc<RecordingSender>,
    }

    fn harness() -> Harness {
        let preferences = Arc::new(PreferenceStore::new());
        let repository = Arc::new(MemoryNotificationRepository::default());
        let connections = Arc::new(ConnectionManager::new());
        let digest_queue = Arc::new(DigestQueue::default());
        let outbound = Arc::new(RecordingSender::default());
        let dispatcher = NotificationDispatcher::new(
            preferences.clone(),
            repository.clone(),
            connections.clone(),
            digest_queue.clone(),
            outbound.clone(),
        );
        Harness {
            dispatcher,
            preferences,
            repository,
            connections,
            digest_queue,
            outbound,
        }
    }

    fn event(category: Category, priority: Priority) -> ProducerEvent {
        ProducerEvent {
            user_id: "user-1".into(),
            event_type: EventType::from("comment.created"),
            category,
            priority,
            title: "Title".into(),
            message: "Body".into(),
            action_url: None,
            metadata: serde_json::Value::Null,
        }
    }

    fn prefs_with(category: Category, channels: &[Channel], min: Priority) -> NotificationPreferences {
        let mut prefs = NotificationPreferences::default();
        prefs.categories.insert(
            category,
            CategoryPreference::new(channels.iter().copied(), min),
        );
        prefs
    }

    #[tokio::test]
    async fn test_in_app_is_stored_and_pushed() {
        let h = harness();
        h.preferences
            .replace("user-1", prefs_with(Category::Comments, &[Channel::InApp], Priority::Low))
            .unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        h.connections.register("user-1".into(), tx);

        let result = h.dispatcher.dispatch(event(Category::Comments, Priority::High)).await;

        assert!(result.delivered());
        assert_eq!(result.pushed_to, 1);
        assert_eq!(h.repository.unread_count("user-1").await.unwrap(), 1);
        match rx.recv().await {
            Some(ServerEvent::NotificationNew(n)) => assert_eq!(n.id, result.notification_id),
            other => panic!("unexpected push: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_below_min_priority_is_suppressed() {
        let h = harness();
        h.preferences
            .replace("user-1", prefs_with(Category::Comments, &[Channel::InApp], Priority::Medium))
            .unwrap();

        let result = h.dispatcher.dispatch(event(Category::Comments, Priority::Low)).await;

        assert!(!result.delivered());
        assert_eq!(result.outcome, ResolutionOutcome::BelowMinPriority);
        assert_eq!(h.repository.unread_count("user-1").await.unwrap(), 0);
        assert_eq!(h.dispatcher.stats().total_suppressed, 1);
    }

    #[tokio::test]
    async fn test_email_goes_to_digest_when_enabled() {
        let h = harness();
        let mut prefs = prefs_with(Category::Comments, &[Channel::Email, Channel::Push], Priority::Low);
        prefs.email_digest.enabled = true;
        prefs.email_digest.frequency = DigestFrequency::Daily;
        h.preferences.replace("user-1", prefs).unwrap();

        let result = h.dispatcher.dispatch(event(Category::Comments, Priority::Medium)).await;

        assert!(result.queued_for_digest);
        assert_eq!(h.digest_queue.pending_for_user("user-1"), 1);
        let sent = h.outbound.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![(Channel::Push, result.notification_id)]);
    }

    #[tokio::test]
    async fn test_quiet_hours_hold_email_for_digest() {
        let h = harness();
        let mut prefs = prefs_with(Category::Comments, &[Channel::InApp, Channel::Email], Priority::Low);
        prefs.quiet_hours = QuietHours {
            enabled: true,
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
            timezone: chrono_tz::UTC,
            allow_critical: true,
            days_of_week: Default::default(),
        };
        prefs.email_digest.enabled = true;
        prefs.email_digest.frequency = DigestFrequency::Hourly;
        h.preferences.replace("user-1", prefs).unwrap();

        let night = Utc.with_ymd_and_hms(2024, 3, 6, 23, 0, 0).unwrap();
        let result = h
            .dispatcher
            .dispatch_at(event(Category::Comments, Priority::High), night)
            .await;

        assert_eq!(result.outcome, ResolutionOutcome::QuietHours);
        assert!(result.queued_for_digest);
        assert_eq!(h.digest_queue.pending_for_user("user-1"), 1);
        assert_eq!(h.dispatcher.stats().total_digest_queued, 1);
        assert_eq!(h.repository.unread_count("user-1").await.unwrap(), 0);
        assert!(h.outbound.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_notifies_sessions_once() {
        let h = harness();
        h.preferences
            .replace("user-1", prefs_with(Category::Comments, &[Channel::InApp], Priority::Low))
            .unwrap();
        let result = h.dispatcher.dispatch(event(Category::Comments, Priority::High)).await;

        let (tx, mut rx) = mpsc::channel(4);
        h.connections.register("user-1".into(), tx);

        let stored = h.dispatcher.mark_read("user-1", result.notification_id).await.unwrap();
        assert!(stored.is_read);
        assert!(matches!(rx.recv().await, Some(ServerEvent::NotificationUpdated(_))));

        h.dispatcher.mark_read("user-1", result.notification_id).await.unwrap();
        assert!(rx.try_recv().is_err());

        assert_eq!(h.dispatcher.mark_all_read("user-1").await.unwrap(), 0);
    }
}
