//! In-memory digest buckets waiting for their fire time.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::metrics::DigestMetrics;
use crate::notification::Notification;

use super::BucketKey;

/// One batch of notifications that becomes a single digest email
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestBucket {
    pub key: BucketKey,
    pub notifications: Vec<Notification>,
}

impl DigestBucket {
    pub fn fire_at(&self) -> DateTime<Utc> {
        self.key.fire_at
    }

    pub fn user_id(&self) -> &str {
        &self.key.user_id
    }
}

/// Statistics snapshot for the digest queue
#[derive(Debug, Clone, Serialize)]
pub struct DigestQueueStats {
    pub pending_buckets: usize,
    pub pending_notifications: usize,
}

/// Buckets keyed by user, frequency and fire time.
///
/// Each bucket is handed out by [`DigestQueue::drain_due`] exactly once.
pub struct DigestQueue {
    buckets: DashMap<BucketKey, Vec<Notification>>,
    max_per_bucket: usize,
}

impl DigestQueue {
    /// A cap of zero is treated as one.
    pub fn new(max_per_bucket: usize) -> Self {
        Self {
            buckets: DashMap::new(),
            max_per_bucket: max_per_bucket.max(1),
        }
    }

    /// Add a notification to its bucket. When the bucket is full the oldest
    /// entry is dropped.
    pub fn enqueue(&self, key: BucketKey, notification: Notification) {
        let mut entry = self.buckets.entry(key.clone()).or_default();
        let is_new = entry.is_empty();
        if entry.len() >= self.max_per_bucket {
            entry.remove(0);
            tracing::warn!(bucket = %key, "Digest bucket full, dropping oldest entry");
        }
        entry.push(notification);
        drop(entry);

        if is_new {
            DigestMetrics::record_bucket_opened();
        }
        DigestMetrics::record_queued();
        tracing::debug!(bucket = %key, fire_at = %key.fire_at, "Queued notification for digest");
    }

    /// Remove and return every bucket whose fire time is at or before `now`,
    /// oldest first.
    pub fn drain_due(&self, now: DateTime<Utc>) -> Vec<DigestBucket> {
        let due: Vec<BucketKey> = self
            .buckets
            .iter()
            .filter(|entry| entry.key().fire_at <= now)
            .map(|entry| entry.key().clone())
            .collect();

        let mut drained: Vec<DigestBucket> = due
            .into_iter()
            .filter_map(|key| {
                self.buckets
                    .remove(&key)
                    .map(|(key, notifications)| DigestBucket { key, notifications })
            })
            .collect();

        drained.sort_by_key(|bucket| bucket.key.fire_at);
        drained
    }

    /// Pending notifications for one user across all buckets
    pub fn pending_for_user(&self, user_id: &str) -> usize {
        self.buckets
            .iter()
            .filter(|entry| entry.key().user_id == user_id)
            .map(|entry| entry.value().len())
            .sum()
    }

    pub fn stats(&self) -> DigestQueueStats {
        DigestQueueStats {
            pending_buckets: self.buckets.len(),
            pending_notifications: self.buckets.iter().map(|e| e.value().len()).sum(),
        }
    }
}

impl Default for DigestQueue {
    fn default() -> Self {
        Self::new(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{Category, EventType, Priority, ProducerEvent};
    use crate::preferences::DigestFrequency;
    use chrono::TimeZone;

    fn key(user: &str, hour: u32) -> BucketKey {
        BucketKey {
            user_id: user.to_string(),
            frequency: DigestFrequency::Daily,
            fire_at: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
        }
    }

    fn notification(user: &str, title: &str) -> Notification {
        ProducerEvent {
            user_id: user.to_string(),
            event_type: EventType::from("candidate.applied"),
            category: Category::HrActivities,
            priority: Priority::Medium,
            title: title.to_string(),
            message: String::new(),
            action_url: None,
            metadata: serde_json::Value::Null,
        }
        .into_notification(Utc::now())
    }

    #[test]
    fn test_drain_only_due_buckets_once() {
        let queue = DigestQueue::default();
        queue.enqueue(key("a", 9), notification("a", "one"));
        queue.enqueue(key("a", 9), notification("a", "two"));
        queue.enqueue(key("b", 11), notification("b", "three"));

        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let due = queue.drain_due(now);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].user_id(), "a");
        assert_eq!(due[0].notifications.len(), 2);

        assert!(queue.drain_due(now).is_empty());
        assert_eq!(queue.pending_for_user("b"), 1);
    }

    #[test]
    fn test_bucket_cap_drops_oldest() {
        let queue = DigestQueue::new(2);
        for title in ["one", "two", "three"] {
            queue.enqueue(key("a", 9), notification("a", title));
        }
        let later = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let due = queue.drain_due(later);
        let titles: Vec<_> = due[0].notifications.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["two", "three"]);
    }

    #[test]
    fn test_zero_cap_keeps_newest() {
        let queue = DigestQueue::new(0);
        queue.enqueue(key("a", 9), notification("a", "one"));
        queue.enqueue(key("a", 9), notification("a", "two"));
        assert_eq!(queue.pending_for_user("a"), 1);

        let later = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let due = queue.drain_due(later);
        assert_eq!(due[0].notifications[0].title, "two");
    }

    #[test]
    fn test_stats() {
        let queue = DigestQueue::default();
        queue.enqueue(key("a", 9), notification("a", "one"));
        queue.enqueue(key("b", 9), notification("b", "two"));
        let stats = queue.stats();
        assert_eq!(stats.pending_buckets, 2);
        assert_eq!(stats.pending_notifications, 2);
    }
}
