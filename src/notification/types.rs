use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priority levels for notifications.
///
/// Variant order is load-bearing: `Ord` is derived, so comparisons follow
/// `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum Priority {
    /// Low priority, can be delayed
    #[default]
    Low,
    /// Normal priority
    Medium,
    /// High priority, should be delivered promptly
    High,
    /// Critical priority, may bypass quiet hours
    Critical,
}

impl Priority {
    /// Ordinal position in the total order.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
            Priority::Critical => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];
}

/// Coarse grouping of event types sharing default preference settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Category {
    HrActivities,
    SecurityAlerts,
    SystemUpdates,
    Comments,
    Interviews,
    Admin,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::HrActivities,
        Category::SecurityAlerts,
        Category::SystemUpdates,
        Category::Comments,
        Category::Interviews,
        Category::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::HrActivities => "hr_activities",
            Category::SecurityAlerts => "security_alerts",
            Category::SystemUpdates => "system_updates",
            Category::Comments => "comments",
            Category::Interviews => "interviews",
            Category::Admin => "admin",
        }
    }
}

/// Independent delivery medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Channel {
    InApp,
    Email,
    Push,
    Sms,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::InApp, Channel::Email, Channel::Push, Channel::Sms];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::InApp => "in_app",
            Channel::Email => "email",
            Channel::Push => "push",
            Channel::Sms => "sms",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain event type (e.g. "candidate.stage_changed").
///
/// Left open: producers own the catalog, the engine only matches on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The raw event the resolver and digest scheduler decide on
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub category: Category,
    #[serde(default)]
    pub priority: Priority,
    pub occurred_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(event_type: impl Into<String>, category: Category, priority: Priority) -> Self {
        Self {
            event_type: EventType::new(event_type),
            category,
            priority,
            occurred_at: Utc::now(),
        }
    }
}

/// A user-facing notification as stored and pushed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub category: Category,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Flip to read. Returns false when already read (`is_read` never goes back).
    pub fn mark_read(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_read {
            return false;
        }
        self.is_read = true;
        self.read_at = Some(at);
        true
    }

    /// Apply a server-side patch, keeping `is_read` monotonic.
    pub fn apply(&mut self, update: &NotificationUpdate) -> bool {
        match update.is_read {
            Some(true) => self.mark_read(update.read_at.unwrap_or_else(Utc::now)),
            _ => false,
        }
    }

    /// Resolver input derived from this notification
    pub fn event(&self) -> NotificationEvent {
        NotificationEvent {
            event_type: self.event_type.clone(),
            category: self.category,
            priority: self.priority,
            occurred_at: self.created_at,
        }
    }
}

/// Patch carried by `notification:updated`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
}

impl NotificationUpdate {
    pub fn read(at: DateTime<Utc>) -> Self {
        Self {
            is_read: Some(true),
            read_at: Some(at),
        }
    }
}

/// Event submitted by a producer (HTTP or Redis trigger)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerEvent {
    pub user_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub category: Category,
    #[serde(default)]
    pub priority: Priority,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub action_url: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl ProducerEvent {
    /// Build the notification instance this event describes
    pub fn into_notification(self, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            event_type: self.event_type,
            category: self.category,
            priority: self.priority,
            title: self.title,
            message: self.message,
            action_url: self.action_url,
            metadata: self.metadata,
            is_read: false,
            created_at,
            read_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Notification {
        ProducerEvent {
            user_id: "user-1".to_string(),
            event_type: EventType::from("comment.created"),
            category: Category::Comments,
            priority: Priority::Medium,
            title: "New comment".to_string(),
            message: "Alex commented on a candidate".to_string(),
            action_url: None,
            metadata: serde_json::Value::Null,
        }
        .into_notification(Utc::now())
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        for pair in Priority::ALL.windows(2) {
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&Channel::InApp).unwrap(), "\"InApp\"");
        assert_eq!(
            serde_json::to_string(&Category::HrActivities).unwrap(),
            "\"HrActivities\""
        );
        let p: Priority = serde_json::from_str("\"Critical\"").unwrap();
        assert_eq!(p, Priority::Critical);
    }

    #[test]
    fn test_read_is_monotonic() {
        let mut n = sample();
        assert!(n.mark_read(Utc::now()));
        assert!(!n.mark_read(Utc::now()));

        let unread = NotificationUpdate {
            is_read: Some(false),
            read_at: None,
        };
        assert!(!n.apply(&unread));
        assert!(n.is_read);
    }

    #[test]
    fn test_notification_wire_format() {
        let n = sample();
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "comment.created");
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["isRead"], false);
        assert!(json.get("actionUrl").is_none());
    }
}
