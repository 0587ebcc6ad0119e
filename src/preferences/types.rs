use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::notification::{Category, Channel, EventType, Priority};

/// A user's complete notification preferences.
///
/// Treated as an immutable snapshot by the engine: changes arrive as a whole
/// new object through [`super::PreferenceStore::replace`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub enabled: bool,
    /// Seed for the settings UI. Never consulted during resolution.
    pub default_channels: BTreeMap<Channel, bool>,
    pub categories: BTreeMap<Category, CategoryPreference>,
    pub email_digest: EmailDigestSettings,
    pub quiet_hours: QuietHours,
    #[serde(default)]
    pub event_overrides: Vec<EventOverride>,
    #[serde(default)]
    pub batch_notifications: bool,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    #[serde(default = "default_true")]
    pub desktop_notifications: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPreference {
    pub enabled: bool,
    pub channels: BTreeSet<Channel>,
    #[serde(default)]
    pub min_priority: Priority,
}

impl CategoryPreference {
    pub fn new(channels: impl IntoIterator<Item = Channel>, min_priority: Priority) -> Self {
        Self {
            enabled: true,
            channels: channels.into_iter().collect(),
            min_priority,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DigestFrequency {
    Immediate,
    Hourly,
    Daily,
    Weekly,
}

impl DigestFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestFrequency::Immediate => "immediate",
            DigestFrequency::Hourly => "hourly",
            DigestFrequency::Daily => "daily",
            DigestFrequency::Weekly => "weekly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailDigestSettings {
    pub enabled: bool,
    pub frequency: DigestFrequency,
    /// Local wall-clock time the digest fires (Daily/Weekly)
    #[serde(with = "super::time_format")]
    pub time: NaiveTime,
    /// 0 = Sunday ... 6 = Saturday (Weekly)
    pub day_of_week: u8,
    pub timezone: Tz,
    #[serde(default)]
    pub include_categories: BTreeSet<Category>,
    #[serde(default)]
    pub min_priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuietHours {
    pub enabled: bool,
    #[serde(with = "super::time_format")]
    pub start: NaiveTime,
    #[serde(with = "super::time_format")]
    pub end: NaiveTime,
    pub timezone: Tz,
    pub allow_critical: bool,
    /// 0 = Sunday ... 6 = Saturday; empty means every day
    #[serde(default)]
    pub days_of_week: BTreeSet<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOverride {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub enabled: bool,
    #[serde(default)]
    pub channels: BTreeSet<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl Default for EmailDigestSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: DigestFrequency::Daily,
            time: hm(9, 0),
            day_of_week: 1,
            timezone: Tz::UTC,
            include_categories: BTreeSet::new(),
            min_priority: Priority::Low,
        }
    }
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: hm(22, 0),
            end: hm(8, 0),
            timezone: Tz::UTC,
            allow_critical: true,
            days_of_week: BTreeSet::new(),
        }
    }
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        use Channel::*;

        let default_channels = BTreeMap::from([
            (InApp, true),
            (Email, true),
            (Push, false),
            (Sms, false),
        ]);

        let categories = Category::ALL
            .iter()
            .map(|category| {
                let channels: &[Channel] = match category {
                    Category::SecurityAlerts => &[InApp, Email, Push],
                    Category::Interviews | Category::HrActivities | Category::Admin => {
                        &[InApp, Email]
                    }
                    Category::Comments | Category::SystemUpdates => &[InApp],
                };
                (
                    *category,
                    CategoryPreference::new(channels.iter().copied(), Priority::Low),
                )
            })
            .collect();

        Self {
            enabled: true,
            default_channels,
            categories,
            email_digest: EmailDigestSettings::default(),
            quiet_hours: QuietHours::default(),
            event_overrides: Vec::new(),
            batch_notifications: false,
            sound_enabled: true,
            desktop_notifications: true,
        }
    }
}

impl NotificationPreferences {
    /// First override whose type matches
    pub fn override_for(&self, event_type: &EventType) -> Option<&EventOverride> {
        self.event_overrides
            .iter()
            .find(|o| &o.event_type == event_type)
    }
}
