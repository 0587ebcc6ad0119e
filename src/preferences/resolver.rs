//! Preference resolution: event + preferences -> delivery decision.
//!
//! Resolution is a pure function of its arguments. Anything that would make
//! the decision ambiguous (missing category entry, an enabled override with
//! no channels) fails closed instead of erroring.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::notification::{Channel, NotificationEvent, Priority};

use super::quiet_hours::is_quiet;
use super::NotificationPreferences;

/// Why a resolution ended the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Delivered,
    /// Notifications are switched off for the user
    Disabled,
    /// A matching event override disables this event type
    OverrideDisabled,
    /// No override and no category entry for the event
    CategoryMissing,
    CategoryDisabled,
    BelowMinPriority,
    /// Inside quiet hours and not allowed through
    QuietHours,
    NoChannels,
    /// Preferences are structurally unusable for this event
    Malformed,
}

impl ResolutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionOutcome::Delivered => "delivered",
            ResolutionOutcome::Disabled => "disabled",
            ResolutionOutcome::OverrideDisabled => "override_disabled",
            ResolutionOutcome::CategoryMissing => "category_missing",
            ResolutionOutcome::CategoryDisabled => "category_disabled",
            ResolutionOutcome::BelowMinPriority => "below_min_priority",
            ResolutionOutcome::QuietHours => "quiet_hours",
            ResolutionOutcome::NoChannels => "no_channels",
            ResolutionOutcome::Malformed => "malformed",
        }
    }
}

/// Result of [`resolve`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub deliver: bool,
    /// Channels to fire now; empty unless `deliver`
    pub channels: BTreeSet<Channel>,
    /// Priority after any override; `None` when resolution stopped before it was known
    pub effective_priority: Option<Priority>,
    /// Channels withheld by quiet hours (email may still go to a digest)
    pub held: BTreeSet<Channel>,
    pub outcome: ResolutionOutcome,
}

impl Resolution {
    fn denied(outcome: ResolutionOutcome, effective_priority: Option<Priority>) -> Self {
        Self {
            deliver: false,
            channels: BTreeSet::new(),
            effective_priority,
            held: BTreeSet::new(),
            outcome,
        }
    }

    pub fn includes(&self, channel: Channel) -> bool {
        self.deliver && self.channels.contains(&channel)
    }
}

/// Decide whether and where an event should be delivered.
///
/// Order of evaluation: master switch, event override (replaces category
/// resolution entirely), category gate and minimum priority, then quiet
/// hours. `default_channels` is never consulted.
pub fn resolve(
    prefs: &NotificationPreferences,
    event: &NotificationEvent,
    now: DateTime<Utc>,
) -> Resolution {
    if !prefs.enabled {
        return Resolution::denied(ResolutionOutcome::Disabled, None);
    }

    let (channels, effective_priority) = match prefs.override_for(&event.event_type) {
        Some(rule) => {
            if !rule.enabled {
                return Resolution::denied(ResolutionOutcome::OverrideDisabled, None);
            }
            if rule.channels.is_empty() {
                return Resolution::denied(ResolutionOutcome::Malformed, None);
            }
            (rule.channels.clone(), rule.priority.unwrap_or(event.priority))
        }
        None => {
            let Some(category) = prefs.categories.get(&event.category) else {
                return Resolution::denied(ResolutionOutcome::CategoryMissing, None);
            };
            if !category.enabled {
                return Resolution::denied(ResolutionOutcome::CategoryDisabled, None);
            }
            if event.priority.rank() < category.min_priority.rank() {
                return Resolution::denied(
                    ResolutionOutcome::BelowMinPriority,
                    Some(event.priority),
                );
            }
            (category.channels.clone(), event.priority)
        }
    };

    let quiet = &prefs.quiet_hours;
    if quiet.enabled && is_quiet(quiet, now) {
        let bypass = effective_priority == Priority::Critical && quiet.allow_critical;
        if !bypass {
            return Resolution {
                held: channels,
                ..Resolution::denied(ResolutionOutcome::QuietHours, Some(effective_priority))
            };
        }
    }

    if channels.is_empty() {
        return Resolution::denied(ResolutionOutcome::NoChannels, Some(effective_priority));
    }

    Resolution {
        deliver: true,
        channels,
        effective_priority: Some(effective_priority),
        held: BTreeSet::new(),
        outcome: ResolutionOutcome::Delivered,
    }
}
