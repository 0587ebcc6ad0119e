//! Email digest batching decisions.
//!
//! Everything here is a pure function of the digest settings, the event and
//! `now`. Fire times are recomputed from configuration on every call, so a
//! restarted process lands events in the same bucket it would have used
//! before the restart.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::notification::NotificationEvent;
use crate::preferences::{DigestFrequency, EmailDigestSettings};

/// Identity of one digest batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketKey {
    pub user_id: String,
    pub frequency: DigestFrequency,
    pub fire_at: DateTime<Utc>,
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.user_id,
            self.frequency.as_str(),
            self.fire_at.timestamp()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    CategoryExcluded,
    BelowMinPriority,
}

/// What to do with the email channel for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestDecision {
    /// Send the email now
    Immediate,
    /// Hold the email for the batch identified by `bucket`
    QueueForBatch { bucket: BucketKey, fire_at: DateTime<Utc> },
    /// Digest is on but this event does not qualify; no email is sent
    Skip(SkipReason),
}

/// Decide how the email channel handles `event` for `user_id`.
pub fn on_event(
    user_id: &str,
    settings: &EmailDigestSettings,
    event: &NotificationEvent,
    now: DateTime<Utc>,
) -> DigestDecision {
    if !settings.enabled {
        return DigestDecision::Immediate;
    }

    let Some(fire_at) = next_fire_time(settings, now) else {
        return DigestDecision::Immediate;
    };

    if !settings.include_categories.is_empty()
        && !settings.include_categories.contains(&event.category)
    {
        return DigestDecision::Skip(SkipReason::CategoryExcluded);
    }

    if event.priority.rank() < settings.min_priority.rank() {
        return DigestDecision::Skip(SkipReason::BelowMinPriority);
    }

    DigestDecision::QueueForBatch {
        bucket: BucketKey {
            user_id: user_id.to_string(),
            frequency: settings.frequency,
            fire_at,
        },
        fire_at,
    }
}

/// Next time a digest with these settings fires after `now`.
///
/// `None` for `Immediate`. Hourly fires at the top of the next local hour,
/// Daily at the next local `time` strictly after `now`, Weekly at the next
/// `day_of_week` (0 = Sunday) at `time`, counting today when it has not
/// reached `time` yet.
pub fn next_fire_time(settings: &EmailDigestSettings, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let tz = settings.timezone;
    let local = now.with_timezone(&tz).naive_local();
    let today = local.date();

    let target = match settings.frequency {
        DigestFrequency::Immediate => return None,
        DigestFrequency::Hourly => {
            // Step on the instant timeline so a repeated fall-back hour
            // still fires one hour later.
            let zoned = now.with_timezone(&tz);
            let into_hour = Duration::seconds(i64::from(zoned.minute() * 60 + zoned.second()))
                + Duration::nanoseconds(i64::from(zoned.nanosecond()));
            let top = zoned - into_hour + Duration::hours(1);
            return Some(top.with_timezone(&Utc));
        }
        DigestFrequency::Daily => {
            let candidate = today.and_time(settings.time);
            if local < candidate {
                candidate
            } else {
                candidate + Duration::days(1)
            }
        }
        DigestFrequency::Weekly => {
            let current = i64::from(today.weekday().num_days_from_sunday());
            let wanted = i64::from(settings.day_of_week % 7);
            let mut ahead = (wanted - current).rem_euclid(7);
            if ahead == 0 && local >= today.and_time(settings.time) {
                ahead = 7;
            }
            (today + Duration::days(ahead)).and_time(settings.time)
        }
    };

    Some(to_utc(tz, target))
}

/// Map a local wall-clock time to UTC. Times skipped by a DST jump move
/// forward an hour; repeated times take the earlier instant.
fn to_utc(tz: Tz, mut local: NaiveDateTime) -> DateTime<Utc> {
    for _ in 0..4 {
        if let Some(resolved) = tz.from_local_datetime(&local).earliest() {
            return resolved.with_timezone(&Utc);
        }
        local += Duration::hours(1);
    }
    Utc.from_utc_datetime(&local)
}
