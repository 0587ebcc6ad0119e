use std::collections::HashSet;

use thiserror::Error;

use super::NotificationPreferences;

/// Preferences rejected before they could replace the stored snapshot
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid preferences: {}", .issues.join("; "))]
pub struct ValidationError {
    pub issues: Vec<String>,
}

/// Check a candidate preference object. Collects every problem instead of
/// stopping at the first one.
pub fn validate(prefs: &NotificationPreferences) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    if prefs.email_digest.day_of_week > 6 {
        issues.push(format!(
            "emailDigest.dayOfWeek must be 0-6, got {}",
            prefs.email_digest.day_of_week
        ));
    }

    for day in &prefs.quiet_hours.days_of_week {
        if *day > 6 {
            issues.push(format!("quietHours.daysOfWeek contains {day}, expected 0-6"));
        }
    }

    let mut seen = HashSet::new();
    for (index, rule) in prefs.event_overrides.iter().enumerate() {
        if rule.event_type.as_str().trim().is_empty() {
            issues.push(format!("eventOverrides[{index}].type must not be empty"));
        }
        if !seen.insert(rule.event_type.as_str()) {
            issues.push(format!(
                "eventOverrides[{index}] duplicates type {}",
                rule.event_type
            ));
        }
        if rule.enabled && rule.channels.is_empty() {
            issues.push(format!(
                "eventOverrides[{index}] is enabled but selects no channels"
            ));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues })
    }
}
