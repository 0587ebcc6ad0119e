//! Per-user preference snapshots.

use std::sync::Arc;

use dashmap::DashMap;

use super::validation::{validate, ValidationError};
use super::NotificationPreferences;

/// Holds one immutable preference snapshot per user.
///
/// Readers get an `Arc` to the current snapshot and never observe a
/// half-written object; writers validate first and swap the whole `Arc`.
pub struct PreferenceStore {
    snapshots: DashMap<String, Arc<NotificationPreferences>>,
    defaults: Arc<NotificationPreferences>,
}

impl PreferenceStore {
    pub fn new() -> Self {
        Self::with_defaults(NotificationPreferences::default())
    }

    /// Use a custom default object for users without stored preferences
    pub fn with_defaults(defaults: NotificationPreferences) -> Self {
        Self {
            snapshots: DashMap::new(),
            defaults: Arc::new(defaults),
        }
    }

    /// Current snapshot, falling back to the defaults
    pub fn get(&self, user_id: &str) -> Arc<NotificationPreferences> {
        self.snapshots
            .get(user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| self.defaults.clone())
    }

    /// Whether the user has stored (non-default) preferences
    pub fn contains(&self, user_id: &str) -> bool {
        self.snapshots.contains_key(user_id)
    }

    /// Replace the user's preferences as a whole.
    ///
    /// On validation failure nothing is written and the previous snapshot
    /// stays in place.
    pub fn replace(
        &self,
        user_id: &str,
        prefs: NotificationPreferences,
    ) -> Result<Arc<NotificationPreferences>, ValidationError> {
        if let Err(e) = validate(&prefs) {
            tracing::warn!(user_id = %user_id, error = %e, "Rejected preference update");
            return Err(e);
        }

        let snapshot = Arc::new(prefs);
        self.snapshots.insert(user_id.to_string(), snapshot.clone());

        tracing::info!(user_id = %user_id, "Preferences replaced");
        Ok(snapshot)
    }

    /// Drop stored preferences so the defaults apply again
    pub fn reset(&self, user_id: &str) -> Arc<NotificationPreferences> {
        self.snapshots.remove(user_id);
        tracing::info!(user_id = %user_id, "Preferences reset to default");
        self.defaults.clone()
    }

    /// Number of users with stored preferences
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl Default for PreferenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_get_falls_back_to_defaults() {
        let store = PreferenceStore::new();
        assert_eq!(*store.get("nobody"), NotificationPreferences::default());
        assert!(!store.contains("nobody"));
    }

    #[test]
    fn test_replace_and_reset() {
        let store = PreferenceStore::new();
        let mut prefs = NotificationPreferences::default();
        prefs.sound_enabled = false;

        store.replace("user-1", prefs.clone()).unwrap();
        assert!(!store.get("user-1").sound_enabled);
        assert!(store.get("user-2").sound_enabled);

        store.reset("user-1");
        assert!(store.get("user-1").sound_enabled);
        assert!(store.is_empty());
    }

    #[test]
    fn test_invalid_replace_keeps_previous_snapshot() {
        let store = PreferenceStore::new();
        let mut good = NotificationPreferences::default();
        good.batch_notifications = true;
        assert_ok!(store.replace("user-1", good.clone()));

        let mut bad = NotificationPreferences::default();
        bad.email_digest.day_of_week = 12;
        assert_err!(store.replace("user-1", bad));

        assert_eq!(*store.get("user-1"), good);
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let store = PreferenceStore::new();
        store.replace("user-1", NotificationPreferences::default()).unwrap();
        let before = store.get("user-1");

        let mut next = NotificationPreferences::default();
        next.enabled = false;
        store.replace("user-1", next).unwrap();

        assert!(before.enabled);
        assert!(!store.get("user-1").enabled);
    }
}
