//! Notification preferences: model, storage and resolution.
//!
//! - `types`: the preference snapshot and its sections
//! - `quiet_hours`: quiet-window predicate
//! - `resolver`: event + preferences -> channels
//! - `store`: per-user snapshots with atomic whole-object replace
//! - `validation`: checks applied before a replace is accepted

pub mod quiet_hours;
pub mod resolver;
mod store;
pub mod time_format;
mod types;
mod validation;

pub use quiet_hours::is_quiet;
pub use resolver::{resolve, Resolution, ResolutionOutcome};
pub use store::PreferenceStore;
pub use types::{
    CategoryPreference, DigestFrequency, EmailDigestSettings, EventOverride,
    NotificationPreferences, QuietHours,
};
pub use validation::{validate, ValidationError};
