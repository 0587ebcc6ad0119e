//! Email digest scheduling.
//!
//! `scheduler` decides, per event, whether an email goes out now or joins a
//! batch; `queue` holds the batches until their fire time. Draining due
//! batches is done by [`crate::tasks::DigestFlushTask`].

mod queue;
pub mod scheduler;

pub use queue::{DigestBucket, DigestQueue, DigestQueueStats};
pub use scheduler::{next_fire_time, on_event, BucketKey, DigestDecision, SkipReason};
