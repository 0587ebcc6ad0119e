//! Long-running background tasks, stopped through the shutdown broadcast.

mod digest_flush;
mod heartbeat;

pub use digest_flush::DigestFlushTask;
pub use heartbeat::{HeartbeatRound, HeartbeatTask};
