//! Server-side registry of authenticated WebSocket sessions.

mod registry;
mod stats;
mod types;

pub use registry::ConnectionManager;
pub use stats::ConnectionStats;
pub use types::ConnectionHandle;
