//! Client side of the realtime protocol: one self-healing WebSocket session
//! per user with bounded reconnects.

mod backoff;
mod channel;
pub mod memory_transport;
mod session_manager;
mod state;
mod transport;
mod ws_transport;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use channel::{ChannelConfig, RealtimeChannel};
pub use memory_transport::{MemoryPeer, MemoryServer, MemoryTransport};
pub use session_manager::{OpenedSession, SessionManager};
pub use state::{ChannelEvent, ConnectionState, DisconnectReason};
pub use transport::{Transport, TransportConnection, TransportError};
pub use ws_transport::WsTransport;
