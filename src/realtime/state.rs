use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::notification::Notification;
use crate::websocket::NotificationUpdated;

/// Lifecycle of one realtime session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Transport is open but `authenticated` has not arrived yet
    Connected,
    Authenticated,
}

impl ConnectionState {
    /// Transport is up, authenticated or not
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Authenticated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a live transport went away
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The consumer asked for it
    Requested,
    /// The server closed the stream
    ServerClosed,
    /// No inbound frame within the heartbeat timeout
    HeartbeatTimeout,
    /// The transport reported an error
    Transport(String),
}

impl DisconnectReason {
    /// Whether the reconnect policy applies
    pub fn should_reconnect(&self) -> bool {
        !matches!(self, Self::Requested)
    }
}

/// Events surfaced to whoever owns a [`super::RealtimeChannel`]
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    StateChanged(ConnectionState),
    Authenticated { session_id: Uuid },
    Notification(Notification),
    NotificationUpdated(NotificationUpdated),
    ConnectError(String),
    Disconnected(DisconnectReason),
    /// A reconnect attempt is starting (1-based)
    ReconnectAttempt(u32),
    /// The session is authenticated again after `n` attempts
    Reconnected(u32),
    /// Attempts exhausted; nothing happens until the next `connect()`
    ReconnectFailed,
}
