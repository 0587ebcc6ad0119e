use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::channel::{ChannelConfig, RealtimeChannel};
use super::state::ChannelEvent;
use super::transport::Transport;

/// Result of [`SessionManager::open`]
pub enum OpenedSession {
    /// A new channel was spawned; the caller owns its event stream
    Created {
        channel: Arc<RealtimeChannel>,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
    },
    /// The user already had a live channel
    Existing(Arc<RealtimeChannel>),
}

impl OpenedSession {
    pub fn channel(&self) -> &Arc<RealtimeChannel> {
        match self {
            Self::Created { channel, .. } => channel,
            Self::Existing(channel) => channel,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// Keeps at most one realtime channel per user
pub struct SessionManager {
    config: ChannelConfig,
    sessions: DashMap<String, Arc<RealtimeChannel>>,
}

impl SessionManager {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
        }
    }

    /// Return the live channel for `user_id`, or spawn and connect a new
    /// one over the transport built by `make_transport`.
    ///
    /// The factory runs without any map lock held, so it may call back into
    /// the manager. When two callers race, the first insert wins and the
    /// other channel is closed before it connects.
    pub fn open<F>(&self, user_id: &str, make_transport: F) -> OpenedSession
    where
        F: FnOnce() -> Arc<dyn Transport>,
    {
        if let Some(existing) = self.get(user_id) {
            return OpenedSession::Existing(existing);
        }

        let (channel, events) =
            RealtimeChannel::spawn(user_id, make_transport(), self.config.clone());
        let channel = Arc::new(channel);

        match self.sessions.entry(user_id.to_string()) {
            Entry::Occupied(entry) if !entry.get().is_closed() => {
                let existing = entry.get().clone();
                drop(entry);
                channel.close();
                return OpenedSession::Existing(existing);
            }
            Entry::Occupied(mut entry) => {
                entry.insert(channel.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(channel.clone());
            }
        }

        channel.connect();
        tracing::info!(user_id = %user_id, "Realtime session opened");
        OpenedSession::Created { channel, events }
    }

    pub fn get(&self, user_id: &str) -> Option<Arc<RealtimeChannel>> {
        self.sessions
            .get(user_id)
            .filter(|channel| !channel.is_closed())
            .map(|channel| channel.clone())
    }

    /// Stop and forget the channel for `user_id`
    pub fn close(&self, user_id: &str) -> bool {
        match self.sessions.remove(user_id) {
            Some((_, channel)) => {
                channel.close();
                tracing::info!(user_id = %user_id, "Realtime session closed");
                true
            }
            None => false,
        }
    }

    pub fn close_all(&self) {
        let count = self.sessions.len();
        self.sessions.retain(|_, channel| {
            channel.close();
            false
        });
        tracing::info!(count, "Closed all realtime sessions");
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::memory_transport::MemoryTransport;
    use crate::realtime::ConnectionState;
    use crate::websocket::ClientEvent;

    #[tokio::test(start_paused = true)]
    async fn test_open_reuses_live_channel() {
        let (transport, mut server) = MemoryTransport::pair();
        let manager = SessionManager::new(ChannelConfig::default());

        let first = manager.open("u1", || Arc::new(transport.clone()));
        assert!(first.is_created());

        let mut peer = server.accept().await.expect("connected");
        assert_eq!(peer.recv().await, Some(ClientEvent::authenticate("u1")));

        let second = manager.open("u1", || Arc::new(transport.clone()));
        assert!(!second.is_created());
        assert!(Arc::ptr_eq(first.channel(), second.channel()));
        assert_eq!(manager.len(), 1);
        assert_eq!(server.connect_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_factory_may_query_manager() {
        let (transport, mut server) = MemoryTransport::pair();
        let manager = SessionManager::new(ChannelConfig::default());

        let opened = manager.open("u1", || {
            assert!(manager.get("u1").is_none());
            assert_eq!(manager.len(), 0);
            Arc::new(transport.clone())
        });
        assert!(opened.is_created());
        assert!(manager.get("u1").is_some());

        let mut peer = server.accept().await.expect("connected");
        assert_eq!(peer.recv().await, Some(ClientEvent::authenticate("u1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_channel() {
        let (transport, mut server) = MemoryTransport::pair();
        let manager = SessionManager::new(ChannelConfig::default());

        let opened = manager.open("u1", || Arc::new(transport.clone()));
        let _peer = server.accept().await.expect("connected");
        let mut state = opened.channel().watch_state();

        assert!(manager.close("u1"));
        assert!(!manager.close("u1"));
        assert!(manager.get("u1").is_none());

        state
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await
            .expect("state published");
        assert!(opened.channel().is_closed());

        let reopened = manager.open("u1", || Arc::new(transport.clone()));
        assert!(reopened.is_created());
        manager.close_all();
        assert!(manager.is_empty());
    }
}
