use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::metrics::{CONNECTIONS_TOTAL, USERS_CONNECTED};
use crate::websocket::ServerEvent;

use super::{ConnectionHandle, ConnectionStats};

/// Registry of authenticated WebSocket sessions.
///
/// A user may hold several sessions (one per device or tab); sessions are
/// only registered after the `authenticate` handshake succeeds.
pub struct ConnectionManager {
    /// connection_id -> ConnectionHandle
    connections: DashMap<Uuid, Arc<ConnectionHandle>>,
    /// user_id -> Set<connection_id>
    user_index: DashMap<String, HashSet<Uuid>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            user_index: DashMap::new(),
        }
    }

    /// Register an authenticated session
    pub fn register(&self, user_id: String, sender: mpsc::Sender<ServerEvent>) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle::new(user_id.clone(), sender));
        let conn_id = handle.id;

        self.connections.insert(conn_id, handle.clone());
        self.user_index.entry(user_id).or_default().insert(conn_id);
        self.update_gauges();

        tracing::info!(connection_id = %conn_id, user_id = %handle.user_id, "Connection registered");

        handle
    }

    /// Unregister a session. Returns false if it was already gone.
    pub fn unregister(&self, connection_id: Uuid) -> bool {
        let Some((_, handle)) = self.connections.remove(&connection_id) else {
            return false;
        };

        if let Some(mut user_conns) = self.user_index.get_mut(&handle.user_id) {
            user_conns.remove(&connection_id);
            if user_conns.is_empty() {
                drop(user_conns);
                self.user_index
                    .remove_if(&handle.user_id, |_, conns| conns.is_empty());
            }
        }
        self.update_gauges();

        tracing::info!(connection_id = %connection_id, user_id = %handle.user_id, "Connection unregistered");
        true
    }

    /// Get all sessions for a user
    pub fn get_user_connections(&self, user_id: &str) -> Vec<Arc<ConnectionHandle>> {
        self.user_index
            .get(user_id)
            .map(|conn_ids| {
                conn_ids
                    .iter()
                    .filter_map(|id| self.connections.get(id).map(|h| h.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_user_online(&self, user_id: &str) -> bool {
        self.user_index.contains_key(user_id)
    }

    /// Get all sessions
    pub fn get_all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.iter().map(|r| r.value().clone()).collect()
    }

    /// Get session by ID
    pub fn get_connection(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        self.connections.get(&connection_id).map(|h| h.clone())
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            total_connections: self.connections.len(),
            unique_users: self.user_index.len(),
        }
    }

    /// Find sessions that have been inactive for longer than the timeout
    pub fn find_stale_connections(&self, timeout_secs: u64) -> Vec<Uuid> {
        let now = Utc::now();
        let timeout = chrono::Duration::seconds(timeout_secs as i64);

        self.connections
            .iter()
            .filter(|entry| now.signed_duration_since(entry.value().last_activity()) > timeout)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Remove stale sessions and return how many were removed
    pub fn cleanup_stale_connections(&self, timeout_secs: u64) -> usize {
        let stale = self.find_stale_connections(timeout_secs);
        let mut removed = 0;

        for conn_id in stale {
            tracing::info!(connection_id = %conn_id, "Removing stale connection due to timeout");
            if self.unregister(conn_id) {
                removed += 1;
            }
        }

        removed
    }

    fn update_gauges(&self) {
        CONNECTIONS_TOTAL.set(self.connections.len() as i64);
        USERS_CONNECTED.set(self.user_index.len() as i64);
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
