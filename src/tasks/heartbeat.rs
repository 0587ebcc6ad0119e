use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc::error::TrySendError};

use crate::config::WebSocketConfig;
use crate::connection_manager::ConnectionManager;
use crate::metrics::HeartbeatMetrics;
use crate::websocket::ServerEvent;

/// Outcome of one heartbeat round
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatRound {
    pub sent: usize,
    /// Writer buffer full; the session is kept and retried next round
    pub backlogged: usize,
    /// Writer gone; the session was unregistered
    pub closed: usize,
}

/// Sends `heartbeat` frames to authenticated sessions and sweeps idle ones.
///
/// Heartbeats never wait on a slow socket: a full writer buffer is skipped
/// and left to the inactivity sweep.
pub struct HeartbeatTask {
    config: WebSocketConfig,
    connections: Arc<ConnectionManager>,
    shutdown: broadcast::Receiver<()>,
}

impl HeartbeatTask {
    pub fn new(
        config: WebSocketConfig,
        connections: Arc<ConnectionManager>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            connections,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut beat = tokio::time::interval(Duration::from_secs(self.config.heartbeat_interval.max(1)));
        let mut sweep = tokio::time::interval(Duration::from_secs(self.config.cleanup_interval.max(1)));
        beat.tick().await;
        sweep.tick().await;

        tracing::info!(
            heartbeat_interval_secs = self.config.heartbeat_interval,
            cleanup_interval_secs = self.config.cleanup_interval,
            connection_timeout_secs = self.config.connection_timeout,
            "Heartbeat task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => break,
                _ = beat.tick() => {
                    self.beat();
                }
                _ = sweep.tick() => {
                    self.sweep();
                }
            }
        }

        tracing::info!("Heartbeat task stopped");
    }

    /// Queue one heartbeat per session
    pub fn beat(&self) -> HeartbeatRound {
        let started = Instant::now();
        let mut round = HeartbeatRound::default();

        for handle in self.connections.get_all_connections() {
            match handle.sender.try_send(ServerEvent::Heartbeat) {
                Ok(()) => round.sent += 1,
                Err(TrySendError::Full(_)) => round.backlogged += 1,
                Err(TrySendError::Closed(_)) => {
                    if self.connections.unregister(handle.id) {
                        round.closed += 1;
                    }
                }
            }
        }

        HeartbeatMetrics::record_duration_ms(started.elapsed().as_millis() as u64);
        if round.closed > 0 {
            HeartbeatMetrics::record_stale_removed(round.closed as u64);
        }
        if round.sent + round.backlogged + round.closed > 0 {
            tracing::debug!(
                sent = round.sent,
                backlogged = round.backlogged,
                closed = round.closed,
                "Heartbeat round"
            );
        }
        round
    }

    /// Drop sessions idle past `connection_timeout`
    pub fn sweep(&self) -> usize {
        let removed = self
            .connections
            .cleanup_stale_connections(self.config.connection_timeout);

        if removed > 0 {
            HeartbeatMetrics::record_stale_removed(removed as u64);
            tracing::info!(
                removed = removed,
                timeout_secs = self.config.connection_timeout,
                "Removed idle sessions"
            );
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::sync::mpsc;

    fn task(connections: Arc<ConnectionManager>) -> (HeartbeatTask, broadcast::Sender<()>) {
        let (tx, rx) = broadcast::channel(1);
        (HeartbeatTask::new(WebSocketConfig::default(), connections, rx), tx)
    }

    #[test]
    fn test_beat_classifies_sessions() {
        let connections = Arc::new(ConnectionManager::new());
        let (live_tx, mut live_rx) = mpsc::channel(4);
        let (full_tx, _full_rx) = mpsc::channel(1);
        let (dead_tx, dead_rx) = mpsc::channel(1);

        connections.register("u1".into(), live_tx);
        let full = connections.register("u2".into(), full_tx);
        full.sender.try_send(ServerEvent::Pong).unwrap();
        let dead = connections.register("u3".into(), dead_tx);
        drop(dead_rx);

        let (task, _shutdown) = task(connections.clone());
        let round = task.beat();

        assert_eq!(
            round,
            HeartbeatRound {
                sent: 1,
                backlogged: 1,
                closed: 1
            }
        );
        assert_eq!(live_rx.try_recv().unwrap(), ServerEvent::Heartbeat);
        assert!(connections.get_connection(full.id).is_some());
        assert!(connections.get_connection(dead.id).is_none());
    }

    #[test]
    fn test_sweep_removes_idle_sessions() {
        let connections = Arc::new(ConnectionManager::new());
        let idle = connections.register("u1".into(), mpsc::channel(1).0);
        idle.set_last_activity(Utc::now() - chrono::Duration::seconds(600));
        connections.register("u2".into(), mpsc::channel(1).0);

        let (task, _shutdown) = task(connections.clone());

        assert_eq!(task.sweep(), 1);
        assert_eq!(connections.stats().total_connections, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sends_heartbeats_until_shutdown() {
        let connections = Arc::new(ConnectionManager::new());
        let (tx, mut rx) = mpsc::channel(8);
        connections.register("u1".into(), tx);

        let (task, shutdown) = task(connections);
        let handle = tokio::spawn(task.run());

        let frame = tokio::time::timeout(Duration::from_secs(30), rx.recv())
            .await
            .expect("heartbeat within one interval")
            .expect("writer channel open");
        assert_eq!(frame, ServerEvent::Heartbeat);

        shutdown.send(()).unwrap();
        handle.await.unwrap();
    }
}
