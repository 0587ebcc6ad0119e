use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::RealtimeConfig;
use crate::websocket::{ClientEvent, ServerEvent};

use super::backoff::{BackoffConfig, ExponentialBackoff};
use super::state::{ChannelEvent, ConnectionState, DisconnectReason};
use super::transport::{Transport, TransportConnection, TransportError};

/// Reconnect and liveness policy for one channel
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub backoff: BackoffConfig,
    /// Reconnect attempts before giving up until the next `connect()`
    pub max_attempts: u32,
    /// Inbound silence treated as a dead transport
    pub heartbeat_timeout: Duration,
    pub ping_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

impl From<&RealtimeConfig> for ChannelConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            backoff: BackoffConfig::from(config),
            max_attempts: config.reconnect_max_attempts,
            heartbeat_timeout: config.heartbeat_timeout(),
            ping_interval: config.ping_interval(),
        }
    }
}

#[derive(Debug)]
enum Command {
    Connect,
    Disconnect,
}

/// Client-side realtime session for one user.
///
/// A single driver task owns the transport, so connects, authentications
/// and reconnects never overlap. This handle only sends commands and reads
/// the published state. Dropping the handle stops the driver.
pub struct RealtimeChannel {
    user_id: String,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl RealtimeChannel {
    /// Spawn the driver task. The channel starts disconnected; call
    /// [`connect`](Self::connect) to open it.
    pub fn spawn(
        user_id: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: ChannelConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let user_id = user_id.into();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let driver = Driver {
            user_id: user_id.clone(),
            transport,
            backoff: ExponentialBackoff::with_config(config.backoff.clone()),
            config,
            commands: commands_rx,
            state: state_tx,
            events: events_tx,
            cancel: cancel.clone(),
        };
        tokio::spawn(driver.run());

        (
            Self {
                user_id,
                commands: commands_tx,
                state: state_rx,
                cancel,
            },
            events_rx,
        )
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Open the transport and authenticate. No-op while already connecting
    /// or connected; skips the wait of a pending reconnect.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Close the transport and cancel any pending reconnect
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Stop the driver for good
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Connectivity flag: the transport is up
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == ConnectionState::Authenticated
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// What the driver does next
enum Next {
    Idle,
    Connect { attempt: u32 },
    Wait { attempt: u32, delay: Duration },
    Stop,
}

struct Driver {
    user_id: String,
    transport: Arc<dyn Transport>,
    config: ChannelConfig,
    backoff: ExponentialBackoff,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(mut self) {
        let mut next = Next::Idle;

        loop {
            next = match next {
                Next::Idle => self.idle().await,
                Next::Connect { attempt } => self.connect(attempt).await,
                Next::Wait { attempt, delay } => self.wait(attempt, delay).await,
                Next::Stop => break,
            };
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::debug!(user_id = %self.user_id, "Realtime channel stopped");
    }

    async fn idle(&mut self) -> Next {
        tokio::select! {
            _ = self.cancel.cancelled() => Next::Stop,
            command = self.commands.recv() => match command {
                Some(Command::Connect) => {
                    self.backoff.reset();
                    Next::Connect { attempt: 0 }
                }
                Some(Command::Disconnect) => Next::Idle,
                None => Next::Stop,
            },
        }
    }

    /// Cancellable wait before reconnect attempt `attempt`
    async fn wait(&mut self, attempt: u32, delay: Duration) -> Next {
        tracing::info!(
            user_id = %self.user_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );

        tokio::select! {
            _ = self.cancel.cancelled() => Next::Stop,
            _ = tokio::time::sleep(delay) => Next::Connect { attempt },
            command = self.commands.recv() => match command {
                Some(Command::Connect) => Next::Connect { attempt },
                Some(Command::Disconnect) => {
                    tracing::info!(user_id = %self.user_id, "Pending reconnect cancelled");
                    Next::Idle
                }
                None => Next::Stop,
            },
        }
    }

    /// Connect attempt `attempt` (0 for the initial connect)
    async fn connect(&mut self, attempt: u32) -> Next {
        self.set_state(ConnectionState::Connecting);
        if attempt > 0 {
            self.emit(ChannelEvent::ReconnectAttempt(attempt));
        }

        let transport = self.transport.clone();
        let connecting = transport.connect();
        tokio::pin!(connecting);

        let result = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Next::Stop,
                result = &mut connecting => break result,
                command = self.commands.recv() => match command {
                    Some(Command::Connect) => {}
                    Some(Command::Disconnect) => {
                        self.set_state(ConnectionState::Disconnected);
                        return Next::Idle;
                    }
                    None => return Next::Stop,
                },
            }
        };

        let mut conn = match result {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, attempt, error = %e, "Realtime connect failed");
                self.emit(ChannelEvent::ConnectError(e.to_string()));
                return self.after_failure(attempt);
            }
        };

        self.set_state(ConnectionState::Connected);

        let ended = match conn.send(ClientEvent::authenticate(self.user_id.clone())).await {
            Ok(()) => self.session(conn.as_mut(), attempt).await,
            Err(e) => Some((DisconnectReason::Transport(e.to_string()), false)),
        };
        conn.close().await;

        let Some((reason, authenticated)) = ended else {
            return Next::Stop;
        };

        tracing::info!(user_id = %self.user_id, reason = ?reason, "Realtime transport disconnected");
        self.set_state(ConnectionState::Disconnected);
        self.emit(ChannelEvent::Disconnected(reason.clone()));

        if !reason.should_reconnect() {
            return Next::Idle;
        }
        if authenticated {
            // A session that authenticated starts a fresh reconnect series.
            self.backoff.reset();
            return self.after_failure(0);
        }
        self.after_failure(attempt)
    }

    /// Schedule the next attempt, or give up once attempts are exhausted
    fn after_failure(&mut self, attempt: u32) -> Next {
        self.set_state(ConnectionState::Disconnected);

        if attempt >= self.config.max_attempts {
            tracing::warn!(
                user_id = %self.user_id,
                attempts = attempt,
                "Reconnect attempts exhausted"
            );
            self.emit(ChannelEvent::ReconnectFailed);
            return Next::Idle;
        }

        Next::Wait {
            attempt: attempt + 1,
            delay: self.backoff.next_delay(),
        }
    }

    /// Pump one open connection until it ends. `None` means the driver
    /// must stop.
    async fn session(
        &mut self,
        conn: &mut dyn TransportConnection,
        attempt: u32,
    ) -> Option<(DisconnectReason, bool)> {
        let mut authenticated = false;

        let idle = tokio::time::sleep(self.config.heartbeat_timeout);
        tokio::pin!(idle);

        let mut ping = tokio::time::interval_at(
            Instant::now() + self.config.ping_interval,
            self.config.ping_interval,
        );
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                command = self.commands.recv() => match command {
                    Some(Command::Disconnect) => {
                        return Some((DisconnectReason::Requested, authenticated));
                    }
                    Some(Command::Connect) => {}
                    None => return None,
                },
                frame = conn.recv() => match frame {
                    Some(Ok(event)) => {
                        idle.as_mut().reset(Instant::now() + self.config.heartbeat_timeout);
                        if let Err(e) = self.handle_event(conn, event, attempt, &mut authenticated).await {
                            return Some((DisconnectReason::Transport(e.to_string()), authenticated));
                        }
                    }
                    Some(Err(e)) => {
                        return Some((DisconnectReason::Transport(e.to_string()), authenticated));
                    }
                    None => return Some((DisconnectReason::ServerClosed, authenticated)),
                },
                _ = &mut idle => {
                    tracing::warn!(user_id = %self.user_id, "Realtime heartbeat timed out");
                    return Some((DisconnectReason::HeartbeatTimeout, authenticated));
                }
                _ = ping.tick() => {
                    if let Err(e) = conn.send(ClientEvent::Ping).await {
                        return Some((DisconnectReason::Transport(e.to_string()), authenticated));
                    }
                }
            }
        }
    }

    async fn handle_event(
        &mut self,
        conn: &mut dyn TransportConnection,
        event: ServerEvent,
        attempt: u32,
        authenticated: &mut bool,
    ) -> Result<(), TransportError> {
        match event {
            ServerEvent::Authenticated(info) => {
                if info.user_id != self.user_id {
                    tracing::warn!(
                        user_id = %self.user_id,
                        reported = %info.user_id,
                        "Ignoring authenticated frame for another user"
                    );
                    return Ok(());
                }
                if *authenticated {
                    return Ok(());
                }

                *authenticated = true;
                self.set_state(ConnectionState::Authenticated);
                self.emit(ChannelEvent::Authenticated {
                    session_id: info.session_id,
                });
                if attempt > 0 {
                    self.emit(ChannelEvent::Reconnected(attempt));
                }
                tracing::info!(
                    user_id = %self.user_id,
                    session_id = %info.session_id,
                    "Realtime session authenticated"
                );
            }
            ServerEvent::NotificationNew(notification) => {
                let id = notification.id;
                self.emit(ChannelEvent::Notification(notification));
                conn.send(ClientEvent::ack(id)).await?;
            }
            ServerEvent::NotificationUpdated(updated) => {
                self.emit(ChannelEvent::NotificationUpdated(updated));
            }
            ServerEvent::Pong | ServerEvent::Heartbeat => {}
            ServerEvent::Error(error) => {
                tracing::warn!(
                    user_id = %self.user_id,
                    code = %error.code,
                    message = %error.message,
                    "Server reported error"
                );
            }
        }
        Ok(())
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            self.emit(ChannelEvent::StateChanged(next));
        }
    }

    fn emit(&self, event: ChannelEvent) {
        // The consumer may have gone away; the session keeps running.
        let _ = self.events.send(event);
    }
}
