//! Transport seam for [`super::RealtimeChannel`].

use async_trait::async_trait;
use thiserror::Error;

use crate::websocket::{ClientEvent, ServerEvent};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("transport closed")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Opens connections to the realtime endpoint
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn TransportConnection>, TransportError>;
}

/// One open connection.
///
/// `recv` must be cancel-safe: the channel driver polls it inside
/// `tokio::select!`.
#[async_trait]
pub trait TransportConnection: Send {
    async fn send(&mut self, event: ClientEvent) -> Result<(), TransportError>;

    /// Next server frame; `None` once the server has closed the stream
    async fn recv(&mut self) -> Option<Result<ServerEvent, TransportError>>;

    async fn close(&mut self);
}
