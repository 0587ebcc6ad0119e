//! WebSocket transport over `tokio-tungstenite`.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::websocket::{ClientEvent, ServerEvent};

use super::transport::{Transport, TransportConnection, TransportError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connects to the engine's `/ws` endpoint, passing the JWT as `token`
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
    token: String,
}

impl WsTransport {
    /// `url` is the full endpoint, e.g. `ws://localhost:8081/ws`
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }

    fn endpoint(&self) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}token={}", self.url, separator, self.token)
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<Box<dyn TransportConnection>, TransportError> {
        let (stream, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(self.endpoint()))
            .await
            .map_err(|_| TransportError::Connect(format!("timed out connecting to {}", self.url)))?
            .map_err(|e| TransportError::Connect(format!("failed to connect to {}: {e}", self.url)))?;

        tracing::debug!(url = %self.url, "WebSocket transport connected");
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl TransportConnection for WsConnection {
    async fn send(&mut self, event: ClientEvent) -> Result<(), TransportError> {
        let text = serde_json::to_string(&event).map_err(|e| TransportError::Protocol(e.to_string()))?;
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<ServerEvent, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(TransportError::Protocol(e.to_string()))),
            };

            match message {
                Message::Text(text) => {
                    return Some(
                        serde_json::from_str(&text).map_err(|e| TransportError::Protocol(e.to_string())),
                    );
                }
                Message::Close(_) => return None,
                // Control frames are answered by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                Message::Binary(_) => {
                    tracing::debug!("Ignoring binary frame");
                    continue;
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
