//! In-process transport, paired with a [`MemoryServer`] that plays the
//! server side of each connection.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::websocket::{ClientEvent, ServerEvent};

use super::transport::{Transport, TransportConnection, TransportError};

struct Shared {
    fail_next: AtomicU32,
    attempts: AtomicU32,
    accepted: mpsc::UnboundedSender<MemoryPeer>,
}

/// Client side: hands out connections to the paired [`MemoryServer`]
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

/// Server side: yields one [`MemoryPeer`] per successful connect
pub struct MemoryServer {
    shared: Arc<Shared>,
    incoming: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryTransport, MemoryServer) {
        let (accepted, incoming) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            fail_next: AtomicU32::new(0),
            attempts: AtomicU32::new(0),
            accepted,
        });
        (
            MemoryTransport {
                shared: shared.clone(),
            },
            MemoryServer { shared, incoming },
        )
    }
}

impl MemoryServer {
    /// Refuse the next `count` connect attempts
    pub fn fail_next(&self, count: u32) {
        self.shared.fail_next.store(count, Ordering::SeqCst);
    }

    /// Connect attempts seen so far, successful or not
    pub fn connect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Wait for the next accepted connection
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.incoming.recv().await
    }

    /// An already accepted connection, if any
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.incoming.try_recv().ok()
    }
}

/// Server end of one connection. Dropping it closes the connection.
pub struct MemoryPeer {
    from_client: mpsc::UnboundedReceiver<ClientEvent>,
    to_client: mpsc::UnboundedSender<ServerEvent>,
}

impl MemoryPeer {
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        self.from_client.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ClientEvent> {
        self.from_client.try_recv().ok()
    }

    pub fn send(&self, event: ServerEvent) -> bool {
        self.to_client.send(event).is_ok()
    }
}

struct MemoryConnection {
    to_server: Option<mpsc::UnboundedSender<ClientEvent>>,
    from_server: mpsc::UnboundedReceiver<ServerEvent>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> Result<Box<dyn TransportConnection>, TransportError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .shared
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Connect("connection refused".into()));
        }

        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();
        self.shared
            .accepted
            .send(MemoryPeer {
                from_client,
                to_client,
            })
            .map_err(|_| TransportError::Connect("server gone".into()))?;

        Ok(Box::new(MemoryConnection {
            to_server: Some(to_server),
            from_server,
        }))
    }
}

#[async_trait]
impl TransportConnection for MemoryConnection {
    async fn send(&mut self, event: ClientEvent) -> Result<(), TransportError> {
        self.to_server
            .as_ref()
            .ok_or(TransportError::Closed)?
            .send(event)
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<ServerEvent, TransportError>> {
        self.from_server.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.to_server = None;
        self.from_server.close();
    }
}
