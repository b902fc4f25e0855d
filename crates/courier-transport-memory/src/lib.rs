//! In-process message transport.
//!
//! This transport routes messages between endpoints within the same
//! process over bounded channels. Delivery is atomic per message — there
//! is no byte stream and therefore no framing — which makes it the
//! message-oriented counterpart to the TCP transport, and a convenient
//! transport for tests.

use async_trait::async_trait;
use bytes::Bytes;
use courier_transport::{Connection, Listener, Transport, TransportError};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::{debug, info};
use uuid::Uuid;

/// Channel depth per connection direction.
const CHANNEL_CAPACITY: usize = 100;

/// Global registry of listening endpoints for cross-connection routing.
static LISTENERS: Lazy<DashMap<String, flume::Sender<MemoryConnection>>> =
    Lazy::new(DashMap::new);

/// Memory transport implementation.
///
/// The transport itself is stateless; all routing state lives in a
/// process-global listener registry keyed by address string.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport;

impl MemoryTransport {
    /// Create a new memory transport.
    pub fn new() -> Self {
        Self
    }

    /// Drop every registered listener (useful between tests).
    pub fn clear_global_state() {
        LISTENERS.clear();
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, addr: &str) -> Result<Box<dyn Connection>, TransportError> {
        debug!("Connecting to memory endpoint {}", addr);

        // Clone the sender out so no registry lock is held across awaits.
        let listener = LISTENERS
            .get(addr)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::connection_failed(addr, "no listener at address"))?;

        // A bidirectional pair of bounded channels, one per direction.
        let (client_to_server_tx, client_to_server_rx) = flume::bounded(CHANNEL_CAPACITY);
        let (server_to_client_tx, server_to_client_rx) = flume::bounded(CHANNEL_CAPACITY);

        let conn_id = Uuid::new_v4();

        let client_conn = MemoryConnection {
            id: conn_id,
            sender: client_to_server_tx,
            receiver: server_to_client_rx,
        };
        let server_conn = MemoryConnection {
            id: conn_id,
            sender: server_to_client_tx,
            receiver: client_to_server_rx,
        };

        listener
            .send_async(server_conn)
            .await
            .map_err(|_| TransportError::connection_failed(addr, "listener closed"))?;

        info!("Memory connection {} established to {}", conn_id, addr);

        Ok(Box::new(client_conn))
    }

    async fn listen(&self, addr: &str) -> Result<Box<dyn Listener>, TransportError> {
        if addr.is_empty() {
            return Err(TransportError::InvalidAddress(addr.to_string()));
        }

        let (incoming_tx, incoming_rx) = flume::unbounded();

        // Registering and checking for duplicates must be one atomic step.
        match LISTENERS.entry(addr.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(TransportError::Other(format!(
                    "Address {addr} already has a listener"
                )));
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(incoming_tx);
            }
        }

        info!("Memory listener created for {}", addr);

        Ok(Box::new(MemoryListener {
            addr: addr.to_string(),
            incoming_rx,
        }))
    }
}

/// One endpoint of an in-process connection.
#[derive(Debug)]
struct MemoryConnection {
    id: Uuid,
    sender: flume::Sender<Bytes>,
    receiver: flume::Receiver<Bytes>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError> {
        debug!("Memory connection {} sending {} bytes", self.id, data.len());

        self.sender
            .send_async(data)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn recv(&mut self) -> Result<Bytes, TransportError> {
        match self.receiver.recv_async().await {
            Ok(data) => {
                debug!(
                    "Memory connection {} received {} bytes",
                    self.id,
                    data.len()
                );
                Ok(data)
            }
            Err(_) => Err(TransportError::ConnectionClosed),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        debug!("Closing memory connection {}", self.id);
        // Dropping the channel ends wake the peer with ConnectionClosed.
        Ok(())
    }
}

/// Listening endpoint in the global registry.
#[derive(Debug)]
struct MemoryListener {
    addr: String,
    incoming_rx: flume::Receiver<MemoryConnection>,
}

#[async_trait]
impl Listener for MemoryListener {
    async fn accept(&mut self) -> Result<Box<dyn Connection>, TransportError> {
        match self.incoming_rx.recv_async().await {
            Ok(conn) => {
                debug!("Memory listener {} accepted connection {}", self.addr, conn.id);
                Ok(Box::new(conn))
            }
            Err(_) => Err(TransportError::ConnectionClosed),
        }
    }

    fn local_addr(&self) -> String {
        self.addr.clone()
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        debug!("Closing memory listener for {}", self.addr);
        LISTENERS.remove(&self.addr);
        Ok(())
    }
}

impl Drop for MemoryListener {
    fn drop(&mut self) {
        LISTENERS.remove(&self.addr);
    }
}
