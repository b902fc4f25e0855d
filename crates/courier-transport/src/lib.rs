//! Generic transport abstraction for RPC communication.
//!
//! This crate provides a transport-agnostic interface for moving framed
//! messages between a client and a server. Specific transport
//! implementations (TCP, in-memory, etc.) live in separate crates.
//!
//! Transports handle:
//! - Connection establishment and teardown
//! - Message boundaries (length-prefixing on byte streams, atomic delivery
//!   on message-oriented transports)
//! - Size limits and connect timeouts
//!
//! Everything above this layer — framing semantics, request dispatch,
//! connection pooling — is written against these traits, never against a
//! concrete transport.

pub mod error;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;
use std::time::Duration;

pub use error::TransportError as Error;
pub use error::TransportError;

/// A transport capable of dialing out and listening for peers.
///
/// Addresses are plain strings; each transport interprets them in its own
/// way (`host:port` for TCP, an arbitrary registry key for the in-memory
/// transport) and rejects ones it cannot understand with
/// [`TransportError::InvalidAddress`].
#[async_trait]
pub trait Transport: Debug + Send + Sync + 'static {
    /// Open a connection to a listening peer.
    async fn connect(&self, addr: &str) -> Result<Box<dyn Connection>, TransportError>;

    /// Start listening for incoming connections.
    async fn listen(&self, addr: &str) -> Result<Box<dyn Listener>, TransportError>;
}

/// A single established connection.
///
/// `send` and `recv` operate on whole messages: a message passed to `send`
/// on one side is returned intact by exactly one `recv` on the other side,
/// in order. Stream transports achieve this with explicit framing; message
/// transports deliver atomically by construction.
///
/// Methods take `&mut self`: a connection has exactly one owner at a time
/// and carries at most one in-flight exchange.
#[async_trait]
pub trait Connection: Debug + Send + 'static {
    /// Send one message to the peer.
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError>;

    /// Receive the next message from the peer.
    ///
    /// Returns [`TransportError::ConnectionClosed`] once the peer has shut
    /// the connection down.
    async fn recv(&mut self) -> Result<Bytes, TransportError>;

    /// Close the connection.
    async fn close(self: Box<Self>) -> Result<(), TransportError>;
}

/// A listening endpoint producing accepted connections.
#[async_trait]
pub trait Listener: Debug + Send + 'static {
    /// Wait for the next inbound connection.
    async fn accept(&mut self) -> Result<Box<dyn Connection>, TransportError>;

    /// The address this listener is bound to.
    ///
    /// For TCP this reflects the actual socket address, so listening on
    /// port 0 yields the ephemeral port that was assigned.
    fn local_addr(&self) -> String;

    /// Stop listening.
    async fn close(self: Box<Self>) -> Result<(), TransportError>;
}

/// Configuration shared by transport implementations.
#[derive(Debug, Clone)]
pub struct Config {
    /// How long to wait for a connection to be established.
    pub connect_timeout: Duration,
    /// Maximum size of a single message in bytes.
    pub max_message_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            max_message_size: 10 * 1024 * 1024, // 10MB
        }
    }
}
