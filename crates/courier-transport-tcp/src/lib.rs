//! TCP transport implementation for courier.
//!
//! TCP is an ordered byte stream with no message boundaries, so this
//! transport frames every message with a big-endian u32 length prefix.
//! Messages larger than the configured maximum are rejected on both the
//! send and receive path.

use async_trait::async_trait;
use bytes::Bytes;
use courier_transport::{Config, Connection, Listener, Transport, TransportError};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info};

/// TCP-specific configuration.
#[derive(Debug, Clone, Default)]
pub struct TcpOptions {
    /// Generic transport configuration.
    pub transport: Config,
    /// Disable Nagle's algorithm on accepted and dialed sockets.
    pub nodelay: bool,
}

/// TCP transport implementation.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    options: TcpOptions,
}

impl TcpTransport {
    /// Create a new TCP transport with options.
    pub fn new(options: TcpOptions) -> Self {
        Self { options }
    }

    /// Create a new TCP transport with default options.
    pub fn new_default() -> Self {
        Self::new(TcpOptions {
            nodelay: true,
            ..TcpOptions::default()
        })
    }

    fn parse_addr(addr: &str) -> Result<SocketAddr, TransportError> {
        addr.parse()
            .map_err(|_| TransportError::InvalidAddress(addr.to_string()))
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new_default()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, addr: &str) -> Result<Box<dyn Connection>, TransportError> {
        let socket_addr = Self::parse_addr(addr)?;

        let stream = timeout(
            self.options.transport.connect_timeout,
            TcpStream::connect(socket_addr),
        )
        .await
        .map_err(|_| TransportError::timeout(format!("Connection to {addr}")))?
        .map_err(|e| TransportError::connection_failed(addr, e))?;

        if self.options.nodelay {
            stream.set_nodelay(true).map_err(TransportError::Io)?;
        }

        debug!("TCP connection established to {}", addr);

        Ok(Box::new(TcpConnection {
            stream,
            peer: addr.to_string(),
            max_message_size: self.options.transport.max_message_size,
        }))
    }

    async fn listen(&self, addr: &str) -> Result<Box<dyn Listener>, TransportError> {
        let socket_addr = Self::parse_addr(addr)?;

        let listener = TcpListener::bind(socket_addr)
            .await
            .map_err(TransportError::Io)?;
        let local_addr = listener.local_addr().map_err(TransportError::Io)?;

        info!("TCP transport listening on {}", local_addr);

        Ok(Box::new(TcpAcceptor {
            listener,
            local_addr,
            nodelay: self.options.nodelay,
            max_message_size: self.options.transport.max_message_size,
        }))
    }
}

/// One established TCP connection.
#[derive(Debug)]
struct TcpConnection {
    stream: TcpStream,
    peer: String,
    max_message_size: usize,
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError> {
        if data.len() > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: data.len(),
                max: self.max_message_size,
            });
        }

        // Length prefix, then body.
        let len = data.len() as u32;
        self.stream
            .write_all(&len.to_be_bytes())
            .await
            .map_err(map_io)?;
        self.stream.write_all(&data).await.map_err(map_io)?;
        self.stream.flush().await.map_err(map_io)?;

        Ok(())
    }

    async fn recv(&mut self) -> Result<Bytes, TransportError> {
        let mut len_buf = [0u8; 4];
        self.stream.read_exact(&mut len_buf).await.map_err(map_io)?;

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: len,
                max: self.max_message_size,
            });
        }

        let mut data = vec![0u8; len];
        self.stream.read_exact(&mut data).await.map_err(map_io)?;

        Ok(Bytes::from(data))
    }

    async fn close(mut self: Box<Self>) -> Result<(), TransportError> {
        debug!("Closing TCP connection to {}", self.peer);
        self.stream.shutdown().await.map_err(map_io)?;
        Ok(())
    }
}

/// Listening TCP socket.
#[derive(Debug)]
struct TcpAcceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
    nodelay: bool,
    max_message_size: usize,
}

#[async_trait]
impl Listener for TcpAcceptor {
    async fn accept(&mut self) -> Result<Box<dyn Connection>, TransportError> {
        let (stream, peer) = self.listener.accept().await.map_err(TransportError::Io)?;

        if self.nodelay {
            stream.set_nodelay(true).map_err(TransportError::Io)?;
        }

        debug!("Accepted TCP connection from {}", peer);

        Ok(Box::new(TcpConnection {
            stream,
            peer: peer.to_string(),
            max_message_size: self.max_message_size,
        }))
    }

    fn local_addr(&self) -> String {
        self.local_addr.to_string()
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        debug!("Closing TCP listener on {}", self.local_addr);
        // Dropping the listener closes the socket.
        Ok(())
    }
}

/// A clean EOF while reading means the peer hung up.
fn map_io(e: io::Error) -> TransportError {
    match e.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe => TransportError::ConnectionClosed,
        _ => TransportError::Io(e),
    }
}
