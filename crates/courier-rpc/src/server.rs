//! RPC server: accept loop and per-connection dispatcher.

use crate::error::{HandlerError, Result};
use crate::protocol::framing::{Frame, FrameType};
use crate::protocol::message::{ErrorInfo, RequestEnvelope, ResponseEnvelope};
use crate::registry::{Handler, Registry};
use bytes::Bytes;
use courier_transport::{Connection, Listener, Transport, TransportError};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Semaphore, broadcast};
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the RPC server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
        }
    }
}

/// Handle for requesting a graceful server shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    /// Signal the server to stop accepting and close its connections.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

/// RPC server holding a frozen registry and a bound listener.
///
/// Built with [`RpcServer::bind`], run with [`RpcServer::serve`], which
/// loops until shutdown is signalled. Each accepted connection gets its own
/// task running the read → dispatch → write loop; a handler failure is
/// answered with an error response frame and never ends the loop.
pub struct RpcServer {
    listener: Box<dyn Listener>,
    registry: Arc<Registry>,
    config: ServerConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl RpcServer {
    /// Bind a listener and freeze the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to listen on `addr`.
    pub async fn bind(
        transport: &dyn Transport,
        addr: &str,
        registry: Registry,
        config: ServerConfig,
    ) -> Result<Self> {
        let listener = transport.listen(addr).await?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            listener,
            registry: Arc::new(registry),
            config,
            shutdown_tx,
        })
    }

    /// The address the server is actually bound to.
    pub fn local_addr(&self) -> String {
        self.listener.local_addr()
    }

    /// Handle for shutting the server down from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Accept and serve connections until shutdown is signalled.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails irrecoverably.
    #[instrument(skip(self), fields(addr = %self.local_addr()))]
    pub async fn serve(mut self) -> Result<()> {
        info!(
            "RPC server listening ({} functions registered)",
            self.registry.len()
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok(conn) => {
                            let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                                warn!("Max connections reached, dropping incoming connection");
                                drop(conn);
                                continue;
                            };

                            let registry = Arc::clone(&self.registry);
                            let conn_shutdown_rx = self.shutdown_tx.subscribe();
                            tokio::spawn(async move {
                                handle_connection(conn, registry, conn_shutdown_rx).await;
                                drop(permit);
                            });
                        }
                        Err(TransportError::ConnectionClosed) => {
                            info!("Listener closed");
                            break;
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Server shutdown requested");
                    break;
                }
            }
        }

        let _ = self.listener.close().await;
        Ok(())
    }
}

/// Per-connection state machine: read one request, dispatch it, write the
/// response, loop until the peer goes away or shutdown is signalled.
async fn handle_connection(
    mut conn: Box<dyn Connection>,
    registry: Arc<Registry>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    debug!("New connection accepted");

    loop {
        let data = tokio::select! {
            received = conn.recv() => match received {
                Ok(data) => data,
                Err(TransportError::ConnectionClosed) => {
                    debug!("Connection closed by client");
                    break;
                }
                Err(e) => {
                    warn!("Transport error on connection: {}", e);
                    break;
                }
            },
            _ = shutdown_rx.recv() => {
                debug!("Server shutting down, closing connection");
                break;
            }
        };

        let frame = match Frame::from_bytes(data) {
            Ok(frame) => frame,
            Err(e) => {
                // The transport preserves message boundaries, so a bad
                // frame cannot desynchronize the stream. Discard it.
                warn!("Discarding malformed frame: {}", e);
                continue;
            }
        };

        match frame.frame_type {
            FrameType::Request => {
                if let Err(e) = handle_request(conn.as_mut(), &registry, frame).await {
                    warn!("Failed to write response: {}", e);
                    break;
                }
            }
            FrameType::Heartbeat => {
                let pong = Frame::new_unchecked(FrameType::Heartbeat, frame.payload);
                if let Err(e) = conn.send(pong.to_bytes()).await {
                    warn!("Failed to echo heartbeat: {}", e);
                    break;
                }
            }
            FrameType::Close => {
                debug!("Client requested close");
                break;
            }
            other => {
                warn!("Unexpected frame type from client: {:?}", other);
            }
        }
    }

    let _ = conn.close().await;
}

/// Decode one request, run its handler, and write exactly one response.
///
/// Handler failures of every kind — unknown name, undecodable payload,
/// returned error, panic — become error response frames. The returned
/// `Result` only reports I/O failures writing the response.
async fn handle_request(
    conn: &mut dyn Connection,
    registry: &Registry,
    frame: Frame,
) -> Result<()> {
    let envelope: RequestEnvelope = match bincode::deserialize(&frame.payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Discarding request with malformed envelope: {}", e);
            return Ok(());
        }
    };

    let request_id = envelope.id;
    let method = envelope.method;
    let payload = Bytes::from(envelope.payload);

    debug!("Dispatching request {} for {}", request_id, method);

    let outcome = match registry.get(&method) {
        None => Err(HandlerError::NotFound(method.clone())),
        Some(Handler::Sync(handler)) => {
            // Sync handlers run on the blocking pool so a slow one cannot
            // stall other connections; a panic surfaces as a join error.
            let handler = Arc::clone(handler);
            match tokio::task::spawn_blocking(move || handler(payload)).await {
                Ok(result) => result,
                Err(e) => Err(HandlerError::Panicked(e.to_string())),
            }
        }
        Some(Handler::Async(handler)) => {
            match AssertUnwindSafe(handler(payload)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(HandlerError::Panicked(panic_message(&panic))),
            }
        }
    };

    let (frame_type, response) = match outcome {
        Ok(payload) => (
            FrameType::Response,
            ResponseEnvelope {
                request_id,
                payload: payload.to_vec(),
                error: None,
            },
        ),
        Err(ref e) => {
            warn!("Request {} for {} failed: {}", request_id, method, e);
            (
                FrameType::Error,
                ResponseEnvelope {
                    request_id,
                    payload: Vec::new(),
                    error: Some(ErrorInfo::from(e)),
                },
            )
        }
    };

    let response_bytes = bincode::serialize(&response)
        .map_err(|e| crate::error::CodecError::SerializationFailed(e.to_string()))?;
    conn.send(Frame::new(frame_type, Bytes::from(response_bytes)).to_bytes())
        .await?;

    Ok(())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
