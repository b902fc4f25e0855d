//! RPC client: the `call` surface over the connection pool.

use crate::error::{CodecError, ConnectionError, Error, ProtocolError, Result};
use crate::pool::{ConnectionPool, PoolConfig, SaturationPolicy};
use crate::protocol::codec;
use crate::protocol::framing::{Frame, FrameType};
use crate::protocol::message::{RequestEnvelope, ResponseEnvelope};
use bytes::Bytes;
use courier_transport::Transport;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Configuration for the RPC client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Connection pool configuration.
    pub pool: PoolConfig,
    /// Timeout applied to calls without an explicit one.
    pub default_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            default_timeout: Duration::from_secs(30),
        }
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overall deadline for this call, including pool acquisition. Falls
    /// back to [`ClientConfig::default_timeout`] when unset.
    pub timeout: Option<Duration>,
}

/// Builder for creating RPC clients.
pub struct ClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    addr: Option<String>,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            transport: None,
            addr: None,
            config: ClientConfig::default(),
        }
    }

    /// Set the transport to dial with.
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Set the server address to connect to.
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = Some(addr.into());
        self
    }

    /// Set the connection pool size.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.config.pool.pool_size = size;
        self
    }

    /// Set the behavior when the pool is saturated.
    pub fn saturation_policy(mut self, policy: SaturationPolicy) -> Self {
        self.config.pool.saturation = policy;
        self
    }

    /// Set the default call timeout.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    /// Open the pool and build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if transport or address are missing, or if any of
    /// the eager connections cannot be established.
    pub async fn build(self) -> Result<RpcClient> {
        let transport = self.transport.ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "transport not specified",
            ))
        })?;
        let addr = self.addr.ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "server address not specified",
            ))
        })?;

        RpcClient::connect_with_transport(transport, addr, self.config).await
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// RPC client multiplexing calls over a fixed-size connection pool.
pub struct RpcClient {
    pool: ConnectionPool,
    config: ClientConfig,
}

impl RpcClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connect a client with an explicit transport, address and config.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the eager pool connections fails.
    pub async fn connect(
        transport: impl Transport,
        addr: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        Self::connect_with_transport(Arc::new(transport), addr.into(), config).await
    }

    async fn connect_with_transport(
        transport: Arc<dyn Transport>,
        addr: String,
        config: ClientConfig,
    ) -> Result<Self> {
        let pool = ConnectionPool::new(transport, addr, config.pool.clone()).await?;
        Ok(Self { pool, config })
    }

    /// Call a named remote function with the default options.
    ///
    /// # Errors
    ///
    /// Returns a typed error: [`Error::Timeout`], [`Error::Connection`],
    /// [`Error::Remote`] (including function-not-found), or a codec error.
    pub async fn call<Req, Resp>(&self, method: &str, payload: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.call_with_options(method, payload, CallOptions::default())
            .await
    }

    /// Call a named remote function.
    ///
    /// Delivery is at-most-once only in the absence of timeouts: a call
    /// that times out may still have reached the server, so retrying it can
    /// execute the handler twice. Callers needing idempotency must carry
    /// their own keys in the payload.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call).
    #[instrument(skip(self, payload, options))]
    pub async fn call_with_options<Req, Resp>(
        &self,
        method: &str,
        payload: &Req,
        options: CallOptions,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let deadline = options.timeout.unwrap_or(self.config.default_timeout);
        let request_id = Uuid::new_v4();

        let payload = codec::encode(payload)?;
        let envelope = RequestEnvelope {
            id: request_id,
            method: method.to_string(),
            payload: payload.to_vec(),
        };
        let envelope_bytes = bincode::serialize(&envelope)
            .map_err(|e| CodecError::SerializationFailed(e.to_string()))?;
        let frame = Frame::new(FrameType::Request, Bytes::from(envelope_bytes));

        debug!("Issuing call {} to {}", request_id, method);

        let response = timeout(deadline, self.exchange(frame, request_id))
            .await
            .map_err(|_| Error::Timeout(deadline))??;

        if let Some(error) = response.error {
            return Err(crate::error::RemoteError::from(error).into());
        }

        codec::decode(&response.payload)
    }

    /// One full request/response exchange on one pooled connection.
    ///
    /// If this future is dropped (e.g. by the call timeout), the pool guard
    /// drops with it and the connection is closed rather than reused.
    async fn exchange(&self, frame: Frame, request_id: Uuid) -> Result<ResponseEnvelope> {
        let mut conn = self.pool.acquire().await?;

        conn.send(frame.to_bytes()).await?;

        loop {
            let data = conn.recv().await?;
            let frame = Frame::from_bytes(data)?;

            match frame.frame_type {
                FrameType::Response | FrameType::Error => {
                    let envelope: ResponseEnvelope = bincode::deserialize(&frame.payload)
                        .map_err(|e| CodecError::DeserializationFailed(e.to_string()))?;

                    if envelope.request_id != request_id {
                        return Err(ConnectionError::Desynchronized {
                            expected: request_id,
                            actual: envelope.request_id,
                        }
                        .into());
                    }

                    conn.mark_completed();
                    return Ok(envelope);
                }
                // Unsolicited heartbeats are not part of an exchange.
                FrameType::Heartbeat => continue,
                other => {
                    return Err(ProtocolError::UnexpectedFrameType {
                        expected: "response".to_string(),
                        actual: format!("{other:?}"),
                    }
                    .into());
                }
            }
        }
    }

    /// Round-trip a heartbeat frame through the server.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be acquired or the echo does
    /// not come back within the default timeout.
    pub async fn ping(&self) -> Result<()> {
        let deadline = self.config.default_timeout;

        timeout(deadline, async {
            let mut conn = self.pool.acquire().await?;
            let token = Uuid::new_v4();
            let frame = Frame::new_unchecked(FrameType::Heartbeat, Bytes::copy_from_slice(token.as_bytes()));

            conn.send(frame.to_bytes()).await?;

            let data = conn.recv().await?;
            let echoed = Frame::from_bytes(data)?;
            if echoed.frame_type != FrameType::Heartbeat || echoed.payload != Bytes::copy_from_slice(token.as_bytes()) {
                return Err(ProtocolError::UnexpectedFrameType {
                    expected: "heartbeat echo".to_string(),
                    actual: format!("{:?}", echoed.frame_type),
                }
                .into());
            }

            conn.mark_completed();
            Ok(())
        })
        .await
        .map_err(|_| Error::Timeout(deadline))?
    }

    /// Shut the client down, closing idle connections and failing future
    /// calls.
    pub fn shutdown(&self) {
        debug!("Shutting down RPC client");
        self.pool.shutdown();
    }
}
