//! Blocking client facade.
//!
//! Wraps [`RpcClient`] with an owned current-thread runtime so callers on
//! plain threads get the synchronous model: `call` blocks the issuing
//! thread until the response arrives or the timeout fires.

use crate::client::{CallOptions, ClientConfig, RpcClient};
use crate::error::Result;
use courier_transport::Transport;
use serde::{Serialize, de::DeserializeOwned};

/// Blocking counterpart of [`RpcClient`].
pub struct BlockingClient {
    inner: RpcClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingClient {
    /// Connect a blocking client.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built or any eager pool
    /// connection fails.
    pub fn connect(
        transport: impl Transport,
        addr: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let inner = runtime.block_on(RpcClient::connect(transport, addr, config))?;
        Ok(Self { inner, runtime })
    }

    /// Call a named remote function, blocking until the result arrives.
    ///
    /// # Errors
    ///
    /// Same error surface as [`RpcClient::call`].
    pub fn call<Req, Resp>(&self, method: &str, payload: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.runtime.block_on(self.inner.call(method, payload))
    }

    /// Call with per-call options, blocking until the result arrives.
    ///
    /// # Errors
    ///
    /// Same error surface as [`RpcClient::call_with_options`].
    pub fn call_with_options<Req, Resp>(
        &self,
        method: &str,
        payload: &Req,
        options: CallOptions,
    ) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.runtime
            .block_on(self.inner.call_with_options(method, payload, options))
    }

    /// Round-trip a heartbeat frame through the server.
    ///
    /// # Errors
    ///
    /// Same error surface as [`RpcClient::ping`].
    pub fn ping(&self) -> Result<()> {
        self.runtime.block_on(self.inner.ping())
    }

    /// Shut the client down.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}
