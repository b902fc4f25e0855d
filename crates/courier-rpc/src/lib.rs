//! Lightweight RPC framework with pooled client connections.
//!
//! This crate provides a small RPC core built on pluggable transports: a
//! server holding a registry of named functions (synchronous and
//! asynchronous) that dispatches incoming requests, and a client that
//! multiplexes concurrent calls across a fixed-size pool of persistent
//! connections.
//!
//! # Features
//!
//! - **Named function registry**: sync and async handlers with typed serde
//!   parameters, frozen before serving begins
//! - **Connection pooling**: eager fixed-size pool, exclusive one-call-per-
//!   connection acquisition, lazy reconnect on failure
//! - **Explicit backpressure**: pool saturation waits or rejects, by
//!   configuration
//! - **Pluggable transports**: byte-stream (TCP) or message-oriented
//!   (in-process) backends behind one trait
//! - **CBOR payloads**: arbitrary serializable values round-trip
//!
//! # Example
//!
//! ```no_run
//! use courier_rpc::{ClientConfig, Registry, RpcClient, RpcServer, ServerConfig};
//! use courier_transport_tcp::TcpTransport;
//!
//! # async fn example() -> courier_rpc::Result<()> {
//! let mut registry = Registry::new();
//! registry.register_async("hello_world", |(): ()| async move {
//!     Ok("hello world".to_string())
//! })?;
//!
//! let transport = TcpTransport::new_default();
//! let server =
//!     RpcServer::bind(&transport, "127.0.0.1:5559", registry, ServerConfig::default()).await?;
//! tokio::spawn(server.serve());
//!
//! let client = RpcClient::builder()
//!     .transport(TcpTransport::new_default())
//!     .addr("127.0.0.1:5559")
//!     .pool_size(100)
//!     .build()
//!     .await?;
//!
//! let greeting: String = client.call("hello_world", &()).await?;
//! assert_eq!(greeting, "hello world");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blocking;
pub mod client;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod registry;
pub mod server;

// Re-export commonly used types
pub use blocking::BlockingClient;
pub use client::{CallOptions, ClientBuilder, ClientConfig, RpcClient};
pub use error::{Error, RemoteErrorCode, Result};
pub use pool::{PoolConfig, SaturationPolicy};
pub use registry::Registry;
pub use server::{RpcServer, ServerConfig, ShutdownHandle};

// Re-export dependencies that are part of our public API
pub use bytes::Bytes;
pub use courier_transport::Transport;
