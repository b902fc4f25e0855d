//! Named function registry.
//!
//! Handlers are registered with typed request/response parameters and
//! stored as type-erased closures over raw payload bytes; the dispatcher
//! only ever sees `Bytes -> Bytes`. Synchronous and asynchronous handlers
//! live in one registry behind a tagged variant, and the dispatcher
//! branches on the tag.
//!
//! The registry is built with an ordered sequence of registrations at
//! startup — duplicates are rejected — and is consumed by the server
//! before serving begins, so it is immutable once requests flow.

use crate::error::{HandlerError, RegistryError};
use crate::protocol::codec;
use bytes::Bytes;
use futures::future::{self, BoxFuture};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Type-erased synchronous handler.
pub(crate) type SyncHandlerFn =
    Arc<dyn Fn(Bytes) -> Result<Bytes, HandlerError> + Send + Sync>;

/// Type-erased asynchronous handler.
pub(crate) type AsyncHandlerFn =
    Arc<dyn Fn(Bytes) -> BoxFuture<'static, Result<Bytes, HandlerError>> + Send + Sync>;

/// A registered handler, tagged by execution model.
#[derive(Clone)]
pub(crate) enum Handler {
    /// Runs on the blocking worker pool.
    Sync(SyncHandlerFn),
    /// Runs as a suspendable task on the connection's handling path.
    Async(AsyncHandlerFn),
}

/// Registry of named RPC functions.
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<String, Handler>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a synchronous function.
    ///
    /// The function receives the decoded request payload and returns the
    /// response value. It runs on the blocking worker pool, so it may block
    /// without stalling other connections.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if `name` is already taken.
    pub fn register_sync<Req, Resp, F>(
        &mut self,
        name: impl Into<String>,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + 'static,
        F: Fn(Req) -> anyhow::Result<Resp> + Send + Sync + 'static,
    {
        let wrapped: SyncHandlerFn = Arc::new(move |payload| {
            let request: Req =
                codec::decode(&payload).map_err(|e| HandlerError::BadRequest(e.to_string()))?;
            let response = handler(request).map_err(|e| HandlerError::Internal(format!("{e:#}")))?;
            codec::encode(&response).map_err(|e| HandlerError::Internal(e.to_string()))
        });

        self.insert(name.into(), Handler::Sync(wrapped))
    }

    /// Register an asynchronous function.
    ///
    /// The returned future is awaited on the connection's handling task;
    /// other connections progress while it is suspended.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if `name` is already taken.
    pub fn register_async<Req, Resp, F, Fut>(
        &mut self,
        name: impl Into<String>,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Resp>> + Send + 'static,
    {
        let wrapped: AsyncHandlerFn = Arc::new(move |payload| {
            let request: Req = match codec::decode(&payload) {
                Ok(request) => request,
                Err(e) => {
                    return Box::pin(future::ready(Err(HandlerError::BadRequest(e.to_string()))));
                }
            };
            let fut = handler(request);
            Box::pin(async move {
                let response = fut.await.map_err(|e| HandlerError::Internal(format!("{e:#}")))?;
                codec::encode(&response).map_err(|e| HandlerError::Internal(e.to_string()))
            })
        });

        self.insert(name.into(), Handler::Async(wrapped))
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Whether a function is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    fn insert(&mut self, name: String, handler: Handler) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = Registry::new();
        registry
            .register_sync("hello", |(): ()| Ok("hi".to_string()))
            .unwrap();

        let result = registry.register_sync("hello", |(): ()| Ok("again".to_string()));
        assert!(matches!(result, Err(RegistryError::Duplicate(name)) if name == "hello"));
    }

    #[test]
    fn test_sync_handler_invocation() {
        let mut registry = Registry::new();
        registry
            .register_sync("double", |n: i64| Ok(n * 2))
            .unwrap();

        let Some(Handler::Sync(handler)) = registry.get("double") else {
            panic!("expected a sync handler");
        };

        let response = handler(codec::encode(&21i64).unwrap()).unwrap();
        let doubled: i64 = codec::decode(&response).unwrap();
        assert_eq!(doubled, 42);
    }

    #[tokio::test]
    async fn test_async_handler_invocation() {
        let mut registry = Registry::new();
        registry
            .register_async("echo", |s: String| async move { Ok(s) })
            .unwrap();

        let Some(Handler::Async(handler)) = registry.get("echo") else {
            panic!("expected an async handler");
        };

        let response = handler(codec::encode("hello").unwrap()).await.unwrap();
        let echoed: String = codec::decode(&response).unwrap();
        assert_eq!(echoed, "hello");
    }

    #[test]
    fn test_bad_payload_maps_to_bad_request() {
        let mut registry = Registry::new();
        registry
            .register_sync("strict", |n: i64| Ok(n))
            .unwrap();

        let Some(Handler::Sync(handler)) = registry.get("strict") else {
            panic!("expected a sync handler");
        };

        let result = handler(codec::encode("not a number").unwrap());
        assert!(matches!(result, Err(HandlerError::BadRequest(_))));
    }
}
