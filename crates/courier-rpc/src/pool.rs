//! Client-side connection pool.
//!
//! The pool owns a fixed set of persistent connections to one server
//! address, opened eagerly at construction. `acquire` hands out exclusive
//! access to one connection at a time, so a connection never carries more
//! than one in-flight call. When every connection is busy the caller either
//! waits on the pool semaphore (backpressure) or is rejected, depending on
//! the configured saturation policy.
//!
//! A connection is only returned to the idle set after a completed
//! request/response exchange. A call that fails, times out, or is
//! cancelled leaves its slot empty; the next acquisition of that slot
//! reconnects lazily, and a reconnect failure is surfaced as that call's
//! error rather than retried silently.

use crate::error::{ConnectionError, Error, Result};
use courier_transport::{Connection, Transport};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Configuration for connection pooling.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of connections in the pool, fixed at construction.
    pub pool_size: usize,
    /// What `acquire` does when all connections are busy.
    pub saturation: SaturationPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            saturation: SaturationPolicy::Wait,
        }
    }
}

/// Behavior when the pool is saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaturationPolicy {
    /// Suspend the caller until a connection frees. This caps concurrent
    /// outstanding calls at the pool size and propagates backpressure
    /// upstream.
    #[default]
    Wait,
    /// Fail immediately with [`Error::Saturated`].
    Reject,
}

/// One pool slot. `conn` is `None` when the previous exchange on this slot
/// failed or was abandoned; the next acquisition reconnects.
struct Slot {
    id: u64,
    conn: Option<Box<dyn Connection>>,
}

/// Fixed-size pool of persistent connections to a single address.
pub(crate) struct ConnectionPool {
    transport: Arc<dyn Transport>,
    addr: String,
    saturation: SaturationPolicy,
    slots: Mutex<Vec<Slot>>,
    semaphore: Arc<Semaphore>,
}

impl ConnectionPool {
    /// Eagerly open `pool_size` connections.
    pub(crate) async fn new(
        transport: Arc<dyn Transport>,
        addr: String,
        config: PoolConfig,
    ) -> Result<Self> {
        if config.pool_size == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "pool_size must be at least 1",
            )));
        }

        let mut slots = Vec::with_capacity(config.pool_size);
        for id in 0..config.pool_size as u64 {
            let conn = transport
                .connect(&addr)
                .await
                .map_err(|e| ConnectionError::ConnectFailed {
                    addr: addr.clone(),
                    source: e,
                })?;
            slots.push(Slot { id, conn: Some(conn) });
        }

        debug!("Opened {} connections to {}", config.pool_size, addr);

        Ok(Self {
            transport,
            addr,
            saturation: config.saturation,
            semaphore: Arc::new(Semaphore::new(config.pool_size)),
            slots: Mutex::new(slots),
        })
    }

    /// Take exclusive ownership of one idle connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Saturated`] under the `Reject` policy when every
    /// connection is busy, or a connection error if a lazy reconnect fails.
    pub(crate) async fn acquire(&self) -> Result<PooledConnection<'_>> {
        let permit = match self.saturation {
            SaturationPolicy::Wait => self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| Error::Connection(ConnectionError::Closed))?,
            SaturationPolicy::Reject => self
                .semaphore
                .clone()
                .try_acquire_owned()
                .map_err(|_| Error::Saturated)?,
        };

        // The permit guarantees a slot is available; an empty vec means the
        // pool was shut down underneath us.
        let Some(mut slot) = self.slots.lock().pop() else {
            return Err(ConnectionError::Closed.into());
        };

        let conn = match slot.conn.take() {
            Some(conn) => conn,
            None => {
                debug!("Reconnecting pool slot {} to {}", slot.id, self.addr);
                match self.transport.connect(&self.addr).await {
                    Ok(conn) => conn,
                    Err(e) => {
                        // Hand the still-empty slot back for the next caller.
                        self.slots.lock().push(slot);
                        return Err(ConnectionError::ConnectFailed {
                            addr: self.addr.clone(),
                            source: e,
                        }
                        .into());
                    }
                }
            }
        };

        Ok(PooledConnection {
            pool: self,
            slot_id: slot.id,
            conn: Some(conn),
            completed: false,
            _permit: permit,
        })
    }

    /// Close every idle connection and fail in-progress and future
    /// acquisitions.
    pub(crate) fn shutdown(&self) {
        self.semaphore.close();
        self.slots.lock().clear();
    }
}

/// Exclusive handle on one pooled connection.
///
/// Dropping the guard without [`mark_completed`](Self::mark_completed)
/// closes the connection instead of returning it: an abandoned exchange may
/// still produce a late response, and a stream cannot be resynchronized
/// mid-response.
pub(crate) struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    slot_id: u64,
    conn: Option<Box<dyn Connection>>,
    completed: bool,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection<'_> {
    /// Send one message on the underlying connection.
    pub(crate) async fn send(&mut self, data: bytes::Bytes) -> Result<()> {
        match self.conn.as_mut() {
            Some(conn) => Ok(conn.send(data).await?),
            None => Err(ConnectionError::Closed.into()),
        }
    }

    /// Receive one message from the underlying connection.
    pub(crate) async fn recv(&mut self) -> Result<bytes::Bytes> {
        match self.conn.as_mut() {
            Some(conn) => Ok(conn.recv().await?),
            None => Err(ConnectionError::Closed.into()),
        }
    }

    /// Mark the request/response exchange as fully completed, making the
    /// connection safe to return to the idle set.
    pub(crate) fn mark_completed(&mut self) {
        self.completed = true;
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        let conn = if self.completed {
            self.conn.take()
        } else {
            // Abandoned mid-exchange: close rather than reuse.
            if self.conn.take().is_some() {
                debug!("Discarding pool slot {} after incomplete exchange", self.slot_id);
            }
            None
        };

        self.pool.slots.lock().push(Slot {
            id: self.slot_id,
            conn,
        });
        // The permit drops with the guard, waking one waiter.
    }
}
