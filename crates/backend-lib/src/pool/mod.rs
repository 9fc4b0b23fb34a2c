// ============================
// crates/backend-lib/src/pool/mod.rs
// ============================
//! Database connection pool.
//!
//! The pool opens `capacity` connections up front and then grows on demand:
//! when no idle connection is available `acquire` opens a new one instead of
//! waiting. Connections go back to the idle stack on release only if they are
//! still alive and could be reset to session defaults.
//!
//! The idle stack sits behind a single mutex that is only held for a push or
//! a pop, never across I/O.

pub mod postgres;

use async_trait::async_trait;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::metrics::{POOL_DISCARDED, POOL_IDLE, POOL_OPENED};

pub use postgres::PgConnector;

/// Errors raised while opening or recycling connections
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("failed to open database connection: {0}")]
    Connect(String),

    #[error("failed to reset database connection: {0}")]
    Reset(String),

    #[error("missing required connection parameter: {0}")]
    MissingParameter(&'static str),

    #[error("invalid connection parameter: {0}")]
    InvalidParameter(String),
}

/// Opens, checks and resets connections on behalf of a [`ConnectionPool`]
#[async_trait]
pub trait ManageConnection: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Open a new connection
    async fn connect(&self) -> Result<Self::Connection, PoolError>;

    /// Whether the connection can still serve queries
    async fn is_alive(&self, conn: &mut Self::Connection) -> bool;

    /// Return the connection to its default state: no open transaction,
    /// default isolation and autocommit behaviour.
    async fn reset(&self, conn: &mut Self::Connection) -> Result<(), PoolError>;
}

struct PoolInner<M: ManageConnection> {
    manager: M,
    idle: Mutex<Vec<M::Connection>>,
    capacity: usize,
}

/// Shared pool handle. Clones refer to the same pool.
pub struct ConnectionPool<M: ManageConnection> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ManageConnection> Clone for ConnectionPool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: ManageConnection> std::fmt::Debug for ConnectionPool<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("capacity", &self.inner.capacity)
            .field("idle", &self.idle_count())
            .finish()
    }
}

impl<M: ManageConnection> ConnectionPool<M> {
    /// Open `capacity` connections eagerly.
    ///
    /// Fails on the first connection that cannot be opened; nothing opened
    /// so far is kept.
    pub async fn initialize(manager: M, capacity: usize) -> Result<Self, PoolError> {
        let mut idle = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            idle.push(manager.connect().await?);
            counter!(POOL_OPENED).increment(1);
        }
        info!(capacity, "connection pool initialized");
        gauge!(POOL_IDLE).set(idle.len() as f64);

        Ok(Self {
            inner: Arc::new(PoolInner {
                manager,
                idle: Mutex::new(idle),
                capacity,
            }),
        })
    }

    /// Check out a connection, opening one if the pool is empty
    pub async fn acquire(&self) -> Result<PooledConnection<M>, PoolError> {
        let (popped, idle) = {
            let mut stack = self.inner.idle.lock();
            let popped = stack.pop();
            (popped, stack.len())
        };
        gauge!(POOL_IDLE).set(idle as f64);
        let conn = match popped {
            Some(mut conn) => {
                if self.inner.manager.is_alive(&mut conn).await {
                    conn
                } else {
                    counter!(POOL_DISCARDED).increment(1);
                    debug!("idle connection found dead; replacing it");
                    drop(conn);
                    self.open().await?
                }
            }
            None => {
                debug!("pool exhausted; opening an extra connection");
                self.open().await?
            }
        };

        Ok(PooledConnection {
            conn: Some(conn),
            pool: self.clone(),
        })
    }

    /// Give a connection back to the pool.
    ///
    /// Never fails: a connection that is dead or cannot be reset is dropped
    /// and the pool refills lazily on a later `acquire`.
    pub async fn release(&self, mut conn: PooledConnection<M>) {
        if let Some(raw) = conn.conn.take() {
            self.recycle(raw).await;
        }
    }

    /// Connections currently idle
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// Connections opened at initialization
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    async fn open(&self) -> Result<M::Connection, PoolError> {
        let conn = self.inner.manager.connect().await?;
        counter!(POOL_OPENED).increment(1);
        Ok(conn)
    }

    async fn recycle(&self, mut conn: M::Connection) {
        if !self.inner.manager.is_alive(&mut conn).await {
            counter!(POOL_DISCARDED).increment(1);
            warn!("released connection failed its liveness check; discarding");
            return;
        }
        if let Err(err) = self.inner.manager.reset(&mut conn).await {
            counter!(POOL_DISCARDED).increment(1);
            warn!(error = %err, "released connection could not be reset; discarding");
            return;
        }

        let idle = {
            let mut stack = self.inner.idle.lock();
            stack.push(conn);
            stack.len()
        };
        gauge!(POOL_IDLE).set(idle as f64);
    }
}

/// A checked-out connection.
///
/// Hand it back with [`ConnectionPool::release`]. If it is dropped instead
/// (early return, panic, cancelled future) the release runs on a task spawned
/// onto the current tokio runtime.
pub struct PooledConnection<M: ManageConnection> {
    conn: Option<M::Connection>,
    pool: ConnectionPool<M>,
}

impl<M: ManageConnection> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .expect("pooled connection used after release")
    }
}

impl<M: ManageConnection> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .expect("pooled connection used after release")
    }
}

impl<M: ManageConnection> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = self.pool.clone();
                handle.spawn(async move { pool.recycle(conn).await });
            }
            Err(_) => {
                counter!(POOL_DISCARDED).increment(1);
                warn!("connection dropped outside a runtime; discarding");
            }
        }
    }
}
