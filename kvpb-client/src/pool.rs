//! # Connection Pool
//!
//! Purpose: Keep a bounded set of reusable connections spread across the
//! configured cluster members.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: connections are checked out as RAII guards and
//!    come back on drop; broken ones are closed instead of recycled.
//! 2. **Minimal Locking**: the mutex guards bookkeeping only; sockets are
//!    opened and closed outside it.
//! 3. **Fail Fast**: with nothing available and no capacity left, `get`
//!    returns `PoolExhausted` immediately.
//! 4. **Round Robin**: new connections cycle through hosts in insertion
//!    order, skipping hosts at their cap; load is not considered.
//!
//! ## Capacity Accounting
//!
//! ```text
//! total = available + in_use + pending   (pending = connects in progress)
//! total <= max_total                     (when max_total > 0)
//! host.open <= host.max_connections      (when max_connections > 0)
//! ```

use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use kvpb_common::{KvError, KvResult};

use crate::config::{ClientConfig, HostConfig, HostId};
use crate::connection::{ConnectOptions, Connection, ConnectionId};
use crate::resolver::{Resolver, SystemResolver};

/// Point-in-time view of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Idle connections ready for checkout.
    pub available: usize,
    /// Connections currently checked out.
    pub in_use: usize,
    /// Connects in progress.
    pub pending: usize,
    /// `available + in_use + pending`.
    pub total: usize,
    /// Configured hosts.
    pub hosts: usize,
}

#[derive(Debug, Clone)]
struct PoolSettings {
    max_total: usize,
    lazy_connect: bool,
    connect: ConnectOptions,
}

struct HostSlot {
    /// Unique per slot, so a removed and re-added host is a new slot.
    key: u64,
    config: HostConfig,
    open: usize,
}

impl HostSlot {
    fn has_capacity(&self) -> bool {
        self.config.max_connections == 0 || self.open < self.config.max_connections
    }
}

struct Idle {
    slot: u64,
    conn: Connection,
}

struct PoolState {
    hosts: Vec<HostSlot>,
    available: VecDeque<Idle>,
    in_use: HashMap<ConnectionId, u64>,
    pending: usize,
    cursor: usize,
    next_key: u64,
    closed: bool,
}

impl PoolState {
    fn new() -> Self {
        PoolState {
            hosts: Vec::new(),
            available: VecDeque::new(),
            in_use: HashMap::new(),
            pending: 0,
            cursor: 0,
            next_key: 0,
            closed: false,
        }
    }

    fn total(&self) -> usize {
        self.available.len() + self.in_use.len() + self.pending
    }

    fn slot_mut(&mut self, key: u64) -> Option<&mut HostSlot> {
        self.hosts.iter_mut().find(|slot| slot.key == key)
    }

    fn add_host(&mut self, config: HostConfig) -> KvResult<()> {
        let id = config.id();
        if self.hosts.iter().any(|slot| slot.config.id() == id) {
            return Err(KvError::Configuration(format!("host {} already configured", id)));
        }
        let key = self.next_key;
        self.next_key += 1;
        self.hosts.push(HostSlot {
            key,
            config,
            open: 0,
        });
        Ok(())
    }

    /// Reserves capacity for one new connection on the next eligible host.
    fn try_reserve(&mut self, max_total: usize) -> Option<(u64, HostId)> {
        if max_total > 0 && self.total() >= max_total {
            return None;
        }
        let len = self.hosts.len();
        for step in 0..len {
            let idx = (self.cursor + step) % len;
            if self.hosts[idx].has_capacity() {
                self.cursor = (idx + 1) % len;
                self.pending += 1;
                let slot = &mut self.hosts[idx];
                slot.open += 1;
                return Some((slot.key, slot.config.id()));
            }
        }
        None
    }

    fn release_slot(&mut self, key: u64) {
        self.pending = self.pending.saturating_sub(1);
        if let Some(slot) = self.slot_mut(key) {
            slot.open = slot.open.saturating_sub(1);
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            available: self.available.len(),
            in_use: self.in_use.len(),
            pending: self.pending,
            total: self.total(),
            hosts: self.hosts.len(),
        }
    }
}

struct PoolInner {
    settings: PoolSettings,
    resolver: Arc<dyn Resolver>,
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn return_connection(&self, slot: u64, conn: Connection) {
        let discarded = {
            let mut state = self.state.lock();
            state.in_use.remove(&conn.id());

            let reason = if state.closed {
                Some("pool closed")
            } else if conn.is_in_flight() {
                Some("exchange abandoned")
            } else if !conn.is_usable() {
                Some("connection broken")
            } else if state.slot_mut(slot).is_none() {
                Some("host removed")
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    if let Some(host) = state.slot_mut(slot) {
                        host.open = host.open.saturating_sub(1);
                    }
                    Some((reason, conn))
                }
                None => {
                    debug!(conn = %conn.id(), "connection returned to pool");
                    state.available.push_back(Idle { slot, conn });
                    None
                }
            }
        };

        if let Some((reason, conn)) = discarded {
            conn.discard(reason);
        }
    }
}

/// Capacity held for a connect in progress; released unless consumed.
struct Reservation {
    pool: Arc<PoolInner>,
    slot: u64,
    host: HostId,
    armed: bool,
}

impl Reservation {
    fn consume(mut self) -> u64 {
        self.armed = false;
        let mut state = self.pool.state.lock();
        state.pending = state.pending.saturating_sub(1);
        self.slot
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.armed {
            self.pool.state.lock().release_slot(self.slot);
        }
    }
}

/// Connection pool handle.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Builds a pool that resolves hosts through the system resolver.
    pub async fn new(config: &ClientConfig) -> KvResult<Self> {
        Self::with_resolver(config, Arc::new(SystemResolver)).await
    }

    /// Builds a pool with a custom resolver.
    ///
    /// Eager pools open connections up to capacity before returning; the
    /// first connect failure aborts construction.
    pub async fn with_resolver(
        config: &ClientConfig,
        resolver: Arc<dyn Resolver>,
    ) -> KvResult<Self> {
        config.validate()?;

        let mut state = PoolState::new();
        for host in &config.hosts {
            state.add_host(host.clone())?;
        }

        let pool = ConnectionPool {
            inner: Arc::new(PoolInner {
                settings: PoolSettings {
                    max_total: config.max_total,
                    lazy_connect: config.lazy_connect,
                    connect: ConnectOptions::from_config(config),
                },
                resolver,
                state: Mutex::new(state),
            }),
        };

        if !pool.inner.settings.lazy_connect {
            pool.prefill().await?;
        }
        Ok(pool)
    }

    async fn prefill(&self) -> KvResult<()> {
        while let Some(reservation) = self.try_reserve() {
            let conn = self.open(&reservation).await?;
            let slot = reservation.consume();
            self.inner.state.lock().available.push_back(Idle { slot, conn });
        }
        let stats = self.stats();
        info!(available = stats.available, hosts = stats.hosts, "pool pre-filled");
        Ok(())
    }

    /// Checks out a connection.
    ///
    /// **Logic**:
    /// 1. Reuse the oldest idle connection if one exists.
    /// 2. Otherwise reserve capacity on the next round-robin host and connect
    ///    outside the lock; the reservation is released if connecting fails.
    /// 3. With no idle connection and no capacity, fail with `PoolExhausted`.
    pub async fn get(&self) -> KvResult<PooledConnection> {
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(KvError::PoolExhausted);
            }
            if let Some(idle) = state.available.pop_front() {
                state.in_use.insert(idle.conn.id(), idle.slot);
                debug!(conn = %idle.conn.id(), "checked out idle connection");
                return Ok(PooledConnection::new(self.inner.clone(), idle.slot, idle.conn));
            }
        }

        let reservation = match self.try_reserve() {
            Some(reservation) => reservation,
            None => {
                warn!(stats = ?self.stats(), "connection pool exhausted");
                return Err(KvError::PoolExhausted);
            }
        };

        let conn = self.open(&reservation).await?;
        let slot = reservation.consume();
        self.inner.state.lock().in_use.insert(conn.id(), slot);
        debug!(conn = %conn.id(), host = %conn.host(), "checked out new connection");
        Ok(PooledConnection::new(self.inner.clone(), slot, conn))
    }

    /// Returns a checked-out connection (same as dropping the guard).
    pub fn release(&self, conn: PooledConnection) {
        drop(conn);
    }

    /// Adds a host at the end of the round-robin order.
    pub fn add_host(&self, host: HostConfig) -> KvResult<()> {
        let id = host.id();
        self.inner.state.lock().add_host(host)?;
        info!(host = %id, "host added to pool");
        Ok(())
    }

    /// Removes a host from the configuration.
    ///
    /// Idle connections to it are closed now; checked-out ones are closed
    /// when returned.
    pub fn remove_host(&self, host: &str, port: u16) -> KvResult<()> {
        let id = HostId::new(host, port);
        let (drained, still_in_use) = {
            let mut state = self.inner.state.lock();
            let idx = state
                .hosts
                .iter()
                .position(|slot| slot.config.id() == id)
                .ok_or_else(|| KvError::NotFound {
                    host: host.to_string(),
                    port,
                })?;
            let removed = state.hosts.remove(idx);

            if idx < state.cursor {
                state.cursor -= 1;
            }
            if state.hosts.is_empty() {
                state.cursor = 0;
            } else {
                state.cursor %= state.hosts.len();
            }

            let (drained, kept): (VecDeque<Idle>, VecDeque<Idle>) =
                std::mem::take(&mut state.available)
                    .into_iter()
                    .partition(|idle| idle.slot == removed.key);
            state.available = kept;

            let still_in_use = state.in_use.values().filter(|key| **key == removed.key).count();
            (drained, still_in_use)
        };

        info!(host = %id, closed = drained.len(), in_use = still_in_use, "host removed from pool");
        for idle in drained {
            idle.conn.discard("host removed");
        }
        Ok(())
    }

    /// Configured hosts in round-robin order.
    pub fn hosts(&self) -> Vec<HostConfig> {
        self.inner
            .state
            .lock()
            .hosts
            .iter()
            .map(|slot| slot.config.clone())
            .collect()
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.state.lock().stats()
    }

    /// Closes idle connections and refuses further checkouts.
    pub fn close(&self) {
        let drained: Vec<Idle> = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.available.drain(..).collect()
        };
        info!(closed = drained.len(), "pool closed");
        for idle in drained {
            idle.conn.discard("pool closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    fn try_reserve(&self) -> Option<Reservation> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return None;
        }
        let (slot, host) = state.try_reserve(self.inner.settings.max_total)?;
        Some(Reservation {
            pool: self.inner.clone(),
            slot,
            host,
            armed: true,
        })
    }

    async fn open(&self, reservation: &Reservation) -> KvResult<Connection> {
        Connection::connect(
            &reservation.host,
            self.inner.resolver.as_ref(),
            &self.inner.settings.connect,
        )
        .await
        .map_err(|err| {
            warn!(host = %reservation.host, error = %err, "connect failed");
            err
        })
    }
}

/// RAII wrapper returning a connection to the pool on drop.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    slot: u64,
    conn: Option<Connection>,
}

impl PooledConnection {
    fn new(pool: Arc<PoolInner>, slot: u64, conn: Connection) -> Self {
        PooledConnection {
            pool,
            slot,
            conn: Some(conn),
        }
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `Drop` takes the connection out.
        self.conn.as_ref().expect("connection exists until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection exists until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.return_connection(self.slot, conn);
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .finish()
    }
}
