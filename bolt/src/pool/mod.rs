//! The per-address connection pool (spec.md §4.5). Generalizes the
//! teacher's `networking::ChunkPool` (alloc-or-reuse on a single thread)
//! into a cross-thread, blocking-I/O resource pool guarded by a `Mutex` and
//! a `Condvar`, per spec.md §5's explicit concurrency model.

use std::collections::{HashSet, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use bolt_support::time as bolt_time;

use crate::connection::{Connection, ConnectionState};
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct PoolConfig {
    pub max_pool_size: usize,
    pub max_connection_life_time: Duration,
    /// Idle time past which `acquire` runs a RESET liveness probe before
    /// trusting a cached `Ready` connection (spec.md §4.5, step 1).
    pub liveness_threshold: Duration,
}

impl Default for PoolConfig {
    fn default() -> PoolConfig {
        PoolConfig { max_pool_size: 100, max_connection_life_time: Duration::from_secs(3600), liveness_threshold: Duration::from_secs(60) }
    }
}

enum Slot {
    Free,
    InUse,
    Idle { connection: Connection, idle_since: u64 },
}

struct State {
    slots: Vec<Slot>,
    /// Ticket dispensed to the next caller of `acquire`; `now_serving`
    /// advances only when the ticket ahead of it has been fully resolved
    /// (acquired or timed out), which is what keeps waiters strictly FIFO
    /// under `Condvar::notify_all` regardless of which thread the OS wakes
    /// first (spec.md §9, "Pool fairness... wake-one vs wake-all").
    next_ticket: u64,
    now_serving: u64,
    /// Tickets whose holder gave up before their turn arrived. Advancing
    /// `now_serving` past one of these skips it instead of stalling forever
    /// on a waiter who is no longer there to take their turn.
    abandoned: HashSet<u64>,
}

impl State {
    /// Moves `now_serving` to the next ticket, then keeps skipping over any
    /// tickets already marked abandoned so a mid-queue timeout can never
    /// leave a permanent hole in the sequence.
    fn advance_serving(&mut self) {
        self.now_serving += 1;
        while self.abandoned.remove(&self.now_serving) {
            self.now_serving += 1;
        }
    }
}

/// One address's fixed-capacity connection pool (spec.md §4.5, "Shape").
/// `connector` builds a brand new `Ready` connection on demand; the pool
/// itself never knows how to dial a socket or negotiate a handshake.
pub struct Pool {
    config: PoolConfig,
    connector: Box<dyn Fn() -> Result<Connection> + Send + Sync>,
    state: Mutex<State>,
    condvar: Condvar,
}

impl Pool {
    pub fn new(config: PoolConfig, connector: Box<dyn Fn() -> Result<Connection> + Send + Sync>) -> Pool {
        let slots = (0..config.max_pool_size).map(|_| Slot::Free).collect();
        Pool { config, connector, state: Mutex::new(State { slots, next_ticket: 0, now_serving: 0, abandoned: HashSet::new() }), condvar: Condvar::new() }
    }

    /// Number of slots currently holding a connection (in-use or idle).
    pub fn live_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.slots.iter().filter(|s| !matches!(s, Slot::Free)).count()
    }

    /// Acquires a connection, blocking up to `timeout` (spec.md §4.5,
    /// "Acquire"). FIFO among waiters for the same address.
    pub fn acquire(self: &Arc<Self>, timeout: Duration) -> Result<Lease> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.state.lock().unwrap();

        let ticket = guard.next_ticket;
        guard.next_ticket += 1;

        loop {
            if guard.now_serving != ticket {
                // Not our turn yet. On timeout we must not just walk away:
                // the ticket ahead of us owns the `now_serving` transition,
                // and it has no way to know we gave up, so mark our own
                // ticket abandoned before releasing it. Whichever thread
                // later advances `now_serving` up to our ticket will see it
                // in the set and skip straight past it (`State::advance_serving`),
                // instead of the sequence stalling on a waiter who already left.
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    guard.abandoned.insert(ticket);
                    return Err(Error::PoolAcquisitionTimedOut);
                }
                let (g, _) = self.condvar.wait_timeout(guard, remaining).unwrap();
                guard = g;
                continue;
            }

            if let Some(index) = self.find_reusable(&mut guard.slots) {
                let connection = match std::mem::replace(&mut guard.slots[index], Slot::InUse) {
                    Slot::Idle { connection, .. } => connection,
                    _ => unreachable!(),
                };
                guard.advance_serving();
                drop(guard);
                self.condvar.notify_all();
                return Ok(Lease { pool: Arc::clone(self), index, connection: Some(connection) });
            }

            if let Some(index) = guard.slots.iter().position(|s| matches!(s, Slot::Free)) {
                // Reserve the slot under the lock before releasing it: the
                // connector call below is slow (opens a socket) and must not
                // leave the slot looking `Free` to a concurrently-arriving
                // acquirer, or two connections end up sharing one index
                // (spec.md §4.5/§8, "the number of live connections never
                // exceeds C").
                guard.slots[index] = Slot::InUse;
                guard.advance_serving();
                drop(guard);
                let connection = match (self.connector)() {
                    Ok(c) => c,
                    Err(e) => {
                        let mut guard = self.state.lock().unwrap();
                        guard.slots[index] = Slot::Free;
                        drop(guard);
                        self.condvar.notify_all();
                        return Err(e);
                    }
                };
                self.condvar.notify_all();
                return Ok(Lease { pool: Arc::clone(self), index, connection: Some(connection) });
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                guard.advance_serving();
                drop(guard);
                self.condvar.notify_all();
                return Err(Error::PoolAcquisitionTimedOut);
            }
            let (g, _) = self.condvar.wait_timeout(guard, remaining).unwrap();
            guard = g;
        }
    }

    /// Finds an idle slot whose connection is young enough and, if it has
    /// been sitting idle past `liveness_threshold`, still answers a RESET
    /// round-trip. A dead probe result frees the slot instead of handing
    /// back a connection the caller would immediately fail on.
    fn find_reusable(&self, slots: &mut [Slot]) -> Option<usize> {
        let now = bolt_time::timestamp_secs();

        for (index, slot) in slots.iter_mut().enumerate() {
            let is_candidate = matches!(slot, Slot::Idle { .. });
            if !is_candidate {
                continue;
            }

            if let Slot::Idle { connection, idle_since } = slot {
                let age = Duration::from_secs(now.saturating_sub(connection.created_at()));
                if age >= self.config.max_connection_life_time {
                    *slot = Slot::Free;
                    continue;
                }

                let idle_for = Duration::from_secs(now.saturating_sub(*idle_since));
                if idle_for >= self.config.liveness_threshold {
                    if connection.reset().is_err() {
                        *slot = Slot::Free;
                        continue;
                    }
                }

                return Some(index);
            }
        }
        None
    }

    fn release(&self, index: usize, mut connection: Connection) {
        if connection.state() == ConnectionState::Defunct {
            let mut guard = self.state.lock().unwrap();
            guard.slots[index] = Slot::Free;
        } else {
            if connection.state() != ConnectionState::Ready {
                // Streaming/Failed: reset before returning it to the pool
                // (spec.md §4.5, "Release"). A failed reset means the
                // connection is unusable; free the slot instead of idling
                // a broken connection.
                if connection.reset().is_err() {
                    connection.mark_defunct();
                }
            }

            let mut guard = self.state.lock().unwrap();
            if connection.state() == ConnectionState::Defunct {
                guard.slots[index] = Slot::Free;
            } else {
                guard.slots[index] = Slot::Idle { connection, idle_since: bolt_time::timestamp_secs() };
            }
        }
        self.condvar.notify_all();
    }
}

/// An acquired connection, scoped to the lease's lifetime. Dropping it
/// always runs [`Pool::release`], so every exit path - return, `?`, panic
/// unwind - returns the slot (spec.md §5, "Resource lifecycle").
pub struct Lease {
    pool: Arc<Pool>,
    index: usize,
    connection: Option<Connection>,
}

impl Deref for Lease {
    type Target = Connection;
    fn deref(&self) -> &Connection {
        self.connection.as_ref().expect("connection taken before drop")
    }
}

impl DerefMut for Lease {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection.as_mut().expect("connection taken before drop")
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(self.index, connection);
        }
    }
}

/// Waiters blocked on `Pool::acquire` across addresses, kept by the routing
/// dispatcher only for diagnostics; the pool itself needs no registry of
/// who is waiting since the ticket/condvar pair already orders them.
pub type Backlog = VecDeque<Arc<Pool>>;
