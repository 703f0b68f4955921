//! The routing-table-driven dispatcher (spec.md §4.4, §4.6). Generalizes
//! the pool's single-address model to a cluster: a small number of router
//! addresses are consulted to discover which servers currently serve reads,
//! writes, and further routing, and a `Pool` is built lazily per discovered
//! address the same way `pool::Pool` builds connections lazily per slot.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indexmap::IndexMap;

use bolt_support::time;

use crate::address::Address;
use crate::connection::{Connection, ConnectionState};
use crate::error::{Error, Result};
use crate::pool::{Lease, Pool, PoolConfig};
use crate::value::Value;

/// Dials, handshakes and initializes a fresh connection to `address`. The
/// dispatcher never opens a socket itself - this is supplied by the caller
/// the same way `Resolver` is, so tests and alternate transports can stand
/// in for a real TCP dial.
pub type Dialer = Arc<dyn Fn(&Address) -> Result<Connection> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Read,
    Write,
}

/// Three role lists, a ttl and a fetched-at timestamp (spec.md §4.4).
/// Considered fresh while `now < fetched_at + ttl`.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    pub readers: Vec<Address>,
    pub writers: Vec<Address>,
    pub routers: Vec<Address>,
    pub ttl: Duration,
    pub fetched_at: u64,
}

impl RoutingTable {
    fn is_fresh(&self) -> bool {
        time::is_fresh(self.fetched_at, self.ttl)
    }

    fn servers_for(&self, role: Role) -> &[Address] {
        match role {
            Role::Read => &self.readers,
            Role::Write => &self.writers,
        }
    }
}

/// Parses the single record `CALL dbms.cluster.routing.getRoutingTable`
/// returns: `[ttl: Integer, servers: List<Map{role, addresses}>]`, where
/// each server's `addresses` is a list of `"host:port"` strings.
fn parse_routing_record(fields: Vec<Value>) -> Result<RoutingTable> {
    let mut fields = fields.into_iter();
    let ttl_seconds = fields.next().and_then(|v| v.as_integer()).ok_or(Error::RoutingUnexpectedDiscoveryResponse)?;
    let servers = match fields.next() {
        Some(Value::List(items)) => items,
        _ => return Err(Error::RoutingUnexpectedDiscoveryResponse),
    };

    let mut table = RoutingTable { ttl: Duration::from_secs(ttl_seconds.max(0) as u64), fetched_at: time::timestamp_secs(), ..RoutingTable::default() };

    for server in servers {
        let mut entry = match server {
            Value::Map(m) => m,
            _ => return Err(Error::RoutingUnexpectedDiscoveryResponse),
        };
        let role = match entry.remove("role") {
            Some(Value::String(s)) => s,
            _ => return Err(Error::RoutingUnexpectedDiscoveryResponse),
        };
        let addresses = match entry.remove("addresses") {
            Some(Value::List(items)) => items,
            _ => return Err(Error::RoutingUnexpectedDiscoveryResponse),
        };
        let parsed: Result<Vec<Address>> = addresses.into_iter().map(parse_address).collect();
        let parsed = parsed?;

        match role.as_str() {
            "READ" => table.readers.extend(parsed),
            "WRITE" => table.writers.extend(parsed),
            "ROUTE" => table.routers.extend(parsed),
            _ => return Err(Error::RoutingUnexpectedDiscoveryResponse),
        }
    }

    Ok(table)
}

fn parse_address(value: Value) -> Result<Address> {
    let raw = match value {
        Value::String(s) => s,
        _ => return Err(Error::RoutingUnexpectedDiscoveryResponse),
    };
    let (host, port) = raw.rsplit_once(':').ok_or(Error::RoutingUnexpectedDiscoveryResponse)?;
    let port: u16 = port.parse().map_err(|_| Error::RoutingUnexpectedDiscoveryResponse)?;
    Ok(Address::new(host, port))
}

/// Round-robins acquisitions across a cluster's readers/writers, refreshing
/// the routing table against its routers on expiry (spec.md §4.6).
pub struct RoutingDispatcher {
    dial: Dialer,
    pool_config: PoolConfig,
    routing_context: IndexMap<String, Value>,
    table: Mutex<RoutingTable>,
    pools: Mutex<HashMap<Address, Arc<Pool>>>,
    reader_cursor: AtomicUsize,
    writer_cursor: AtomicUsize,
}

impl RoutingDispatcher {
    /// `seed_routers` is consulted for the first discovery; afterwards the
    /// table's own `routers` list (returned by the server) takes over.
    pub fn new(seed_routers: Vec<Address>, dial: Dialer, pool_config: PoolConfig, routing_context: IndexMap<String, Value>) -> RoutingDispatcher {
        let table = RoutingTable { routers: seed_routers, ..RoutingTable::default() };
        RoutingDispatcher {
            dial,
            pool_config,
            routing_context,
            table: Mutex::new(table),
            pools: Mutex::new(HashMap::new()),
            reader_cursor: AtomicUsize::new(0),
            writer_cursor: AtomicUsize::new(0),
        }
    }

    /// Acquires a connection for `role`, refreshing the table first if it
    /// is stale (spec.md §4.6, steps 1-3). A server whose pool fails to
    /// hand back a connection is skipped in favor of the next one in the
    /// list for this one acquisition; it is not removed from the table -
    /// only a connection going `Defunct` while leased does that (§4.6,
    /// last paragraph), via `RoutedLease::drop`.
    pub fn acquire(self: &Arc<Self>, role: Role, timeout: Duration) -> Result<RoutedLease> {
        self.ensure_fresh_table()?;

        let servers = {
            let table = self.table.lock().unwrap();
            table.servers_for(role).to_vec()
        };
        if servers.is_empty() {
            return Err(Error::RoutingNoServersToSelect);
        }

        let cursor = match role {
            Role::Read => &self.reader_cursor,
            Role::Write => &self.writer_cursor,
        };
        let start = cursor.fetch_add(1, Ordering::Relaxed) % servers.len();

        for offset in 0..servers.len() {
            let address = &servers[(start + offset) % servers.len()];
            let pool = self.pool_for(address);
            if let Ok(lease) = pool.acquire(timeout) {
                return Ok(RoutedLease { dispatcher: Arc::clone(self), address: address.clone(), lease: Some(lease) });
            }
        }
        Err(Error::RoutingNoServersToSelect)
    }

    /// Removes `address` from every role list and forces the table stale,
    /// so the next acquisition re-discovers the cluster before selecting
    /// again (spec.md §4.6: "taints the server").
    pub fn taint(&self, address: &Address) {
        let mut table = self.table.lock().unwrap();
        table.readers.retain(|a| a != address);
        table.writers.retain(|a| a != address);
        table.routers.retain(|a| a != address);
        table.fetched_at = 0;
        drop(table);

        self.pools.lock().unwrap().remove(address);
    }

    fn ensure_fresh_table(&self) -> Result<()> {
        if self.table.lock().unwrap().is_fresh() {
            return Ok(());
        }
        self.refresh_table()
    }

    fn refresh_table(&self) -> Result<()> {
        let routers = self.table.lock().unwrap().routers.clone();

        for router in &routers {
            match self.run_discovery(router) {
                Ok(fresh) => {
                    *self.table.lock().unwrap() = fresh;
                    return Ok(());
                }
                Err(_) => {
                    self.table.lock().unwrap().routers.retain(|a| a != router);
                }
            }
        }
        Err(Error::RoutingUnableToRetrieveTable)
    }

    fn run_discovery(&self, router: &Address) -> Result<RoutingTable> {
        let mut conn = (self.dial)(router)?;

        let mut params = IndexMap::new();
        params.insert("context".to_string(), Value::Map(self.routing_context.clone()));

        let run_id = conn.run("CALL dbms.cluster.routing.getRoutingTable($context)", params)?;
        conn.fetch_summary(run_id)?;

        let pull_id = conn.pull_all()?;
        let fields = conn.next_record(pull_id)?.ok_or(Error::RoutingUnexpectedDiscoveryResponse)?;
        conn.fetch_summary(pull_id)?;

        parse_routing_record(fields)
    }

    fn pool_for(&self, address: &Address) -> Arc<Pool> {
        let mut pools = self.pools.lock().unwrap();
        if let Some(pool) = pools.get(address) {
            return Arc::clone(pool);
        }

        let dial = Arc::clone(&self.dial);
        let target = address.clone();
        let pool = Arc::new(Pool::new(self.pool_config.clone(), Box::new(move || (dial)(&target))));
        pools.insert(address.clone(), Arc::clone(&pool));
        pool
    }

    #[cfg(test)]
    fn set_table(&self, table: RoutingTable) {
        *self.table.lock().unwrap() = table;
    }
}

/// A connection acquired through a [`RoutingDispatcher`]. Identical to
/// [`Lease`] except that dropping it while the connection is `Defunct`
/// taints the server it came from, so the next acquisition for that role
/// skips it without the caller having to remember which address it was.
pub struct RoutedLease {
    dispatcher: Arc<RoutingDispatcher>,
    address: Address,
    lease: Option<Lease>,
}

impl Deref for RoutedLease {
    type Target = Connection;
    fn deref(&self) -> &Connection {
        self.lease.as_ref().expect("connection taken before drop")
    }
}

impl DerefMut for RoutedLease {
    fn deref_mut(&mut self) -> &mut Connection {
        self.lease.as_mut().expect("connection taken before drop")
    }
}

impl Drop for RoutedLease {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            let defunct = lease.state() == ConnectionState::Defunct;
            drop(lease);
            if defunct {
                self.dispatcher.taint(&self.address);
            }
        }
    }
}
