//! Server addresses and the resolver that turns a logical host/port into
//! concrete socket endpoints (spec.md §4.4, §6 "Consumed external
//! interfaces"). Resolution is delegated to the caller rather than baked
//! into the crate - DNS, service discovery, and test doubles all look the
//! same from here.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::Result;

/// A logical server endpoint: host name (or literal IP) plus port. Equality
/// and hashing are by host/port, not by whatever a resolver returns for
/// them, since routing tables and pool maps key on the logical address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new<H: Into<String>>(host: H, port: u16) -> Address {
        Address { host: host.into(), port }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// `resolve(host, port) -> ordered list of endpoints or error` (spec.md §6).
/// Implementations may hit DNS, a service mesh, or (in tests) a fixed table;
/// the driver only needs the ordered list of candidates, tried in order.
pub trait Resolver: Send + Sync {
    fn resolve(&self, address: &Address) -> Result<Vec<SocketAddr>>;
}

/// The default resolver: defers to the platform's own DNS stack via
/// `std::net::ToSocketAddrs`, the same call the teacher's listener setup
/// (`server/util/src/bin/test_listen.rs`) uses to turn a literal address
/// string into a `SocketAddr` before binding.
pub struct DnsResolver;

impl Resolver for DnsResolver {
    fn resolve(&self, address: &Address) -> Result<Vec<SocketAddr>> {
        use std::net::ToSocketAddrs;
        let endpoints = (address.host.as_str(), address.port).to_socket_addrs()?.collect();
        Ok(endpoints)
    }
}

pub type SharedResolver = Arc<dyn Resolver>;

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResolver(Vec<SocketAddr>);

    impl Resolver for FixedResolver {
        fn resolve(&self, _address: &Address) -> Result<Vec<SocketAddr>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn address_formats_as_host_colon_port() {
        let addr = Address::new("graph.example.com", 7687);
        assert_eq!(addr.to_string(), "graph.example.com:7687");
    }

    #[test]
    fn equality_and_hashing_ignore_resolution_results() {
        let a = Address::new("localhost", 7687);
        let b = Address::new("localhost", 7687);
        assert_eq!(a, b);
    }

    #[test]
    fn custom_resolver_is_consulted_for_endpoints() {
        let endpoint: SocketAddr = "127.0.0.1:7687".parse().unwrap();
        let resolver = FixedResolver(vec![endpoint]);
        let resolved = resolver.resolve(&Address::new("localhost", 7687)).unwrap();
        assert_eq!(resolved, vec![endpoint]);
    }
}
