//! The types most callers reach for first, re-exported from their owning
//! modules the way `t51core::prelude` re-exports `World`/`Component`/etc.

pub use crate::address::{Address, Resolver};
pub use crate::config::Config;
pub use crate::connection::{Connection, ConnectionState, Summary};
pub use crate::environment::Environment;
pub use crate::error::{Error, Result};
pub use crate::pool::{Lease, Pool, PoolConfig};
pub use crate::routing::{Role, RoutedLease, RoutingDispatcher};
pub use crate::value::{Structure, Value};
