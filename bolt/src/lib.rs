//! Core client driver for the Bolt wire protocol: a self-describing binary
//! value system and codec (`value`, `packstream`), a per-connection
//! protocol state machine (`connection`) running over a chunked framed
//! transport (`transport`), and a bounded connection pool (`pool`) driven
//! either directly or through a routing table (`routing`, `address`).
//!
//! Laid out module-per-subsystem, the way the teacher's `t51core` crate
//! lays out `net/`: one top-level module per concern, a flat `pub mod` list
//! here, and a `prelude` for the types most callers reach for first.

pub mod address;
pub mod config;
pub mod connection;
pub mod environment;
pub mod error;
pub mod packstream;
pub mod pool;
pub mod prelude;
pub mod routing;
pub mod transport;
pub mod value;
