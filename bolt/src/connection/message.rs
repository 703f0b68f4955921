//! Message structure signatures (spec.md §6, "Wire protocol"). Field counts
//! and metadata-map keys follow the published Bolt specification for the
//! negotiated version; this crate only needs the signature byte and field
//! order to build/parse them.

use indexmap::IndexMap;

use crate::value::{Structure, Value};

pub const INIT: u8 = 0x01;
pub const RUN: u8 = 0x10;
pub const DISCARD_ALL: u8 = 0x2F;
pub const PULL_ALL: u8 = 0x3F;
pub const ACK_FAILURE: u8 = 0x0E;
pub const RESET: u8 = 0x0F;

pub const RECORD: u8 = 0x71;
pub const SUCCESS: u8 = 0x70;
pub const FAILURE: u8 = 0x7F;
pub const IGNORED: u8 = 0x7E;

pub fn init(user_agent: &str, auth_token: IndexMap<String, Value>) -> Structure {
    Structure::new(INIT, vec![Value::from(user_agent), Value::Map(auth_token)])
}

pub fn run(statement: &str, parameters: IndexMap<String, Value>) -> Structure {
    Structure::new(RUN, vec![Value::from(statement), Value::Map(parameters)])
}

pub fn pull_all() -> Structure {
    Structure::new(PULL_ALL, vec![])
}

pub fn discard_all() -> Structure {
    Structure::new(DISCARD_ALL, vec![])
}

pub fn ack_failure() -> Structure {
    Structure::new(ACK_FAILURE, vec![])
}

pub fn reset() -> Structure {
    Structure::new(RESET, vec![])
}

/// The terminal reply to one request: either a metadata map (SUCCESS) or a
/// shortcut notice that the request was never executed because the
/// connection was in `Failed` state (IGNORED). A FAILURE reply is not
/// represented here - it is surfaced as `Error::ServerFailure` instead,
/// since it is the one server-side error kind callers recover from rather
/// than just read (spec.md §7).
#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    Success(IndexMap<String, Value>),
    Ignored,
}
