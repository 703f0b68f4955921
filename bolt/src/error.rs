//! Unified error currency for the driver, patterned after the teacher's
//! `net::error`/`net::result` modules (a plain enum, a `From<io::Error>`
//! impl, a `Result` type alias) rather than `thiserror`/`anyhow`.
//!
//! Variants correspond 1:1 to the error codes seabolt (the C driver this
//! spec was distilled from) enumerates in `bolt/error.h`; the mapping is
//! noted per-variant rather than reusing the numeric codes, which are not
//! part of this crate's contract.

use std::fmt;
use std::io;

/// `BOLT_CONNECTION_RESET`, `BOLT_TIMED_OUT`, `BOLT_END_OF_TRANSMISSION`, etc.
/// A connection that raises any of these transitions to `Defunct`; callers
/// may retry on a fresh connection but the driver never retries for them.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Error {
    /// `BOLT_CONNECTION_REFUSED`
    ConnectionRefused,
    /// `BOLT_NETWORK_UNREACHABLE`
    NetworkUnreachable,
    /// `BOLT_CONNECTION_RESET`
    ConnectionReset,
    /// `BOLT_TIMED_OUT`
    TimedOut,
    /// `BOLT_INTERRUPTED`
    Interrupted,
    /// `BOLT_END_OF_TRANSMISSION`
    EndOfTransmission,

    /// `BOLT_TRANSPORT_UNSUPPORTED` / `BOLT_PROTOCOL_UNSUPPORTED` — handshake version mismatch.
    ProtocolUnsupported,
    /// `BOLT_PROTOCOL_UNEXPECTED_MARKER`
    ProtocolUnexpectedMarker(u8),
    /// `BOLT_PROTOCOL_UNSUPPORTED_TYPE`
    ProtocolUnsupportedType(u8),
    /// `BOLT_PROTOCOL_NOT_IMPLEMENTED_TYPE`
    ProtocolNotImplementedType(u8),
    /// `BOLT_PROTOCOL_VIOLATION` — catch-all for malformed wire data.
    ProtocolViolation(&'static str),

    /// `BOLT_TLS_ERROR`
    TlsError(String),

    /// `BOLT_SERVER_FAILURE` — recoverable on the same connection via
    /// ACK_FAILURE or RESET.
    ServerFailure { code: String, message: String },

    /// `BOLT_POOL_FULL`
    PoolFull,
    /// `BOLT_POOL_ACQUISITION_TIMED_OUT`
    PoolAcquisitionTimedOut,

    /// `BOLT_ROUTING_UNABLE_TO_RETRIEVE_ROUTING_TABLE`
    RoutingUnableToRetrieveTable,
    /// `BOLT_ROUTING_NO_SERVERS_TO_SELECT`
    RoutingNoServersToSelect,
    /// `BOLT_ROUTING_UNABLE_TO_CONSTRUCT_POOL_FOR_SERVER`
    RoutingUnableToConstructPool,
    /// `BOLT_ROUTING_UNEXPECTED_DISCOVERY_RESPONSE`
    RoutingUnexpectedDiscoveryResponse,

    /// `BOLT_OUT_OF_MEMORY`
    OutOfMemory,
    /// `BOLT_OUT_OF_FILES`
    OutOfFiles,
    /// `BOLT_OUT_OF_PORTS`
    OutOfPorts,
    /// `BOLT_PERMISSION_DENIED`
    PermissionDenied,

    /// Any other `io::Error` not covered by a more specific variant above.
    Io(io::ErrorKind),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether recovering this error keeps the connection usable (only
    /// server FAILURE frames are recoverable, via ACK_FAILURE/RESET).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::ServerFailure { .. })
    }
}

impl From<io::Error> for Error {
    fn from(io_error: io::Error) -> Self {
        match io_error.kind() {
            io::ErrorKind::ConnectionRefused => Error::ConnectionRefused,
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => Error::ConnectionReset,
            io::ErrorKind::TimedOut => Error::TimedOut,
            io::ErrorKind::Interrupted => Error::Interrupted,
            io::ErrorKind::UnexpectedEof => Error::EndOfTransmission,
            io::ErrorKind::PermissionDenied => Error::PermissionDenied,
            kind => Error::Io(kind),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConnectionRefused => write!(f, "connection refused"),
            Error::NetworkUnreachable => write!(f, "network unreachable"),
            Error::ConnectionReset => write!(f, "connection reset"),
            Error::TimedOut => write!(f, "operation timed out"),
            Error::Interrupted => write!(f, "operation interrupted"),
            Error::EndOfTransmission => write!(f, "end of transmission"),
            Error::ProtocolUnsupported => write!(f, "protocol version unsupported"),
            Error::ProtocolUnexpectedMarker(m) => write!(f, "unexpected packstream marker 0x{:02X}", m),
            Error::ProtocolUnsupportedType(m) => write!(f, "unsupported packstream type 0x{:02X}", m),
            Error::ProtocolNotImplementedType(m) => write!(f, "not-implemented packstream type 0x{:02X}", m),
            Error::ProtocolViolation(why) => write!(f, "protocol violation: {}", why),
            Error::TlsError(why) => write!(f, "TLS error: {}", why),
            Error::ServerFailure { code, message } => write!(f, "server failure {}: {}", code, message),
            Error::PoolFull => write!(f, "connection pool is full"),
            Error::PoolAcquisitionTimedOut => write!(f, "timed out acquiring a connection from the pool"),
            Error::RoutingUnableToRetrieveTable => write!(f, "unable to retrieve routing table"),
            Error::RoutingNoServersToSelect => write!(f, "no servers available to select for this role"),
            Error::RoutingUnableToConstructPool => write!(f, "unable to construct pool for server"),
            Error::RoutingUnexpectedDiscoveryResponse => write!(f, "unexpected routing discovery response"),
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::OutOfFiles => write!(f, "out of file descriptors"),
            Error::OutOfPorts => write!(f, "out of ephemeral ports"),
            Error::PermissionDenied => write!(f, "permission denied"),
            Error::Io(kind) => write!(f, "io error: {:?}", kind),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_failure_is_recoverable() {
        let err = Error::ServerFailure { code: "Neo.ClientError.Statement.SyntaxError".into(), message: "bad query".into() };
        assert!(err.is_recoverable());
    }

    #[test]
    fn protocol_violation_is_not_recoverable() {
        assert!(!Error::ProtocolUnsupported.is_recoverable());
    }

    #[test]
    fn would_block_is_not_specially_mapped() {
        // WouldBlock is handled by the transport layer directly (it is
        // not a terminal condition); anything else funnels through here.
        let io_err: Error = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert_eq!(io_err, Error::EndOfTransmission);
    }
}
