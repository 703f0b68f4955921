/// Connection lifecycle states (spec.md §4.3). Transitions are driven
/// entirely by [`super::Connection`]'s send/fetch methods; nothing outside
/// this crate observes or sets a state directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, no handshake.
    Disconnected,
    /// Socket up, version negotiated, INIT not yet acknowledged.
    Connected,
    /// INIT acknowledged; idle and able to accept a new request.
    Ready,
    /// A request is mid-flight: RECORDs may still arrive before the
    /// terminal summary.
    Streaming,
    /// The last request's terminal reply was FAILURE; only ACK_FAILURE or
    /// RESET are accepted until recovery.
    Failed,
    /// Terminal. The connection must be discarded; no further operation but
    /// destroying it is valid.
    Defunct,
}

impl ConnectionState {
    /// Defunct connections accept no further protocol operations.
    pub fn is_usable(self) -> bool {
        self != ConnectionState::Defunct
    }

    /// Whether a RESET round-trip is what the pool uses to prove an idle
    /// connection is still alive (spec.md §4.5, "liveness probe").
    pub fn needs_recovery(self) -> bool {
        matches!(self, ConnectionState::Failed)
    }
}
