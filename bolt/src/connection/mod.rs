//! The connection state machine and message pipeline (spec.md §4.3). A
//! `Connection` owns one negotiated socket and pairs outbound requests with
//! inbound replies in FIFO order, the way the teacher's `net::channel::Channel`
//! pairs a stream with a read/write `Buffer` pair - generalized here from a
//! game-server frame protocol to the Bolt RUN/PULL_ALL/RECORD/SUCCESS cycle.

mod message;
mod state;

use std::collections::VecDeque;

use indexmap::IndexMap;

use bolt_support::logging::Logger;
use bolt_support::time;

use crate::error::{Error, Result};
use crate::packstream::{pack, unpack};
use crate::transport::{framing, handshake, Transport};
use crate::value::{Structure, Value};

pub use message::Summary;
pub use state::ConnectionState;

/// How long a connection may sit idle in a pool slot before the next
/// acquire forces a liveness probe instead of trusting the cached state
/// (spec.md §4.5, "liveness probe").
pub const DEFAULT_LIVENESS_THRESHOLD_SECS: u64 = 60;

pub struct Connection {
    transport: Box<dyn Transport>,
    state: ConnectionState,
    protocol_version: u32,
    logger: Logger,
    next_request_id: u64,
    /// Ids sent but not yet fully consumed, oldest first, tagged with
    /// whether their SUCCESS is a RUN header (more is coming) or a
    /// terminal summary (the response is over once it arrives).
    pending: VecDeque<(u64, RequestKind)>,
    last_failure: Option<(String, String)>,
    created_at: u64,
    last_used_at: u64,
}

/// Distinguishes a RUN's header SUCCESS, which leaves the connection
/// Streaming because PULL_ALL/DISCARD_ALL is still to come, from every
/// other request's SUCCESS, which is terminal (spec.md §4.3 table, "Ready |
/// send RUN/PULL/…, SUCCESS header | Streaming").
#[derive(Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Run,
    Terminal,
}

/// One reply message read off the wire while pairing responses to a
/// request id: either a data record belonging to the current streaming
/// response, or its terminal summary.
enum Fetched {
    Record(Vec<Value>),
    Summary(Summary),
}

impl Connection {
    /// Runs the handshake over an already-connected transport and returns a
    /// `Connected` connection. Does not send INIT; callers must follow up
    /// with [`Connection::init`] before issuing any other request (spec.md
    /// §4.3 transition table: Disconnected -> Connected on handshake,
    /// Connected -> Ready on INIT success).
    pub fn handshake(mut transport: Box<dyn Transport>, candidates: [u32; handshake::CANDIDATE_COUNT], logger: Logger) -> Result<Connection> {
        let version = handshake::negotiate(&mut transport, candidates)?;
        logger.debug(&format!("handshake negotiated protocol version {}", version));

        let now = time::timestamp_secs();
        Ok(Connection {
            transport,
            state: ConnectionState::Connected,
            protocol_version: version,
            logger,
            next_request_id: 0,
            pending: VecDeque::new(),
            last_failure: None,
            created_at: now,
            last_used_at: now,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn last_used_at(&self) -> u64 {
        self.last_used_at
    }

    /// The most recent server FAILURE, kept until the next successful
    /// summary overwrites or clears it (spec.md §7, "Propagation").
    pub fn last_failure(&self) -> Option<&(String, String)> {
        self.last_failure.as_ref()
    }

    /// Sends INIT with the given user agent and auth token and waits for its
    /// summary. Connected -> Ready on SUCCESS, Connected -> Defunct on
    /// FAILURE (spec.md §4.3 table).
    pub fn init(&mut self, user_agent: &str, auth_token: IndexMap<String, Value>) -> Result<()> {
        let id = self.send(message::init(user_agent, auth_token), RequestKind::Terminal)?;
        match self.fetch_summary(id) {
            Ok(_) => {
                self.state = ConnectionState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Defunct;
                Err(e)
            }
        }
    }

    /// Sends RUN for `statement`/`parameters` and returns its request id.
    pub fn run(&mut self, statement: &str, parameters: IndexMap<String, Value>) -> Result<u64> {
        self.send(message::run(statement, parameters), RequestKind::Run)
    }

    pub fn pull_all(&mut self) -> Result<u64> {
        self.send(message::pull_all(), RequestKind::Terminal)
    }

    pub fn discard_all(&mut self) -> Result<u64> {
        self.send(message::discard_all(), RequestKind::Terminal)
    }

    /// Acknowledges a FAILURE and returns to Ready without discarding
    /// requests already queued behind it (spec.md §4.3, "Failed | RESET
    /// SUCCESS | Ready"; ACK_FAILURE is RESET's gentler sibling, spec.md
    /// §4.3 "Recovery").
    pub fn ack_failure(&mut self) -> Result<()> {
        let id = self.send(message::ack_failure(), RequestKind::Terminal)?;
        self.fetch_summary(id)?;
        self.state = ConnectionState::Ready;
        self.last_failure = None;
        Ok(())
    }

    /// Sends RESET, discarding any requests queued behind it, and waits for
    /// Ready. Used both for explicit recovery from Failed and as the pool's
    /// liveness probe on an idle connection (spec.md §4.5).
    pub fn reset(&mut self) -> Result<()> {
        self.pending.clear();
        let id = self.send(message::reset(), RequestKind::Terminal)?;
        self.fetch_summary(id)?;
        self.state = ConnectionState::Ready;
        self.last_failure = None;
        Ok(())
    }

    /// Reads and discards records/summaries until the response `until_id`
    /// is fully consumed (spec.md §4.3, "Request/response pairing").
    pub fn fetch(&mut self, until_id: u64) -> Result<()> {
        loop {
            let was_front = self.pending.front().map(|&(id, _)| id);
            match self.fetch_one()? {
                Fetched::Record(_) => continue,
                Fetched::Summary(_) => {
                    if was_front == Some(until_id) {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Reads (discarding any records) until the terminal summary of
    /// `until_id` arrives, then returns it.
    pub fn fetch_summary(&mut self, until_id: u64) -> Result<Summary> {
        loop {
            let was_front = self.pending.front().map(|&(id, _)| id);
            match self.fetch_one()? {
                Fetched::Record(_) => continue,
                Fetched::Summary(summary) => {
                    if was_front == Some(until_id) {
                        return Ok(summary);
                    }
                }
            }
        }
    }

    /// Reads the next record belonging to `until_id`'s response, or `None`
    /// once its terminal summary has been consumed.
    pub fn next_record(&mut self, until_id: u64) -> Result<Option<Vec<Value>>> {
        if self.pending.front().map(|&(id, _)| id) != Some(until_id) {
            return Ok(None);
        }
        match self.fetch_one()? {
            Fetched::Record(fields) => Ok(Some(fields)),
            Fetched::Summary(_) => Ok(None),
        }
    }

    fn send(&mut self, structure: Structure, kind: RequestKind) -> Result<u64> {
        if !self.state.is_usable() {
            return Err(Error::ProtocolViolation("connection is defunct"));
        }

        let bytes = pack(&Value::Structure(structure))?;
        framing::write_message(&mut self.transport, &bytes)?;

        let id = self.next_request_id;
        self.next_request_id += 1;
        self.pending.push_back((id, kind));
        self.last_used_at = time::timestamp_secs();
        Ok(id)
    }

    fn fetch_one(&mut self) -> Result<Fetched> {
        let bytes = framing::read_message(&mut self.transport)?;
        let value = unpack(&bytes)?;
        let structure = match value {
            Value::Structure(s) => s,
            _ => return Err(Error::ProtocolViolation("server reply is not a structure")),
        };

        self.last_used_at = time::timestamp_secs();

        match structure.signature {
            message::RECORD => {
                self.state = ConnectionState::Streaming;
                let fields = match structure.fields.into_iter().next() {
                    Some(Value::List(items)) => items,
                    _ => return Err(Error::ProtocolViolation("RECORD field is not a list")),
                };
                Ok(Fetched::Record(fields))
            }
            message::SUCCESS => {
                let metadata = self.take_map_field(structure)?;
                let (_, kind) = self.pending.pop_front().ok_or(Error::ProtocolViolation("unsolicited SUCCESS"))?;
                match kind {
                    RequestKind::Run => self.state = ConnectionState::Streaming,
                    RequestKind::Terminal if self.pending.is_empty() => self.state = ConnectionState::Ready,
                    RequestKind::Terminal => {}
                }
                Ok(Fetched::Summary(Summary::Success(metadata)))
            }
            message::IGNORED => {
                self.pending.pop_front();
                Ok(Fetched::Summary(Summary::Ignored))
            }
            message::FAILURE => {
                let metadata = self.take_map_field(structure)?;
                let code = metadata.get("code").and_then(Value::as_str).unwrap_or("Neo.DatabaseError.General.UnknownError").to_string();
                let msg = metadata.get("message").and_then(Value::as_str).unwrap_or("").to_string();
                self.pending.pop_front();
                self.last_failure = Some((code.clone(), msg.clone()));
                self.state = ConnectionState::Failed;
                Err(Error::ServerFailure { code, message: msg })
            }
            other => Err(Error::ProtocolUnexpectedMarker(other)),
        }
    }

    fn take_map_field(&self, structure: Structure) -> Result<IndexMap<String, Value>> {
        match structure.fields.into_iter().next() {
            Some(Value::Map(m)) => Ok(m),
            _ => Err(Error::ProtocolViolation("summary field is not a map")),
        }
    }

    /// Marks the connection as unusable after an I/O error or protocol
    /// violation observed outside the normal fetch path (e.g. by the pool's
    /// liveness probe). Any state, any such event, goes to Defunct (spec.md
    /// §4.3 table, "Any | I/O error or protocol violation | Defunct").
    pub fn mark_defunct(&mut self) {
        self.state = ConnectionState::Defunct;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// An in-memory transport that replays pre-baked server frames and
    /// captures whatever the connection writes, so state transitions can be
    /// exercised without a real socket.
    struct ScriptedTransport {
        inbound: Cursor<Vec<u8>>,
        outbound: Vec<u8>,
    }

    impl std::io::Read for ScriptedTransport {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            std::io::Read::read(&mut self.inbound, buf)
        }
    }

    impl std::io::Write for ScriptedTransport {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.outbound.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn frame(structure: Structure) -> Vec<u8> {
        let bytes = pack(&Value::Structure(structure)).unwrap();
        let mut out = Vec::new();
        framing::write_message(&mut out, &bytes).unwrap();
        out
    }

    fn success(pairs: Vec<(&str, Value)>) -> Structure {
        let map: IndexMap<String, Value> = pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        Structure::new(message::SUCCESS, vec![Value::Map(map)])
    }

    fn record(fields: Vec<Value>) -> Structure {
        Structure::new(message::RECORD, vec![Value::List(fields)])
    }

    fn failure(code: &str, msg: &str) -> Structure {
        let map: IndexMap<String, Value> = vec![("code".to_string(), Value::from(code)), ("message".to_string(), Value::from(msg))].into_iter().collect();
        Structure::new(message::FAILURE, vec![Value::Map(map)])
    }

    fn connection_with_script(frames: Vec<Structure>) -> Connection {
        let mut inbound = Vec::new();
        for s in frames {
            inbound.extend(frame(s));
        }

        Connection {
            transport: Box::new(ScriptedTransport { inbound: Cursor::new(inbound), outbound: Vec::new() }),
            state: ConnectionState::Connected,
            protocol_version: 1,
            logger: Logger::none(),
            next_request_id: 0,
            pending: VecDeque::new(),
            last_failure: None,
            created_at: 0,
            last_used_at: 0,
        }
    }

    #[test]
    fn init_success_transitions_to_ready() {
        let mut conn = connection_with_script(vec![success(vec![("server", Value::from("neo4j"))])]);
        conn.init("bolt-test/0.1", IndexMap::new()).unwrap();
        assert_eq!(conn.state(), ConnectionState::Ready);
    }

    #[test]
    fn init_failure_transitions_to_defunct() {
        let mut conn = connection_with_script(vec![failure("Neo.ClientError.Security.Unauthorized", "bad credentials")]);
        let err = conn.init("bolt-test/0.1", IndexMap::new()).unwrap_err();
        assert!(matches!(err, Error::ServerFailure { .. }));
        assert_eq!(conn.state(), ConnectionState::Defunct);
    }

    #[test]
    fn run_pull_all_delivers_one_record_then_returns_to_ready() {
        let mut conn = connection_with_script(vec![
            success(vec![("fields", Value::from(vec![Value::from("1")]))]),
            record(vec![Value::Integer(1)]),
            success(vec![("type", Value::from("r"))]),
        ]);
        conn.state = ConnectionState::Ready;

        let run_id = conn.run("RETURN 1", IndexMap::new()).unwrap();
        conn.fetch_summary(run_id).unwrap();
        assert_eq!(conn.state(), ConnectionState::Streaming);

        let pull_id = conn.pull_all().unwrap();
        let first = conn.next_record(pull_id).unwrap();
        assert_eq!(first, Some(vec![Value::Integer(1)]));
        assert_eq!(conn.state(), ConnectionState::Streaming);

        let summary = conn.fetch_summary(pull_id).unwrap();
        assert!(matches!(summary, Summary::Success(_)));
        assert_eq!(conn.state(), ConnectionState::Ready);
    }

    #[test]
    fn failure_then_ack_failure_returns_to_ready() {
        let mut conn = connection_with_script(vec![
            failure("Neo.ClientError.Statement.SyntaxError", "bad query"),
            success(vec![]),
        ]);
        conn.state = ConnectionState::Ready;

        let run_id = conn.run("NOT CYPHER", IndexMap::new()).unwrap();
        let err = conn.fetch_summary(run_id).unwrap_err();
        assert!(matches!(err, Error::ServerFailure { .. }));
        assert_eq!(conn.state(), ConnectionState::Failed);

        conn.ack_failure().unwrap();
        assert_eq!(conn.state(), ConnectionState::Ready);
        assert!(conn.last_failure().is_none());
    }

    #[test]
    fn eof_mid_chunk_surfaces_as_end_of_transmission() {
        // Header promises a chunk but the stream ends before it arrives.
        let mut conn = Connection {
            transport: Box::new(ScriptedTransport { inbound: Cursor::new(vec![0x00, 0x05, 1, 2]), outbound: Vec::new() }),
            state: ConnectionState::Ready,
            protocol_version: 1,
            logger: Logger::none(),
            next_request_id: 0,
            pending: VecDeque::new(),
            last_failure: None,
            created_at: 0,
            last_used_at: 0,
        };
        conn.pending.push_back((0, RequestKind::Terminal));

        let err = conn.fetch_summary(0).unwrap_err();
        assert_eq!(err, Error::EndOfTransmission);
    }

    #[test]
    fn sending_on_a_defunct_connection_is_rejected() {
        let mut conn = connection_with_script(vec![]);
        conn.mark_defunct();
        let err = conn.run("RETURN 1", IndexMap::new()).unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }
}
