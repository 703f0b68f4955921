//! A process-wide initialization handle (Design Note 9, "Global process
//! state"). Seabolt starts and stops WinSock/OpenSSL once per process via
//! `Bolt_startup`/`Bolt_shutdown`; the teacher instead reaches for a
//! `#[ctor]`-run function (`flux::crypto`'s `INIT_SODIUM`) that fires before
//! `main` with no call site at all. Design Note 9 asks a port to replace
//! both patterns with an explicit, acquired-once, `Drop`-released resource
//! rather than hidden static state - no `#[ctor]`, no lazy global.
//!
//! This crate doesn't own a crypto library to start (TLS context
//! construction is an out-of-scope collaborator per spec.md §1), so
//! `Environment` carries only the memory-telemetry hookup today, but it is
//! the natural, single place a caller wires in socket/TLS subsystem startup
//! without reintroducing a hidden global.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Out-of-scope telemetry interface (spec.md §6, "Memory allocator") a
/// caller may wire in to observe current/peak byte usage. Design Note 9
/// says the global counters the C original keeps are "not part of the
/// functional contract" - a port may lift accounting into a per-process
/// object like this one, or omit it entirely.
pub trait MemoryTelemetry: Send + Sync {
    fn report(&self, current_bytes: u64, peak_bytes: u64);
}

/// The process-wide scope every other part of this crate's runtime
/// behavior lives inside. Acquired once via [`Environment::init`];
/// releases whatever it holds on `Drop`. A second concurrent `init()` call
/// fails rather than silently sharing state with the first, since the
/// point of this type is to make process-wide setup visible at a call
/// site instead of inferred from the first access to some global.
pub struct Environment {
    telemetry: Option<Arc<dyn MemoryTelemetry>>,
}

/// Returned by [`Environment::init`] when a handle is already held
/// elsewhere in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyInitialized;

impl Environment {
    /// Acquires the process-wide scope. Only one `Environment` may be live
    /// at a time; call [`Environment::init`] once near the start of `main`
    /// and hold the returned handle for the process's lifetime.
    pub fn init() -> Result<Environment, AlreadyInitialized> {
        if ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(AlreadyInitialized);
        }
        Ok(Environment { telemetry: None })
    }

    /// Attaches a memory telemetry sink that the pool and connections can
    /// report current/peak byte counts to (spec.md §6). Optional: omitting
    /// it is valid, per Design Note 9.
    pub fn with_telemetry(mut self, telemetry: Arc<dyn MemoryTelemetry>) -> Environment {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn telemetry(&self) -> Option<&Arc<dyn MemoryTelemetry>> {
        self.telemetry.as_ref()
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        ACTIVE.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingTelemetry {
        last: std::sync::Mutex<(u64, u64)>,
    }

    impl MemoryTelemetry for RecordingTelemetry {
        fn report(&self, current_bytes: u64, peak_bytes: u64) {
            *self.last.lock().unwrap() = (current_bytes, peak_bytes);
        }
    }

    /// `ACTIVE` is a single process-wide static, so every case here runs in
    /// one test function - run as separate `#[test]`s, cargo's parallel test
    /// threads would race on it and fail spuriously.
    #[test]
    fn environment_lifecycle() {
        let first = Environment::init().unwrap();
        let err = Environment::init().unwrap_err();
        assert_eq!(err, AlreadyInitialized);

        let telemetry = Arc::new(RecordingTelemetry { last: std::sync::Mutex::new((0, 0)) });
        let first = first.with_telemetry(telemetry.clone());
        first.telemetry().unwrap().report(128, 256);
        assert_eq!(*telemetry.last.lock().unwrap(), (128, 256));

        drop(first);
        let second = Environment::init();
        assert!(second.is_ok());
    }
}
