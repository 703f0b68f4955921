//! Four-level logger with nullable per-level sinks.
//!
//! Mirrors the shape the driver's consumed "log sink" external interface is
//! specified with: four independent callbacks (debug, info, warn, error),
//! any of which may be absent to disable that level. No level filtering
//! happens at the call site — if a level's sink is `None`, calls to it are
//! simply no-ops; filtering is the sink's business (see `init_from_toml`,
//! which builds sinks from a `sloggers` config).

use std::sync::Arc;

use sloggers::Config;

type Sink = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Default)]
pub struct Logger {
    debug: Option<Sink>,
    info: Option<Sink>,
    warn: Option<Sink>,
    error: Option<Sink>,
}

impl Logger {
    /// A logger with every level disabled.
    pub fn none() -> Logger {
        Logger::default()
    }

    /// Build a logger from explicit per-level sinks. Pass `None` to disable a level.
    pub fn new(debug: Option<Sink>, info: Option<Sink>, warn: Option<Sink>, error: Option<Sink>) -> Logger {
        Logger { debug, info, warn, error }
    }

    /// Wrap a single `slog::Logger` so all four levels funnel through it.
    /// Level filtering still happens inside the drain the `slog::Logger` was
    /// built with (terminal level, file level, etc.) - this just adapts the
    /// four-callback shape onto slog's own machinery.
    pub fn from_slog(log: slog::Logger) -> Logger {
        let debug_log = log.clone();
        let info_log = log.clone();
        let warn_log = log.clone();
        let error_log = log;

        Logger::new(
            Some(Arc::new(move |msg: &str| slog::debug!(debug_log, "{}", msg))),
            Some(Arc::new(move |msg: &str| slog::info!(info_log, "{}", msg))),
            Some(Arc::new(move |msg: &str| slog::warn!(warn_log, "{}", msg))),
            Some(Arc::new(move |msg: &str| slog::error!(error_log, "{}", msg))),
        )
    }

    pub fn debug(&self, msg: &str) {
        if let Some(sink) = &self.debug {
            sink(msg)
        }
    }

    pub fn info(&self, msg: &str) {
        if let Some(sink) = &self.info {
            sink(msg)
        }
    }

    pub fn warn(&self, msg: &str) {
        if let Some(sink) = &self.warn {
            sink(msg)
        }
    }

    pub fn error(&self, msg: &str) {
        if let Some(sink) = &self.error {
            sink(msg)
        }
    }
}

/// Build a `Logger` from a `sloggers` TOML configuration document, the same
/// way the authenticator service builds its terminal logger.
pub fn init_from_toml(toml: &str) -> Result<Logger, serdeconv::Error> {
    let config: sloggers::LoggerConfig = serdeconv::from_toml_str(toml)?;
    let log = config.build_logger().map_err(|e| serdeconv::Error::from(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
    Ok(Logger::from_slog(log))
}

/// Default terminal logger at debug level, stderr destination - the
/// driver's fallback when no explicit logging config is supplied.
pub fn init_default() -> Logger {
    init_from_toml(
        r#"
type = "terminal"
level = "debug"
destination = "stderr"
"#,
    )
    .expect("default logger configuration must parse")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn disabled_level_is_a_noop() {
        let logger = Logger::none();
        // Must not panic; there is nothing to observe but absence of work.
        logger.debug("should not be recorded");
        logger.error("should not be recorded");
    }

    #[test]
    fn enabled_level_invokes_sink() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let logger = Logger::new(None, Some(Arc::new(move |_: &str| { counter.fetch_add(1, Ordering::SeqCst); })), None, None);

        logger.info("hello");
        logger.debug("not wired, should not count");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
