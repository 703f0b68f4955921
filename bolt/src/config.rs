//! Driver configuration (spec.md §6, "Configuration options"). Shaped like
//! the teacher's `game::core::config::GameConfig` - plain `serde`-derived
//! structs, a hand-written `Default`, and a `serdeconv`-backed TOML loader -
//! applied here to the options seabolt's `config-private.h` enumerates
//! (`BoltConfig`/`BoltTrust`/`BoltSocketOptions`) instead of game server
//! ports and session tokens.

use std::path::Path;
use std::time::Duration;

use indexmap::IndexMap;
use serde_derive::{Deserialize, Serialize};

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Direct,
    Routing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transport {
    Plain,
    Encrypted,
}

/// `BoltTrust` (seabolt's `config-private.h`): TLS trust policy. Skipping
/// verification is only ever appropriate in development; neither skip flag
/// has a `Default` value of `true`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trust {
    pub cert_pem: Option<Vec<u8>>,
    #[serde(default)]
    pub skip_verify: bool,
    #[serde(default)]
    pub skip_verify_hostname: bool,
}

/// `BoltSocketOptions`. Durations round-trip through TOML as whole seconds;
/// sub-second timeouts are not a documented option of the original either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketOptions {
    pub connect_timeout: Duration,
    pub recv_timeout: Duration,
    pub send_timeout: Duration,
    pub keep_alive: bool,
}

impl Default for SocketOptions {
    fn default() -> SocketOptions {
        SocketOptions {
            connect_timeout: Duration::from_secs(5),
            recv_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(30),
            keep_alive: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mode: Mode,
    pub transport: Transport,
    pub user_agent: String,
    /// Routing context is normally attached programmatically per-connection
    /// rather than read from a static file, so it is left out of the TOML
    /// schema entirely and always starts empty when loading from disk.
    #[serde(skip, default)]
    pub routing_context: IndexMap<String, Value>,
    pub max_pool_size: usize,
    pub max_connection_life_time: Duration,
    pub max_connection_acquisition_time: Duration,
    #[serde(default)]
    pub socket_options: SocketOptions,
    #[serde(default)]
    pub trust: Trust,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            mode: Mode::Direct,
            transport: Transport::Plain,
            user_agent: format!("bolt-rs/{}", env!("CARGO_PKG_VERSION")),
            routing_context: IndexMap::new(),
            max_pool_size: 100,
            max_connection_life_time: Duration::from_secs(3600),
            max_connection_acquisition_time: Duration::from_secs(60),
            socket_options: SocketOptions::default(),
            trust: Trust::default(),
        }
    }
}

impl Config {
    /// Loads and deserializes a configuration file, falling back to
    /// `Config::default()` values for any field the TOML omits and
    /// `#[serde(default)]` covers.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, serdeconv::Error> {
        serdeconv::from_toml_file(path)
    }

    pub fn from_toml_str(toml: &str) -> Result<Config, serdeconv::Error> {
        serdeconv::from_toml_str(toml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_a_single_plain_direct_connection() {
        let config = Config::default();
        assert_eq!(config.mode, Mode::Direct);
        assert_eq!(config.transport, Transport::Plain);
        assert!(config.max_pool_size > 0);
    }

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let toml = r#"
            mode = "Routing"
            transport = "Encrypted"
            user_agent = "bolt-rs-test/1.0"
            max_pool_size = 50
            max_connection_life_time = { secs = 7200, nanos = 0 }
            max_connection_acquisition_time = { secs = 10, nanos = 0 }
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.mode, Mode::Routing);
        assert_eq!(config.max_pool_size, 50);
        assert_eq!(config.socket_options.connect_timeout, Duration::from_secs(5));
    }
}
