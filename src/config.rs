//! Application-level configuration loading: scoreboard endpoint, publish cadence and dashboard.

use std::{
    env, fs,
    io::ErrorKind,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::feed::{
    Endpoint,
    client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_REGISTER_PATHS},
    merger::DEFAULT_CLOCK_PREFIX,
    publisher::DEFAULT_MIN_INTERVAL,
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/jamstats.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "JAMSTATS_CONFIG_PATH";
const DEFAULT_SCOREBOARD_PORT: u16 = 8000;
const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_AUTOREFRESH_SECONDS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
/// Scoreboard connection settings.
pub struct ScoreboardConfig {
    /// Scoreboard host name or address.
    pub host: String,
    /// Scoreboard port.
    pub port: u16,
    /// Connect with `wss://`.
    pub use_ssl: bool,
    /// Paths sent in the registration frame.
    pub register_paths: Vec<String>,
    /// Bound on the connection handshake.
    pub connect_timeout: Duration,
    /// Spacing of application-level pings.
    pub keepalive_interval: Duration,
    /// Path prefixes that never trigger a publish by themselves.
    pub clock_prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Live feed endpoint.
    pub scoreboard: ScoreboardConfig,
    /// Minimum spacing between two published snapshots.
    pub publish_interval: Duration,
    /// Dashboard listen address.
    pub bind: SocketAddr,
    /// `<meta refresh>` period of the HTML pages.
    pub autorefresh_seconds: u64,
    /// Replace skater names with random aliases on every surface.
    pub anonymize: bool,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    /// Load the configuration at `path`; missing or invalid files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        scoreboard = %app_config.endpoint().url(),
                        "loaded config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Live feed endpoint described by this configuration.
    pub fn endpoint(&self) -> Endpoint {
        let scoreboard = &self.scoreboard;
        let mut endpoint =
            Endpoint::new(scoreboard.host.clone(), scoreboard.port, scoreboard.use_ssl);
        endpoint.connect_timeout = scoreboard.connect_timeout;
        endpoint.keepalive_interval = scoreboard.keepalive_interval;
        endpoint.register_paths = scoreboard.register_paths.clone();
        endpoint.clock_prefixes = scoreboard.clock_prefixes.clone();
        endpoint
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    scoreboard: RawScoreboard,
    publish_interval_seconds: Option<u64>,
    bind_address: Option<IpAddr>,
    port: Option<u16>,
    autorefresh_seconds: Option<u64>,
    anonymize: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
/// JSON representation of the `scoreboard` section.
struct RawScoreboard {
    host: Option<String>,
    port: Option<u16>,
    use_ssl: bool,
    register_paths: Option<Vec<String>>,
    connect_timeout_seconds: Option<u64>,
    keepalive_seconds: Option<u64>,
    clock_prefixes: Option<Vec<String>>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let raw = value.scoreboard;
        let scoreboard = ScoreboardConfig {
            host: raw.host.unwrap_or_else(|| "localhost".to_string()),
            port: raw.port.unwrap_or(DEFAULT_SCOREBOARD_PORT),
            use_ssl: raw.use_ssl,
            register_paths: raw
                .register_paths
                .unwrap_or_else(|| DEFAULT_REGISTER_PATHS.map(String::from).to_vec()),
            connect_timeout: raw
                .connect_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            keepalive_interval: raw
                .keepalive_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_KEEPALIVE_INTERVAL),
            clock_prefixes: raw
                .clock_prefixes
                .unwrap_or_else(|| vec![DEFAULT_CLOCK_PREFIX.to_string()]),
        };

        Self {
            scoreboard,
            publish_interval: value
                .publish_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_MIN_INTERVAL),
            bind: SocketAddr::new(
                value
                    .bind_address
                    .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
                value.port.unwrap_or(DEFAULT_SERVER_PORT),
            ),
            autorefresh_seconds: value
                .autorefresh_seconds
                .unwrap_or(DEFAULT_AUTOREFRESH_SECONDS),
            anonymize: value.anonymize,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_the_scoreboard_conventions() {
        let config = AppConfig::default();
        assert_eq!(config.endpoint().url(), "ws://localhost:8000/WS");
        assert_eq!(config.publish_interval, Duration::from_secs(30));
        assert_eq!(config.autorefresh_seconds, 30);
        assert_eq!(config.bind.port(), 8080);
        assert!(!config.anonymize);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "scoreboard": {{"host": "10.0.0.5", "port": 8443, "use_ssl": true, "keepalive_seconds": 5}},
                "publish_interval_seconds": 10,
                "bind_address": "127.0.0.1",
                "port": 9000,
                "anonymize": true
            }}"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path());
        let endpoint = config.endpoint();
        assert_eq!(endpoint.url(), "wss://10.0.0.5:8443/WS");
        assert_eq!(endpoint.keepalive_interval, Duration::from_secs(5));
        assert_eq!(endpoint.register_paths.len(), 2);
        assert_eq!(config.publish_interval, Duration::from_secs(10));
        assert_eq!(config.bind, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert!(config.anonymize);
    }

    #[test]
    fn unreadable_files_fall_back_to_defaults() {
        assert_eq!(
            AppConfig::load_from(Path::new("/no/such/jamstats.json")),
            AppConfig::default()
        );

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"scoreboard": {{"hots": "typo"}}}}"#).unwrap();
        assert_eq!(AppConfig::load_from(file.path()), AppConfig::default());
    }
}
