//! Server configuration: TOML file + CLI overrides.

use crate::session::SessionOptions;
use pollchat_core::{ChatError, ChatResult};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub keepalive: KeepaliveSection,
    #[serde(default)]
    pub relay: RelaySection,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            worker_threads: default_worker_threads(),
        }
    }
}

/// `[keepalive]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct KeepaliveSection {
    #[serde(default = "default_keepalive_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_keepalive_timeout")]
    pub timeout_ms: u64,
}

impl Default for KeepaliveSection {
    fn default() -> Self {
        Self {
            interval_ms: default_keepalive_interval(),
            timeout_ms: default_keepalive_timeout(),
        }
    }
}

/// `[relay]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySection {
    #[serde(default = "default_true")]
    pub presence_notices: bool,
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            presence_notices: true,
            stats_interval_secs: default_stats_interval(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    33333
}
fn default_worker_threads() -> usize {
    5
}
fn default_keepalive_interval() -> u64 {
    6000
}
fn default_keepalive_timeout() -> u64 {
    5000
}
fn default_stats_interval() -> u64 {
    10
}
fn default_true() -> bool {
    true
}

/// Resolved server configuration (CLI overrides applied).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub worker_threads: usize,
    pub keepalive_interval: Duration,
    pub keepalive_timeout: Duration,
    pub presence_notices: bool,
    /// `None` disables the periodic stats line.
    pub stats_interval: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_file(ConfigFile::default())
    }
}

impl ServerConfig {
    /// Load config from TOML file, then apply CLI overrides.
    pub fn load(
        config_path: Option<&Path>,
        cli_bind: Option<&str>,
        cli_port: Option<u16>,
        cli_worker_threads: Option<usize>,
        cli_keepalive_timeout_ms: Option<u64>,
        cli_no_presence: bool,
    ) -> ChatResult<Self> {
        let file_config = match config_path {
            Some(path) => {
                let expanded = expand_tilde(path);
                if expanded.exists() {
                    info!(path = %expanded.display(), "loading config file");
                    let content = std::fs::read_to_string(&expanded)?;
                    toml::from_str::<ConfigFile>(&content)
                        .map_err(|e| ChatError::Config(format!("config parse error: {e}")))?
                } else {
                    info!(path = %expanded.display(), "config file not found, using defaults");
                    ConfigFile::default()
                }
            }
            None => ConfigFile::default(),
        };

        let mut config = Self::from_file(file_config);

        // Merge CLI overrides
        if let Some(bind) = cli_bind {
            config.bind = bind.to_string();
        }
        if let Some(port) = cli_port {
            config.port = port;
        }
        if let Some(threads) = cli_worker_threads {
            config.worker_threads = threads;
        }
        if let Some(ms) = cli_keepalive_timeout_ms {
            config.keepalive_timeout = Duration::from_millis(ms);
        }
        if cli_no_presence {
            config.presence_notices = false;
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(file: ConfigFile) -> Self {
        Self {
            bind: file.server.bind,
            port: file.server.port,
            worker_threads: file.server.worker_threads,
            keepalive_interval: Duration::from_millis(file.keepalive.interval_ms),
            keepalive_timeout: Duration::from_millis(file.keepalive.timeout_ms),
            presence_notices: file.relay.presence_notices,
            stats_interval: match file.relay.stats_interval_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }

    fn validate(&self) -> ChatResult<()> {
        if self.worker_threads == 0 {
            return Err(ChatError::Config("worker_threads must be at least 1".into()));
        }
        if self.keepalive_interval.is_zero() {
            return Err(ChatError::Config("keepalive interval must be non-zero".into()));
        }
        Ok(())
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> ChatResult<SocketAddr> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| ChatError::Config(format!("invalid address {}:{}: {e}", self.bind, self.port)))
    }

    /// Per-session settings derived from this config.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            keepalive_interval: self.keepalive_interval,
            keepalive_timeout: self.keepalive_timeout,
            presence_notices: self.presence_notices,
        }
    }
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let config = ServerConfig::load(None, None, None, None, None, false).unwrap();
        assert_eq!(config.port, 33333);
        assert_eq!(config.worker_threads, 5);
        assert_eq!(config.keepalive_interval, Duration::from_secs(6));
        assert_eq!(config.keepalive_timeout, Duration::from_secs(5));
        assert!(config.presence_notices);
        assert_eq!(config.stats_interval, Some(Duration::from_secs(10)));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = ServerConfig::load(Some(&path), None, None, None, None, false).unwrap();
        assert_eq!(config.port, 33333);
    }

    #[test]
    fn file_values_then_cli_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 4000
worker_threads = 2

[keepalive]
interval_ms = 100
timeout_ms = 250

[relay]
presence_notices = true
stats_interval_secs = 0
"#
        )
        .unwrap();

        let config = ServerConfig::load(Some(file.path()), None, None, None, None, false).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.keepalive_interval, Duration::from_millis(100));
        assert_eq!(config.keepalive_timeout, Duration::from_millis(250));
        assert_eq!(config.stats_interval, None);

        let config =
            ServerConfig::load(Some(file.path()), Some("127.0.0.1"), Some(5000), None, Some(900), true)
                .unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:5000");
        assert_eq!(config.keepalive_timeout, Duration::from_millis(900));
        assert!(!config.presence_notices);
    }

    #[test]
    fn bad_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"not a number\"").unwrap();
        let err = ServerConfig::load(Some(file.path()), None, None, None, None, false).unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn zero_workers_rejected() {
        let err = ServerConfig::load(None, None, None, Some(0), None, false).unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }
}
