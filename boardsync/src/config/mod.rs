//! Configuration system for the `BoardSync` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/boardsync/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use crate::session::{
    DEFAULT_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_BASE_DELAY, DEFAULT_RECONNECT_MAX_DELAY,
    ReconnectPolicy, SessionConfig,
};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A setting needed to reach the board is not set anywhere.
    #[error("missing required setting `{0}` (pass --{0} or set it in the [server] section)")]
    Missing(&'static str),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    network: NetworkFileConfig,
    ui: UiFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    api_url: Option<String>,
    ws_url: Option<String>,
    token: Option<String>,
    board_id: Option<String>,
}

/// `[network]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct NetworkFileConfig {
    request_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    channel_capacity: Option<usize>,
    reconnect_attempts: Option<u32>,
    reconnect_base_delay_ms: Option<u64>,
    reconnect_max_delay_ms: Option<u64>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    poll_timeout_ms: Option<u64>,
    timestamp_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Server --
    /// Base URL of the board REST API.
    pub api_url: Option<String>,
    /// WebSocket base; derived from `api_url` when unset.
    pub ws_url: Option<String>,
    /// Access token for REST and the board channel.
    pub token: Option<String>,
    /// Board to open.
    pub board_id: Option<String>,

    // -- Network --
    /// Timeout for a single REST request.
    pub request_timeout: Duration,
    /// Timeout for opening the board channel.
    pub connect_timeout: Duration,
    /// Buffer size for inbound channel frames.
    pub channel_capacity: usize,
    /// Channel reconnect behavior.
    pub reconnect: ReconnectPolicy,

    // -- UI --
    /// Poll timeout for the TUI event loop.
    pub poll_timeout: Duration,
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            ws_url: None,
            token: None,
            board_id: None,
            request_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(10),
            channel_capacity: 256,
            reconnect: ReconnectPolicy {
                attempts: DEFAULT_RECONNECT_ATTEMPTS,
                base_delay: DEFAULT_RECONNECT_BASE_DELAY,
                max_delay: DEFAULT_RECONNECT_MAX_DELAY,
            },
            poll_timeout: Duration::from_millis(50),
            timestamp_format: "%H:%M".to_string(),
        }
    }
}

/// Connection settings once every required field is known.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// REST base URL.
    pub api_url: String,
    /// Explicit WebSocket base, if configured.
    pub ws_url: Option<String>,
    /// Access token.
    pub token: String,
    /// Board to open.
    pub board_id: String,
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. Otherwise the default path is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();
        let network = &file.network;

        Self {
            api_url: cli.api_url.clone().or_else(|| file.server.api_url.clone()),
            ws_url: cli.ws_url.clone().or_else(|| file.server.ws_url.clone()),
            token: cli.token.clone().or_else(|| file.server.token.clone()),
            board_id: cli.board.clone().or_else(|| file.server.board_id.clone()),
            request_timeout: network
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            connect_timeout: network
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            channel_capacity: network
                .channel_capacity
                .unwrap_or(defaults.channel_capacity),
            reconnect: ReconnectPolicy {
                attempts: network
                    .reconnect_attempts
                    .unwrap_or(defaults.reconnect.attempts),
                base_delay: network
                    .reconnect_base_delay_ms
                    .map_or(defaults.reconnect.base_delay, Duration::from_millis),
                max_delay: network
                    .reconnect_max_delay_ms
                    .map_or(defaults.reconnect.max_delay, Duration::from_millis),
            },
            poll_timeout: file
                .ui
                .poll_timeout_ms
                .map_or(defaults.poll_timeout, Duration::from_millis),
            timestamp_format: cli
                .timestamp_format
                .clone()
                .or_else(|| file.ui.timestamp_format.clone())
                .unwrap_or(defaults.timestamp_format),
        }
    }

    /// The connection settings, if all required fields are present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] naming the first unset field.
    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        let api_url = non_empty(self.api_url.as_ref()).ok_or(ConfigError::Missing("api-url"))?;
        let token = non_empty(self.token.as_ref()).ok_or(ConfigError::Missing("token"))?;
        let board_id = non_empty(self.board_id.as_ref()).ok_or(ConfigError::Missing("board"))?;
        Ok(Endpoint {
            api_url,
            ws_url: non_empty(self.ws_url.as_ref()),
            token,
            board_id,
        })
    }

    /// Session settings for `board_id`.
    #[must_use]
    pub fn session_config(&self, board_id: &str) -> SessionConfig {
        SessionConfig::new(board_id).with_reconnect(self.reconnect)
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Terminal kanban board with live chat")]
pub struct CliArgs {
    /// Base URL of the board REST API (e.g. `http://127.0.0.1:8000`).
    #[arg(long, env = "BOARDSYNC_API_URL")]
    pub api_url: Option<String>,

    /// WebSocket base URL (default: the API URL with a ws scheme).
    #[arg(long, env = "BOARDSYNC_WS_URL")]
    pub ws_url: Option<String>,

    /// Access token.
    #[arg(long, env = "BOARDSYNC_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Board to open.
    #[arg(long, env = "BOARDSYNC_BOARD")]
    pub board: Option<String>,

    /// Path to config file (default: `~/.config/boardsync/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Timestamp display format (chrono format string).
    #[arg(long)]
    pub timestamp_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "BOARDSYNC_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/boardsync.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    let path = config_dir.join("boardsync").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
