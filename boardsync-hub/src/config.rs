//! Configuration system for the `BoardSync` hub.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/boardsync-hub/config.toml`)
//! 4. Compiled defaults
//!
//! The same file carries the seed data (`[[users]]`, `[[boards]]` and
//! `[[tasks]]` tables). A file without any seed tables runs the built-in
//! demo board.

use std::path::PathBuf;

use boardsync_proto::task::{TaskId, TaskPriority, TaskStatus};

/// Errors that can occur when loading hub configuration.
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
}

// ---------------------------------------------------------------------------
// Seed data
// ---------------------------------------------------------------------------

/// Role of a seeded user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sees and edits every board.
    Admin,
    /// Member who may move any task on their boards.
    TeamLead,
    /// Member who may only move tasks assigned to them.
    #[default]
    TeamMember,
}

/// A user the hub accepts tokens for.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct SeedUser {
    /// User id.
    pub id: String,
    /// Display name.
    pub username: String,
    /// Access token, accepted as bearer credential and `?token=` parameter.
    pub token: String,
    /// Role, defaulting to team member.
    #[serde(default)]
    pub role: Role,
}

/// A board and its members.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct SeedBoard {
    /// Board id.
    pub id: String,
    /// Display name.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    /// User ids allowed on the board.
    #[serde(default)]
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// A task placed on a seeded board.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct SeedTask {
    /// Task id.
    pub id: TaskId,
    /// Title.
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Owning board.
    pub board_id: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Initial column.
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub created_by: String,
}

/// Everything the hub serves, as loaded at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct Seed {
    pub users: Vec<SeedUser>,
    pub boards: Vec<SeedBoard>,
    pub tasks: Vec<SeedTask>,
}

impl Seed {
    /// Whether the seed holds no data at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.boards.is_empty() && self.tasks.is_empty()
    }

    /// A small demo board with three users and one task per column.
    #[must_use]
    pub fn demo() -> Self {
        let user = |id: &str, username: &str, role| SeedUser {
            id: id.to_string(),
            username: username.to_string(),
            token: format!("{username}-token"),
            role,
        };
        let task = |id: &str, title: &str, assigned_to: &str, status, priority| SeedTask {
            id: TaskId::new(id),
            title: title.to_string(),
            description: None,
            board_id: "b1".to_string(),
            assigned_to: Some(assigned_to.to_string()),
            status,
            priority,
            created_by: "u1".to_string(),
        };

        Self {
            users: vec![
                user("u1", "alice", Role::TeamLead),
                user("u2", "bob", Role::TeamMember),
                user("u3", "carol", Role::Admin),
            ],
            boards: vec![SeedBoard {
                id: "b1".to_string(),
                name: "Demo Board".to_string(),
                description: Some("Sample board served by boardsync-hub".to_string()),
                team_id: Some("team1".to_string()),
                member_ids: vec!["u1".to_string(), "u2".to_string()],
                created_by: Some("u1".to_string()),
            }],
            tasks: vec![
                task("t1", "Sketch the board layout", "u1", TaskStatus::Todo, TaskPriority::Medium),
                task("t2", "Wire the chat panel", "u2", TaskStatus::InProgress, TaskPriority::High),
                task("t3", "Review reconnect backoff", "u1", TaskStatus::Review, TaskPriority::Low),
                task("t4", "Set up the repository", "u2", TaskStatus::Completed, TaskPriority::Urgent),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure for the hub.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct HubConfigFile {
    server: ServerFileConfig,
    #[serde(flatten)]
    seed: Seed,
}

/// `[server]` section of the hub config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the hub.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "BoardSync development hub")]
pub struct HubCliArgs {
    /// Address to bind the hub to.
    #[arg(short, long, env = "BOARDSYNC_HUB_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/boardsync-hub/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "BOARDSYNC_HUB_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Address to bind the server to (e.g., `127.0.0.1:8000`).
    pub bind_addr: String,
    /// Log level filter string.
    pub log_level: String,
    /// Data served by the hub.
    pub seed: Seed,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            log_level: "info".to_string(),
            seed: Seed::demo(),
        }
    }
}

impl HubConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and missing file
    /// is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &HubCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &HubCliArgs, file: HubConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or(file.server.bind_addr)
                .unwrap_or(defaults.bind_addr),
            log_level: cli.log_level.clone(),
            seed: if file.seed.is_empty() {
                defaults.seed
            } else {
                file.seed
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file for the hub.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<HubConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(HubConfigFile::default());
        };
        config_dir.join("boardsync-hub").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HubConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
