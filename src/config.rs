//! Configuration module for Parlor.

use serde::Deserialize;
use std::path::Path;

use crate::chat::nick::{sanitize_nick, validate_format};
use crate::{ParlorError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Timezone for human-readable timestamps (e.g., "Europe/Paris", "UTC").
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_timezone() -> String {
    "Europe/Paris".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timezone: default_timezone(),
        }
    }
}

/// Chat room configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Name of the single channel.
    #[serde(default = "default_channel_name")]
    pub channel_name: String,
    /// Nickname that is granted the admin role on join.
    #[serde(default = "default_admin_nick")]
    pub admin_nick: String,
    /// Message of the day sent with the `joined` frame.
    #[serde(default = "default_motd")]
    pub motd: String,
    /// Maximum chat message length in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// Idle time in seconds after which a session is reaped.
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_secs: u64,
    /// Interval in seconds between reaper sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_channel_name() -> String {
    "Lowforehead Online Support".to_string()
}

fn default_admin_nick() -> String {
    "Lowf0rehe@d".to_string()
}

fn default_motd() -> String {
    "Welcome to the chat! Type /help for the list of commands.".to_string()
}

fn default_max_message_length() -> usize {
    500
}

fn default_inactivity_timeout() -> u64 {
    1800 // 30 minutes
}

fn default_sweep_interval() -> u64 {
    300 // 5 minutes
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            channel_name: default_channel_name(),
            admin_nick: default_admin_nick(),
            motd: default_motd(),
            max_message_length: default_max_message_length(),
            inactivity_timeout_secs: default_inactivity_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Session recording configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordingConfig {
    /// Directory where recordings are written.
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,
}

fn default_logs_dir() -> String {
    "logs".to_string()
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            logs_dir: default_logs_dir(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/parlor.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Web configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Whether to serve static files.
    #[serde(default = "default_serve_static")]
    pub serve_static: bool,
    /// Path to static files directory.
    #[serde(default = "default_static_path")]
    pub static_path: String,
    /// CORS allowed origins (empty allows any origin).
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_serve_static() -> bool {
    true
}

fn default_static_path() -> String {
    "public".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            serve_static: default_serve_static(),
            static_path: default_static_path(),
            cors_origins: vec![],
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat configuration.
    #[serde(default)]
    pub chat: ChatConfig,
    /// Recording configuration.
    #[serde(default)]
    pub recording: RecordingConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Web configuration.
    #[serde(default)]
    pub web: WebConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ParlorError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ParlorError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `PORT`: Override the listening port
    /// - `PARLOR_ADMIN_NICK`: Override the admin nickname
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid PORT"),
            }
        }

        if let Ok(nick) = std::env::var("PARLOR_ADMIN_NICK") {
            if !nick.is_empty() {
                self.chat.admin_nick = nick;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let admin_nick = &self.chat.admin_nick;
        if !validate_format(admin_nick) || sanitize_nick(admin_nick) != *admin_nick {
            return Err(ParlorError::Validation(format!(
                "admin_nick {:?} is not a valid nickname",
                self.chat.admin_nick
            )));
        }
        if self.chat.inactivity_timeout_secs == 0 {
            return Err(ParlorError::Validation(
                "inactivity_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.chat.sweep_interval_secs == 0 {
            return Err(ParlorError::Validation(
                "sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
