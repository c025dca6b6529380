//! Layered configuration for the SwiftFlow server.
//!
//! Values are resolved in order, later layers winning:
//! defaults → `swiftflow.toml` (or `--config`) → `SWIFTFLOW_*` environment
//! variables → command-line flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! dev_mode = false
//!
//! [database]
//! path = ".swiftflow/swiftflow.db"
//!
//! [logging]
//! filter = "info"
//! format = "pretty"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// File read when no `--config` path is given. Optional.
pub const DEFAULT_CONFIG_FILE: &str = "swiftflow.toml";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output for terminals.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format '{}', expected pretty or json", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Permissive CORS for a locally served front-end.
    pub dev_mode: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: PathBuf,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".swiftflow/swiftflow.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `info,swiftflow=debug`.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// The complete swiftflow.toml configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub logging: LoggingSection,
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<PathBuf>,
    /// `--dev` can only switch dev mode on.
    pub dev_mode: bool,
}

impl AppConfig {
    /// Parse configuration from a TOML string.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from a file that must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load the explicit file if given, else `swiftflow.toml` in the current
    /// directory if present, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply `SWIFTFLOW_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SWIFTFLOW_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SWIFTFLOW_PORT") {
            self.server.port = port.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    key: "SWIFTFLOW_PORT".into(),
                    value: port.clone(),
                    message: e.to_string(),
                }
            })?;
        }
        if let Some(path) = lookup("SWIFTFLOW_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(dev) = lookup("SWIFTFLOW_DEV_MODE") {
            self.server.dev_mode = parse_bool(&dev).ok_or_else(|| ConfigError::InvalidValue {
                key: "SWIFTFLOW_DEV_MODE".into(),
                value: dev.clone(),
                message: "expected true or false".into(),
            })?;
        }
        if let Some(filter) = lookup("SWIFTFLOW_LOG") {
            self.logging.filter = filter;
        }
        if let Some(format) = lookup("SWIFTFLOW_LOG_FORMAT") {
            self.logging.format = format.parse().map_err(|message| ConfigError::InvalidValue {
                key: "SWIFTFLOW_LOG_FORMAT".into(),
                value: format.clone(),
                message,
            })?;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(host) = &overrides.host {
            self.server.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(path) = &overrides.db_path {
            self.database.path = path.clone();
        }
        if overrides.dev_mode {
            self.server.dev_mode = true;
        }
    }

    /// Resolve every layer. Call after `dotenvy` has populated the
    /// environment.
    pub fn resolve(path: Option<&Path>, overrides: &CliOverrides) -> Result<Self, ConfigError> {
        let mut config = Self::load_or_default(path)?;
        config.apply_env()?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "server.host".into(),
                value: self.server.host.clone(),
                message: "host must not be empty".into(),
            });
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "database.path".into(),
                value: String::new(),
                message: "database path must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
