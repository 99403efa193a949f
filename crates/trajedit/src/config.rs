//! Layered configuration: built-in defaults, an optional TOML file, then
//! `TRAJEDIT__SECTION__KEY` environment variables.

use std::env;
use std::path::{Path, PathBuf};

use ::config::{Config, Environment, File, FileFormat};
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "trajedit";

/// Effective application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Port to listen on
    pub port: u16,
    /// Largest request body accepted, in bytes
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 5001,
            max_body_bytes: 64 * 1024 * 1024, // 64 MB
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory saved trajectories are written to and listed from
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level used when no verbosity flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `path` (if it exists) and the environment.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_layered(path, environment())
    }

    fn load_layered(path: &Path, environment: Environment) -> Result<Self> {
        let defaults = Self::default();
        let built = Config::builder()
            .set_default("server.bind", defaults.server.bind)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("server.max_body_bytes", defaults.server.max_body_bytes as i64)?
            .set_default("storage.data_dir", defaults.storage.data_dir)?
            .set_default("logging.level", defaults.logging.level)?
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(environment)
            .build()
            .with_context(|| format!("loading config from {}", path.display()))?;

        built
            .try_deserialize()
            .context("deserializing configuration")
    }

    /// The storage directory with `~` and variables expanded.
    pub fn data_dir(&self) -> Result<PathBuf> {
        expand_str_path(&self.storage.data_dir)
    }
}

/// Resolve the config file location, honouring an explicit override.
///
/// Without an override the file lives in `trajedit/` under
/// `$XDG_CONFIG_HOME`, the platform config dir, or `~/.config`.
pub fn config_file_path(override_path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        let expanded = expand_path(path)?;
        return Ok(if expanded.is_dir() {
            expanded.join("config.toml")
        } else {
            expanded
        });
    }

    let mut path = env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))?;
    path.push(APP_NAME);
    path.push("config.toml");
    Ok(path)
}

pub fn expand_path(path: PathBuf) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        expand_str_path(text)
    } else {
        Ok(path)
    }
}

pub fn expand_str_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).context("expanding path")?;
    Ok(PathBuf::from(expanded.to_string()))
}

/// `TRAJEDIT__SECTION__KEY` variables, e.g. `TRAJEDIT__SERVER__PORT=8080`.
fn environment() -> Environment {
    Environment::with_prefix(&APP_NAME.to_ascii_uppercase())
        .separator("__")
        .try_parsing(true)
}
