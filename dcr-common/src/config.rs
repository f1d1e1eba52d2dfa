//! Configuration loading
//!
//! Settings resolve in priority order:
//! 1. Command-line arguments (and their environment fallbacks)
//! 2. TOML configuration file
//! 3. Compiled defaults
//!
//! The config file itself is located by `--config`, then `DCR_CONFIG`, then
//! `<config_dir>/dcr/config.toml`. A missing file is not an error; the
//! service starts on defaults with a warning.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::session::SessionOptions;
use crate::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "DCR_CONFIG";

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

/// Contents of the TOML config file; every key is optional
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    pub bind_address: String,
    pub port: u16,
    /// Clusters per page (must be at least 1)
    pub page_size: usize,
    /// Base directory for relative image paths (default: working directory)
    pub image_root: Option<PathBuf>,
    pub symmetric_unverify: bool,
    /// Select the next cluster after a verify
    pub auto_advance: bool,
    /// Open the review page in the default browser on startup
    pub open_browser: bool,
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            page_size: DEFAULT_PAGE_SIZE,
            image_root: None,
            symmetric_unverify: false,
            auto_advance: true,
            open_browser: false,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command-line overrides; `None` defers to the file or defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub page_size: Option<usize>,
    pub image_root: Option<PathBuf>,
    pub log_level: Option<String>,
    pub open_browser: Option<bool>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewConfig {
    pub bind_address: String,
    pub port: u16,
    pub page_size: usize,
    pub image_root: PathBuf,
    pub symmetric_unverify: bool,
    pub auto_advance: bool,
    pub open_browser: bool,
    pub log_level: String,
    /// File the settings came from, if one was found
    pub source: Option<PathBuf>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self::merge(TomlConfig::default(), ConfigOverrides::default(), None)
    }
}

impl ReviewConfig {
    /// Locate, read and merge configuration
    pub fn load(cli_config: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let (toml_config, source) = match resolve_config_path(cli_config) {
            Some(path) if path.exists() => {
                let config = load_toml_config(&path)?;
                info!("Loaded configuration from {}", path.display());
                (config, Some(path))
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                (TomlConfig::default(), None)
            }
            None => {
                warn!("No config directory available, using defaults");
                (TomlConfig::default(), None)
            }
        };

        Self::from_toml(toml_config, overrides, source)
    }

    /// Merge file settings with overrides and validate the result
    pub fn from_toml(
        toml_config: TomlConfig,
        overrides: ConfigOverrides,
        source: Option<PathBuf>,
    ) -> Result<Self> {
        let config = Self::merge(toml_config, overrides, source);
        config.validate()?;
        Ok(config)
    }

    fn merge(toml_config: TomlConfig, overrides: ConfigOverrides, source: Option<PathBuf>) -> Self {
        let image_root = overrides
            .image_root
            .or(toml_config.image_root)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            bind_address: overrides.bind_address.unwrap_or(toml_config.bind_address),
            port: overrides.port.unwrap_or(toml_config.port),
            page_size: overrides.page_size.unwrap_or(toml_config.page_size),
            image_root,
            symmetric_unverify: toml_config.symmetric_unverify,
            auto_advance: toml_config.auto_advance,
            open_browser: overrides.open_browser.unwrap_or(toml_config.open_browser),
            log_level: overrides.log_level.unwrap_or(toml_config.logging.level),
            source,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be at least 1".to_string()));
        }
        if self.bind_address.trim().is_empty() {
            return Err(Error::Config("bind_address must not be empty".to_string()));
        }
        Ok(())
    }

    /// `host:port` string for binding the listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            page_size: self.page_size,
            symmetric_unverify: self.symmetric_unverify,
        }
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// `<config_dir>/dcr/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("dcr").join("config.toml"))
}

/// Config file location: CLI argument, then `DCR_CONFIG`, then the
/// platform default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}
