//! Configuration file support for the CLI.
//!
//! Loads and saves CLI configuration, including named connection settings,
//! from TOML files:
//!
//! ```toml
//! default_connection = "local"
//! output_format = "table"
//! page_size = 10
//! dataset = "demo.json"
//!
//! [[connections]]
//! name = "local"
//! master_address = "localhost:16000"
//! quorum_hosts = ["localhost"]
//! client_port = "2181"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use hbrowse_client::{ConnectionSetting, DEFAULT_PAGE_SIZE};

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Connection opened at startup.
    #[serde(default)]
    pub default_connection: Option<String>,

    /// Default output format.
    #[serde(default = "default_format")]
    pub output_format: String,

    /// Default page size for scans.
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Enable timing by default.
    #[serde(default)]
    pub timing: bool,

    /// History file path.
    #[serde(default)]
    pub history_file: Option<PathBuf>,

    /// Maximum history size.
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    /// JSON dataset loaded into the in-process store.
    #[serde(default)]
    pub dataset: Option<PathBuf>,

    /// Named connection settings.
    #[serde(default)]
    pub connections: Vec<ConnectionSetting>,
}

fn default_format() -> String {
    "table".to_string()
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn default_history_size() -> usize {
    1000
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_connection: None,
            output_format: default_format(),
            page_size: default_page_size(),
            timing: false,
            history_file: None,
            history_size: default_history_size(),
            dataset: None,
            connections: Vec::new(),
        }
    }
}

impl CliConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Loads the default configuration file.
    ///
    /// Looks in the following locations:
    /// 1. ~/.config/hbrowse/config.toml
    /// 2. ~/.hbrowse/config.toml
    /// 3. Returns default if not found
    pub fn load_default() -> Result<Self> {
        match Self::existing_config_path() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Returns the default configuration file path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("hbrowse").join("config.toml"))
    }

    /// Returns the first configuration file that exists.
    pub fn existing_config_path() -> Option<PathBuf> {
        let home = dirs::home_dir().map(|h| h.join(".hbrowse").join("config.toml"));
        [Self::default_config_path(), home]
            .into_iter()
            .flatten()
            .find(|path| path.exists())
    }

    /// Returns where settings are saved: the loaded file, else the default path.
    pub fn save_path() -> Option<PathBuf> {
        Self::existing_config_path().or_else(Self::default_config_path)
    }

    /// Adds a connection setting, replacing one with the same name.
    /// Returns true if a setting was replaced.
    pub fn upsert_connection(&mut self, setting: ConnectionSetting) -> bool {
        match self.connections.iter_mut().find(|c| c.name == setting.name) {
            Some(existing) => {
                *existing = setting;
                true
            }
            None => {
                self.connections.push(setting);
                false
            }
        }
    }

    /// Adds a setting to the file at `path`, creating it if missing.
    ///
    /// Only the stored file is rewritten; command-line overrides applied to
    /// a loaded configuration are not persisted.
    pub fn save_connection(path: &Path, setting: ConnectionSetting) -> Result<()> {
        let mut stored = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        stored.upsert_connection(setting);
        stored
            .save(path)
            .with_context(|| format!("cannot write config {}", path.display()))
    }

    /// Returns the setting with this name.
    pub fn connection(&self, name: &str) -> Option<&ConnectionSetting> {
        self.connections.iter().find(|c| c.name == name)
    }

    /// Returns the connection to open at startup: the configured default,
    /// else the only configured connection.
    pub fn startup_connection(&self) -> Option<&ConnectionSetting> {
        match &self.default_connection {
            Some(name) => self.connection(name),
            None if self.connections.len() == 1 => self.connections.first(),
            None => None,
        }
    }

    /// Returns a builder for configuration.
    pub fn builder() -> CliConfigBuilder {
        CliConfigBuilder::new()
    }
}

/// Builder for CLI configuration.
#[derive(Default)]
pub struct CliConfigBuilder {
    config: CliConfig,
}

impl CliConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection setting, replacing one with the same name.
    pub fn connection(mut self, setting: ConnectionSetting) -> Self {
        self.config.upsert_connection(setting);
        self
    }

    /// Sets the startup connection.
    pub fn default_connection(mut self, name: impl Into<String>) -> Self {
        self.config.default_connection = Some(name.into());
        self
    }

    /// Sets the output format.
    pub fn output_format(mut self, format: impl Into<String>) -> Self {
        self.config.output_format = format.into();
        self
    }

    /// Sets the default page size.
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Enables timing.
    pub fn timing(mut self, enabled: bool) -> Self {
        self.config.timing = enabled;
        self
    }

    /// Sets the dataset file.
    pub fn dataset(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.dataset = Some(path.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CliConfig {
        self.config
    }
}
