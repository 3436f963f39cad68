//! Project manager configuration.
//!
//! Holds the conventions the discovery engine looks for on disk (config
//! directory and filenames, the manifest field that declares a project, the
//! directories that may never become projects) plus the locations of the two
//! built-in projects.
//!
//! Configuration is read from a TOML file and then overridden from the
//! environment:
//!
//! ```toml
//! config_directory = ".config"
//! config_filenames = ["keystone.json", "keystone.rjson"]
//! package_json_field = "keystone"
//! log_level = "debug"
//! ```

use crate::error::{KeystoneError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// Environment variable names
pub const ENV_LOG_LEVEL: &str = "KEYSTONE_LOG_LEVEL";
pub const ENV_VENDOR_PATH: &str = "KEYSTONE_VENDOR_PATH";
pub const ENV_CONFIG_DIRECTORY: &str = "KEYSTONE_CONFIG_DIRECTORY";

/// Name of the built-in project holding virtual modules.
pub const VIRTUAL_MODULES_PROJECT_NAME: &str = "keystone-virtual-modules";

/// Name of the built-in project holding files fetched from remote URLs.
pub const VENDOR_PROJECT_NAME: &str = "keystone-internal-remote";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the project manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Sub-directory a dedicated project config must live in
    pub config_directory: String,

    /// Accepted dedicated config filenames
    pub config_filenames: Vec<String>,

    /// Filenames that look like a misspelled config
    pub warn_filenames: Vec<String>,

    /// Manifest field that declares its directory a project
    pub package_json_field: String,

    /// Package manifest filename checked during discovery
    pub package_manifest_filename: String,

    /// Directories that may never be a project root
    pub sensitive_directories: Vec<PathBuf>,

    /// Root of the built-in project for remote files
    pub vendor_path: PathBuf,

    /// Root of the built-in project for virtual modules
    pub virtual_modules_path: PathBuf,

    /// Log level: trace, debug, info, warn, error
    pub log_level: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);

        Self {
            config_directory: ".config".to_string(),
            config_filenames: vec!["keystone.json".to_string(), "keystone.rjson".to_string()],
            warn_filenames: vec![
                "keystone.son".to_string(),
                "keystonerc".to_string(),
                "keystone.config.json".to_string(),
                ".keystonerc".to_string(),
                ".keystonerc.json".to_string(),
                ".keystone.json".to_string(),
            ],
            package_json_field: "keystone".to_string(),
            package_manifest_filename: "package.json".to_string(),
            sensitive_directories: dirs::home_dir().into_iter().collect(),
            vendor_path: cache_dir.join("keystone").join("remote"),
            virtual_modules_path: std::env::temp_dir().join("keystone-virtual-modules"),
            log_level: "info".to_string(),
        }
    }
}

impl ManagerConfig {
    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or is invalid
    pub async fn load_from_path(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| KeystoneError::config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml(&content)?;
        config.merge_env_vars();
        config.validate()?;

        info!("Configuration loaded successfully from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from a TOML string, filling gaps with defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| KeystoneError::config(format!("Failed to parse config file: {}", e)))
    }

    /// Merge environment variable overrides into the configuration
    pub fn merge_env_vars(&mut self) {
        if let Ok(log_level) = std::env::var(ENV_LOG_LEVEL) {
            debug!("Overriding log_level from environment: {}", log_level);
            self.log_level = log_level;
        }

        if let Ok(vendor_path) = std::env::var(ENV_VENDOR_PATH) {
            debug!("Overriding vendor_path from environment: {}", vendor_path);
            self.vendor_path = PathBuf::from(vendor_path);
        }

        if let Ok(config_directory) = std::env::var(ENV_CONFIG_DIRECTORY) {
            debug!(
                "Overriding config_directory from environment: {}",
                config_directory
            );
            self.config_directory = config_directory;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(KeystoneError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.log_level,
                VALID_LOG_LEVELS.join(", ")
            )));
        }

        if self.config_filenames.is_empty() {
            return Err(KeystoneError::config(
                "At least one project config filename is required",
            ));
        }

        if self.config_directory.is_empty() || self.config_directory.contains('/') {
            return Err(KeystoneError::config(format!(
                "Invalid config directory '{}'",
                self.config_directory
            )));
        }

        Ok(())
    }

    /// Whether `basename` is an accepted dedicated config filename
    pub fn is_config_filename(&self, basename: &str) -> bool {
        self.config_filenames.iter().any(|name| name == basename)
    }

    /// Whether `basename` is a known misspelling of a config filename
    pub fn is_warn_filename(&self, basename: &str) -> bool {
        self.warn_filenames.iter().any(|name| name == basename)
    }
}
