//! Configuration parser for loading `podrun.yaml`.
//!
//! Handles YAML loading, `.env` files and `PODRUN_*` environment overrides,
//! in that order of precedence (later wins).

use crate::error::{ConfigError, PodrunError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::spec::RunConfig;

/// Configuration parser for loading run configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<RunConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(PodrunError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            PodrunError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        let mut config = self.parse_yaml(&content, Some(path))?;
        self.resolve_store_dir(&mut config);
        Ok(config)
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<RunConfig> {
        debug!("Parsing YAML configuration");

        // An empty document is a valid "all defaults" config
        if content.trim().is_empty() {
            return Ok(RunConfig::default());
        }

        let config: RunConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            PodrunError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed configuration for template: {}", config.template.name);
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// A missing file is not an error here: defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_with_env(&self, path: Option<&Path>) -> Result<RunConfig> {
        let mut config = match path {
            Some(path) => self.load_file(path)?,
            None => {
                debug!("No configuration file, using defaults");
                RunConfig::default()
            }
        };

        Self::apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Makes a relative store directory relative to the config file location.
    fn resolve_store_dir(&self, config: &mut RunConfig) {
        if let Some(base) = &self.base_path {
            if config.store.dir.is_relative() {
                config.store.dir = base.join(&config.store.dir);
            }
        }
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(config: &mut RunConfig) {
        if let Ok(name) = std::env::var("PODRUN_TEMPLATE_NAME") {
            debug!("Overriding template.name from environment");
            config.template.name = name;
        }

        if let Ok(image) = std::env::var("PODRUN_TEMPLATE_IMAGE") {
            debug!("Overriding template.image from environment");
            config.template.image = image;
        }

        if let Ok(value) = std::env::var("PODRUN_MIN_MEMORY_GB") {
            match value.parse() {
                Ok(gb) => {
                    debug!("Overriding pod.min_memory_gb from environment");
                    config.pod.min_memory_gb = gb;
                }
                Err(_) => warn!("Ignoring invalid PODRUN_MIN_MEMORY_GB: {value}"),
            }
        }

        if let Ok(value) = std::env::var("PODRUN_READY_TIMEOUT_SECS") {
            match value.parse() {
                Ok(secs) => {
                    debug!("Overriding lifecycle.ready_timeout_secs from environment");
                    config.lifecycle.ready_timeout_secs = Some(secs);
                }
                Err(_) => warn!("Ignoring invalid PODRUN_READY_TIMEOUT_SECS: {value}"),
            }
        }

        if let Ok(dir) = std::env::var("PODRUN_STORE_DIR") {
            debug!("Overriding store.dir from environment");
            config.store.dir = PathBuf::from(dir);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                PodrunError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["podrun.yaml", "podrun.yml"];

/// Finds the configuration file in the given directory or its parents.
///
/// Returns `None` when no file exists; callers fall back to defaults.
#[must_use]
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start_dir.as_ref().to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Some(config_path);
            }
        }

        if !current.pop() {
            return None;
        }
    }
}
