//! Configuration loading utilities.

use super::types::ServerConfig;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "REPUTATION_CONFIG";

/// Load configuration from various sources.
///
/// Later sources override earlier ones: built-in defaults, then the config
/// file, then `REPUTATION__SECTION__KEY` environment variables.
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: "REPUTATION".to_string(),
        }
    }

    /// Set config file path.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Set environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration.
    pub fn load(&self) -> Result<ServerConfig> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::File::from_str(
            include_str!("defaults.toml"),
            config::FileFormat::Toml,
        ));

        if let Some(path) = &self.config_path {
            if !Path::new(path).exists() {
                bail!("Config file {} does not exist", path.display());
            }
            info!(path = %path.display(), "Loading config file");
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Load configuration, taking the file path from `path` or, failing that,
/// from `REPUTATION_CONFIG`.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    let config_path = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from));

    let mut loader = ConfigLoader::new();
    if let Some(path) = config_path {
        loader = loader.with_config_path(path);
    }

    loader.load()
}
