//! Configuration for the dispatcher
//!
//! Supports:
//! - Type-safe config via serde
//! - TOML file format
//! - Auto-generation of a default config file
//! - Manual reload capability
//!
//! # Example
//!
//! ```toml
//! version = 1
//! debug = false
//! drain_strategy = "swap"      # or "hold_lock"
//! fault_policy = "isolate"     # or "propagate"
//! ownerless = false
//! slow_tick_warn_us = 1000
//! ```

mod loader;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::tasks::{DrainStrategy, FaultPolicy};

pub use loader::{base_dir, config_path, configs_dir, CONFIG_FILE_NAME, CONFIG_PATH_ENV};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Could not determine config directory from executable location
    #[error("Config directory not available - could not resolve executable path")]
    NoConfigDirectory,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    /// Lock handling while draining
    pub drain_strategy: DrainStrategy,

    /// Handling of panicking fire-and-forget work
    pub fault_policy: FaultPolicy,

    /// Start edit-mode sequences independently of the dispatcher
    pub ownerless: bool,

    /// Warn when a host tick takes longer than this (microseconds)
    pub slow_tick_warn_us: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            drain_strategy: DrainStrategy::default(),
            fault_policy: FaultPolicy::default(),
            ownerless: false,
            slow_tick_warn_us: 1_000,
        }
    }
}

impl DispatcherConfig {
    /// Load from the resolved [`config_path`], creating a default if missing.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(config_path()?)
    }

    /// Load config from file, creating default if missing.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config = Self::from_toml_str(&content)?;
            tracing::debug!("Loaded dispatcher config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save_to(path)?;
            tracing::info!("Created default dispatcher config at {:?}", path);
            Ok(default)
        }
    }

    /// Parse config from TOML text.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save config to file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved dispatcher config to {:?}", path);
        Ok(())
    }

    /// Reload config from file.
    pub fn reload_from(&mut self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        *self = Self::from_toml_str(&content)?;
        tracing::debug!("Reloaded dispatcher config from {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("tickdispatch-test-{}-{}", std::process::id(), name))
            .join(CONFIG_FILE_NAME)
    }

    #[test]
    fn test_config_default() {
        let config = DispatcherConfig::default();
        assert_eq!(config.version, 1);
        assert!(!config.debug);
        assert_eq!(config.drain_strategy, DrainStrategy::Swap);
        assert_eq!(config.fault_policy, FaultPolicy::Isolate);
        assert!(!config.ownerless);
    }

    #[test]
    fn test_config_serialize() {
        let config = DispatcherConfig {
            drain_strategy: DrainStrategy::HoldLock,
            ownerless: true,
            ..DispatcherConfig::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("drain_strategy = \"hold_lock\""));
        assert!(toml_str.contains("ownerless = true"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = DispatcherConfig::from_toml_str("fault_policy = \"propagate\"").unwrap();
        assert_eq!(config.fault_policy, FaultPolicy::Propagate);
        assert_eq!(config.drain_strategy, DrainStrategy::Swap);
        assert_eq!(config.slow_tick_warn_us, 1_000);
    }

    #[test]
    fn test_invalid_strategy_rejected() {
        let err = DispatcherConfig::from_toml_str("drain_strategy = \"sideways\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_creates_default_then_reloads() {
        let path = scratch_path("load");
        let _ = std::fs::remove_file(&path);

        let loaded = DispatcherConfig::load_from(&path).unwrap();
        assert_eq!(loaded, DispatcherConfig::default());
        assert!(path.exists());

        std::fs::write(&path, "debug = true\nownerless = true\n").unwrap();
        let mut config = loaded;
        config.reload_from(&path).unwrap();
        assert!(config.debug);
        assert!(config.ownerless);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
