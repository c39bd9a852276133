//! Config path resolution
//!
//! Handles resolving the dispatcher config file location.

use std::path::PathBuf;

use super::{ConfigError, ConfigResult};

/// Environment variable overriding the config file path
pub const CONFIG_PATH_ENV: &str = "TICKDISPATCH_CONFIG";

/// Config file name inside the configs directory
pub const CONFIG_FILE_NAME: &str = "tickdispatch.toml";

/// Returns the directory containing the host executable.
pub fn base_dir() -> ConfigResult<PathBuf> {
    let exe = std::env::current_exe().map_err(ConfigError::IoError)?;

    exe.parent()
        .map(PathBuf::from)
        .ok_or(ConfigError::NoConfigDirectory)
}

/// Returns the configs directory.
///
/// Path: `<exe dir>/configs/`
pub fn configs_dir() -> ConfigResult<PathBuf> {
    Ok(base_dir()?.join("configs"))
}

/// Returns the dispatcher config path.
///
/// Uses `TICKDISPATCH_CONFIG` when set, else `<exe dir>/configs/tickdispatch.toml`.
pub fn config_path() -> ConfigResult<PathBuf> {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(configs_dir()?.join(CONFIG_FILE_NAME)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_support::serial;

    #[test]
    fn test_config_path_env_override_and_default() {
        let _guard = serial();
        let previous = std::env::var_os(CONFIG_PATH_ENV);

        let custom = std::env::temp_dir().join("custom-dispatch.toml");
        std::env::set_var(CONFIG_PATH_ENV, &custom);
        assert_eq!(config_path().unwrap(), custom);

        // An empty override falls back to the executable-relative default
        std::env::set_var(CONFIG_PATH_ENV, "");
        let expected = configs_dir().unwrap().join(CONFIG_FILE_NAME);
        assert_eq!(config_path().unwrap(), expected);

        std::env::remove_var(CONFIG_PATH_ENV);
        let path = config_path().unwrap();
        assert_eq!(path, expected);
        assert!(path.ends_with("configs/tickdispatch.toml"));
        assert_eq!(path.parent().unwrap().parent().unwrap(), base_dir().unwrap());

        if let Some(value) = previous {
            std::env::set_var(CONFIG_PATH_ENV, value);
        }
    }

    #[test]
    fn test_configs_dir_next_to_executable() {
        let dir = configs_dir().unwrap();
        assert!(dir.ends_with("configs"));
    }
}
