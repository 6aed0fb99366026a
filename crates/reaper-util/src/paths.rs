//! Default paths for reaper components
//!
//! The configuration file lives under the user's XDG config directory unless
//! overridden:
//! - `$REAPER_CONFIG` if set
//! - `$XDG_CONFIG_HOME/reaper/config.toml`
//! - `~/.config/reaper/config.toml`

use std::path::PathBuf;

/// Environment variable for overriding the configuration file path
pub const REAPER_CONFIG_ENV: &str = "REAPER_CONFIG";

/// Configuration filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Application subdirectory name
const APP_DIR: &str = "reaper";

/// Get the default configuration file path.
///
/// Order of precedence:
/// 1. `$REAPER_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/reaper/config.toml` (if XDG_CONFIG_HOME is set)
/// 3. `~/.config/reaper/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(REAPER_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    config_path_without_env()
}

/// Get the config path without checking the REAPER_CONFIG env var.
fn config_path_without_env() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    // Last resort
    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}
