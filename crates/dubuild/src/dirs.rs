//! Well-known locations

use std::path::PathBuf;

use etcetera::{BaseStrategy, choose_base_strategy};

/// File name of project and user configuration files
pub const CONFIG_FILE_NAME: &str = "dubuild.toml";

/// Overrides the user configuration directory
pub const CONFIG_DIR_ENV: &str = "DUBUILD_CONFIG_DIR";

/// Directory holding the user-level configuration file
pub fn user_config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }
    choose_base_strategy()
        .ok()
        .map(|strategy| strategy.config_dir().join("dubuild"))
}

/// Path of the user-level configuration file, whether or not it exists
pub fn user_config_file() -> Option<PathBuf> {
    user_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}
