use std::path::{Path, PathBuf};

const APP_DIR: &str = "nhl_etl";

/// Returns the platform-specific path for the config file.
///
/// # Notes
/// - Uses platform-specific config directory (e.g., ~/.config on Linux)
/// - Falls back to current directory if config directory is unavailable
pub fn get_config_path() -> String {
    dirs::config_dir()
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join(APP_DIR)
        .join("config.toml")
        .to_string_lossy()
        .to_string()
}

/// Returns the platform-specific path for the log directory.
pub fn get_log_dir_path() -> String {
    dirs::config_dir()
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join(APP_DIR)
        .join("logs")
        .to_string_lossy()
        .to_string()
}

/// Directory holding the SQLite warehouse and local objects by default
/// (e.g., ~/.local/share/nhl_etl on Linux).
pub fn get_data_dir_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| Path::new(".").to_path_buf())
        .join(APP_DIR)
}

pub fn default_sqlite_path() -> String {
    get_data_dir_path()
        .join("warehouse.db")
        .to_string_lossy()
        .to_string()
}

pub fn default_object_dir() -> String {
    get_data_dir_path()
        .join("objects")
        .to_string_lossy()
        .to_string()
}
