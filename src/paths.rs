/// Platform-specific default locations
///
/// Follows the XDG Base Directory specification on Linux, the usual
/// `~/Library/Application Support` layout on macOS and `%LOCALAPPDATA%` /
/// `%APPDATA%` on Windows.
use std::path::PathBuf;

/// Directory name used under every platform base directory
pub const APP_DIR_NAME: &str = "turbochat-rag";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Base data directory for the current platform
    ///
    /// - Windows: %LOCALAPPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_DATA_HOME or ~/.local/share
    pub fn data_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            Self::env_path("LOCALAPPDATA")
        } else if cfg!(target_os = "macos") {
            Self::home_join("Library/Application Support")
        } else {
            std::env::var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| Self::home_join(".local/share"))
        }
    }

    /// Base config directory for the current platform
    ///
    /// - Windows: %APPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_CONFIG_HOME or ~/.config
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            Self::env_path("APPDATA")
        } else if cfg!(target_os = "macos") {
            Self::home_join("Library/Application Support")
        } else {
            std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| Self::home_join(".config"))
        }
    }

    /// Returns: {data_dir}/turbochat-rag
    pub fn project_data_dir() -> PathBuf {
        Self::data_dir().join(APP_DIR_NAME)
    }

    /// Returns: {config_dir}/turbochat-rag
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(APP_DIR_NAME)
    }

    /// Default root of the persisted index (collection tables + catalog)
    pub fn default_data_path() -> PathBuf {
        Self::project_data_dir().join("index")
    }

    /// Returns: {config_dir}/turbochat-rag/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }

    fn env_path(var: &str) -> PathBuf {
        std::env::var(var)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
    }

    fn home_join(suffix: &str) -> PathBuf {
        std::env::var("HOME")
            .map(|home| PathBuf::from(home).join(suffix))
            .unwrap_or_else(|_| PathBuf::from("."))
    }
}
