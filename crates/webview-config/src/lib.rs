//! Webview Configuration
//!
//! Loads `webview.toml` for applications hosting a webview:
//! - `[library]`: where to find the native `webview` library
//! - `[window]`: initial title, size and content
//! - `[bridge]`: developer tools and call/evaluation timeouts
//!
//! # Configuration Hierarchy
//!
//! Later sources override earlier ones:
//! 1. `webview.toml` (found by walking up from the start directory)
//! 2. Environment variables (`WEBVIEW_PATH`, `WEBVIEW_DEBUG`, `WEBVIEW_CALL_TIMEOUT_MS`)
//! 3. CLI flags (applied by the caller)
//!
//! # Example
//!
//! ```no_run
//! use webview_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! println!("{}", config.settings.title());
//! ```

pub mod loader;
pub mod settings;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::{ConfigLoader, LoadedConfig, CONFIG_FILE_NAME};
pub use settings::{BridgeSettings, LibrarySettings, WebviewConfig, WindowHint, WindowSettings};
