//! Configuration Loader
//!
//! Finds `webview.toml` and applies environment overrides:
//! - `WEBVIEW_PATH` sets `library.path`
//! - `WEBVIEW_DEBUG` sets `bridge.debug` (`true`, `1` or `yes`)
//! - `WEBVIEW_CALL_TIMEOUT_MS` sets `bridge.call-timeout-ms`

use crate::settings::WebviewConfig;
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "webview.toml";

/// Configuration loader
pub struct ConfigLoader {
    file_name: String,
    use_env: bool,
}

/// Loaded configuration and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    /// Merged settings
    pub settings: WebviewConfig,

    /// Configuration file that was read, if any
    pub source: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader reading `webview.toml` and the environment
    pub fn new() -> Self {
        Self {
            file_name: CONFIG_FILE_NAME.to_string(),
            use_env: true,
        }
    }

    /// Skip environment overrides
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to the first `webview.toml`. No file at
    /// all yields the defaults.
    pub fn load_from_directory(&self, start_dir: &Path) -> ConfigResult<LoadedConfig> {
        let (source, settings) = match self.find_config_file(start_dir) {
            Some(path) => {
                let settings = WebviewConfig::load_from_file(&path)?;
                (Some(path), settings)
            }
            None => (None, WebviewConfig::default()),
        };
        self.finish(settings, source)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, config_path: &Path) -> ConfigResult<LoadedConfig> {
        let settings = WebviewConfig::load_from_file(config_path)?;
        self.finish(settings, Some(config_path.to_path_buf()))
    }

    fn finish(&self, settings: WebviewConfig, source: Option<PathBuf>) -> ConfigResult<LoadedConfig> {
        let settings = if self.use_env {
            apply_env_overrides(settings)?
        } else {
            settings
        };
        settings.validate()?;
        Ok(LoadedConfig { settings, source })
    }

    fn find_config_file(&self, start_dir: &Path) -> Option<PathBuf> {
        start_dir
            .ancestors()
            .map(|dir| dir.join(&self.file_name))
            .find(|candidate| candidate.is_file())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `WEBVIEW_*` environment variables on top of `config`
pub fn apply_env_overrides(mut config: WebviewConfig) -> ConfigResult<WebviewConfig> {
    if let Some(path) = env::var_os("WEBVIEW_PATH").filter(|p| !p.is_empty()) {
        config.library.get_or_insert_with(Default::default).path = Some(PathBuf::from(path));
    }

    if let Ok(debug) = env::var("WEBVIEW_DEBUG") {
        let debug = matches!(debug.to_lowercase().as_str(), "true" | "1" | "yes");
        config.bridge.get_or_insert_with(Default::default).debug = Some(debug);
    }

    if let Ok(timeout) = env::var("WEBVIEW_CALL_TIMEOUT_MS") {
        let timeout = timeout
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue {
                field: "WEBVIEW_CALL_TIMEOUT_MS".to_string(),
                reason: format!("'{}' is not a number of milliseconds: {}", timeout, e),
            })?;
        config.bridge.get_or_insert_with(Default::default).call_timeout_ms = Some(timeout);
    }

    Ok(config)
}

impl LoadedConfig {
    /// Directory holding the configuration file
    pub fn root(&self) -> Option<&Path> {
        self.source.as_deref().and_then(Path::parent)
    }

    /// Library path, resolved against the configuration directory when relative
    pub fn library_path(&self) -> Option<PathBuf> {
        let path = self.settings.library_path()?;
        match self.root() {
            Some(root) if path.is_relative() => Some(root.join(path)),
            _ => Some(path.to_path_buf()),
        }
    }

    /// Search paths, resolved against the configuration directory when relative
    pub fn search_paths(&self) -> Vec<PathBuf> {
        self.settings
            .search_paths()
            .iter()
            .map(|path| match self.root() {
                Some(root) if path.is_relative() => root.join(path),
                _ => path.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_relative_library_path_resolves_against_config_dir() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &config_path,
            "[library]\npath = \"build/webview-x64.so\"\nsearch-paths = [\"lib\", \"/abs\"]\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .without_env()
            .load_from_file(&config_path)
            .unwrap();
        assert_eq!(
            config.library_path(),
            Some(temp_dir.path().join("build/webview-x64.so"))
        );
        assert_eq!(
            config.search_paths(),
            vec![temp_dir.path().join("lib"), PathBuf::from("/abs")]
        );
    }

    #[test]
    #[serial]
    fn test_env_override_debug() {
        env::set_var("WEBVIEW_DEBUG", "yes");
        let config = apply_env_overrides(WebviewConfig::default()).unwrap();
        env::remove_var("WEBVIEW_DEBUG");
        assert!(config.debug());
    }
}
