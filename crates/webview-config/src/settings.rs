//! Configuration file model (webview.toml)

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default window title
pub const DEFAULT_TITLE: &str = "webview";

/// Default window width and height
pub const DEFAULT_SIZE: (i32, i32) = (800, 600);

/// Default call and evaluation timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Contents of webview.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct WebviewConfig {
    /// Native library location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<LibrarySettings>,

    /// Initial window state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowSettings>,

    /// Call bridge options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<BridgeSettings>,
}

/// Native library location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LibrarySettings {
    /// Library file, skips the search when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Extra directories searched before the defaults
    #[serde(default, rename = "search-paths")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search_paths: Vec<PathBuf>,
}

/// Size constraint of the window
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindowHint {
    #[default]
    None,
    Min,
    Max,
    Fixed,
}

/// Initial window state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct WindowSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<WindowHint>,

    /// Page to navigate to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Inline HTML content, exclusive with `url`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// Call bridge options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BridgeSettings {
    /// Enable developer tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,

    /// Inbound call timeout in milliseconds
    #[serde(rename = "call-timeout-ms", skip_serializing_if = "Option::is_none")]
    pub call_timeout_ms: Option<u64>,

    /// Outbound evaluation timeout in milliseconds
    #[serde(rename = "eval-timeout-ms", skip_serializing_if = "Option::is_none")]
    pub eval_timeout_ms: Option<u64>,
}

impl WebviewConfig {
    /// Parse configuration text; `file` is only used in error messages
    pub fn parse(content: &str, file: &Path) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: file.to_path_buf(),
            error: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;
        Self::parse(&content, path)
    }

    /// Validate value ranges and exclusive fields
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(window) = &self.window {
            for (field, value) in [("window.width", window.width), ("window.height", window.height)] {
                if let Some(value) = value {
                    if value <= 0 {
                        return Err(invalid(field, format!("must be positive, got {}", value)));
                    }
                }
            }
            if window.url.is_some() && window.html.is_some() {
                return Err(invalid("window", "url and html are mutually exclusive"));
            }
        }

        if let Some(bridge) = &self.bridge {
            for (field, value) in [
                ("bridge.call-timeout-ms", bridge.call_timeout_ms),
                ("bridge.eval-timeout-ms", bridge.eval_timeout_ms),
            ] {
                if value == Some(0) {
                    return Err(invalid(field, "timeout must be at least 1 ms"));
                }
            }
        }

        if let Some(path) = self.library.as_ref().and_then(|l| l.path.as_ref()) {
            if path.as_os_str().is_empty() {
                return Err(invalid("library.path", "path cannot be empty"));
            }
        }

        Ok(())
    }

    /// Merge another config into this one, section by section
    ///
    /// Values set in `other` win; unset values keep this config's.
    pub fn merge(&mut self, other: &WebviewConfig) {
        if let Some(library) = &other.library {
            let target = self.library.get_or_insert_with(Default::default);
            if library.path.is_some() {
                target.path = library.path.clone();
            }
            if !library.search_paths.is_empty() {
                target.search_paths = library.search_paths.clone();
            }
        }

        if let Some(window) = &other.window {
            let target = self.window.get_or_insert_with(Default::default);
            merge_option(&mut target.title, &window.title);
            merge_option(&mut target.width, &window.width);
            merge_option(&mut target.height, &window.height);
            merge_option(&mut target.hint, &window.hint);
            if window.url.is_some() || window.html.is_some() {
                target.url = window.url.clone();
                target.html = window.html.clone();
            }
        }

        if let Some(bridge) = &other.bridge {
            let target = self.bridge.get_or_insert_with(Default::default);
            merge_option(&mut target.debug, &bridge.debug);
            merge_option(&mut target.call_timeout_ms, &bridge.call_timeout_ms);
            merge_option(&mut target.eval_timeout_ms, &bridge.eval_timeout_ms);
        }
    }

    /// Render as TOML
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn library_path(&self) -> Option<&Path> {
        self.library.as_ref().and_then(|l| l.path.as_deref())
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        self.library
            .as_ref()
            .map(|l| l.search_paths.as_slice())
            .unwrap_or(&[])
    }

    pub fn title(&self) -> &str {
        self.window
            .as_ref()
            .and_then(|w| w.title.as_deref())
            .unwrap_or(DEFAULT_TITLE)
    }

    /// Window width, height and hint with defaults applied
    pub fn size(&self) -> (i32, i32, WindowHint) {
        let window = self.window.as_ref();
        (
            window.and_then(|w| w.width).unwrap_or(DEFAULT_SIZE.0),
            window.and_then(|w| w.height).unwrap_or(DEFAULT_SIZE.1),
            window.and_then(|w| w.hint).unwrap_or_default(),
        )
    }

    pub fn url(&self) -> Option<&str> {
        self.window.as_ref().and_then(|w| w.url.as_deref())
    }

    pub fn html(&self) -> Option<&str> {
        self.window.as_ref().and_then(|w| w.html.as_deref())
    }

    pub fn debug(&self) -> bool {
        self.bridge.as_ref().and_then(|b| b.debug).unwrap_or(false)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(
            self.bridge
                .as_ref()
                .and_then(|b| b.call_timeout_ms)
                .unwrap_or(DEFAULT_TIMEOUT_MS),
        )
    }

    pub fn eval_timeout(&self) -> Duration {
        Duration::from_millis(
            self.bridge
                .as_ref()
                .and_then(|b| b.eval_timeout_ms)
                .unwrap_or(DEFAULT_TIMEOUT_MS),
        )
    }
}

fn merge_option<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        target.clone_from(value);
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[library]
path = "/opt/webview/webview-x64.so"
search-paths = ["build"]

[window]
title = "Demo"
width = 1024
height = 768
hint = "fixed"
url = "https://example.com"

[bridge]
debug = true
call-timeout-ms = 5000
"#;
        let config = WebviewConfig::parse(toml, Path::new("webview.toml")).unwrap();
        assert_eq!(config.title(), "Demo");
        assert_eq!(config.size(), (1024, 768, WindowHint::Fixed));
        assert_eq!(config.url(), Some("https://example.com"));
        assert!(config.debug());
        assert_eq!(config.call_timeout(), Duration::from_millis(5000));
        assert_eq!(config.eval_timeout(), Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert_eq!(config.search_paths(), &[PathBuf::from("build")]);
    }

    #[test]
    fn test_defaults() {
        let config = WebviewConfig::default();
        assert_eq!(config.title(), DEFAULT_TITLE);
        assert_eq!(config.size(), (800, 600, WindowHint::None));
        assert!(!config.debug());
        assert_eq!(config.library_path(), None);
    }

    #[test]
    fn test_url_and_html_are_exclusive() {
        let config = WebviewConfig {
            window: Some(WindowSettings {
                url: Some("https://example.com".to_string()),
                html: Some("<p>hi</p>".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "window"
        ));
    }

    #[test]
    fn test_merge_keeps_unset_values() {
        let mut base = WebviewConfig::parse(
            "[window]\ntitle = \"Base\"\nwidth = 640\n",
            Path::new("base.toml"),
        )
        .unwrap();
        let other =
            WebviewConfig::parse("[window]\nwidth = 320\n", Path::new("other.toml")).unwrap();

        base.merge(&other);
        assert_eq!(base.title(), "Base");
        assert_eq!(base.size().0, 320);
    }

    #[test]
    fn test_merge_replaces_content_source() {
        let mut base =
            WebviewConfig::parse("[window]\nurl = \"https://a\"\n", Path::new("a.toml")).unwrap();
        let other =
            WebviewConfig::parse("[window]\nhtml = \"<b>b</b>\"\n", Path::new("b.toml")).unwrap();

        base.merge(&other);
        assert_eq!(base.url(), None);
        assert_eq!(base.html(), Some("<b>b</b>"));
        assert!(base.validate().is_ok());
    }
}
