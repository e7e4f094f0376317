pub mod check_config;
pub mod open;

use crate::{ConfigArgs, WindowArgs};
use anyhow::{Context, Result};
use webview_config::{
    BridgeSettings, ConfigLoader, LibrarySettings, LoadedConfig, WebviewConfig, WindowSettings,
};

/// Load the configuration and apply command-line overrides on top
pub fn load_settings(config: &ConfigArgs, window: &WindowArgs) -> Result<LoadedConfig> {
    let loader = if config.no_env {
        ConfigLoader::new().without_env()
    } else {
        ConfigLoader::new()
    };

    let mut loaded = match &config.config {
        Some(path) => loader
            .load_from_file(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?,
        None => {
            let cwd = std::env::current_dir()?;
            loader
                .load_from_directory(&cwd)
                .context("Failed to load configuration")?
        }
    };

    loaded.settings.merge(&flag_overrides(window)?);
    loaded
        .settings
        .validate()
        .context("Invalid command-line options")?;
    Ok(loaded)
}

fn flag_overrides(window: &WindowArgs) -> Result<WebviewConfig> {
    let settings = WindowSettings {
        title: window.title.clone(),
        width: window.width,
        height: window.height,
        hint: None,
        url: window.url.clone(),
        html: window.html.clone(),
    };
    let mut overrides = WebviewConfig {
        window: (settings != WindowSettings::default()).then_some(settings),
        ..Default::default()
    };

    if let Some(library) = &window.library {
        overrides.library = Some(LibrarySettings {
            // Relative to the working directory, not to webview.toml
            path: Some(std::path::absolute(library)?),
            search_paths: Vec::new(),
        });
    }
    if window.debug {
        overrides.bridge = Some(BridgeSettings {
            debug: Some(true),
            ..Default::default()
        });
    }
    Ok(overrides)
}
