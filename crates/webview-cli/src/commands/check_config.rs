//! Check-config command - print the merged configuration

use anyhow::Result;
use webview_config::LoadedConfig;

pub fn run(config: &LoadedConfig) -> Result<()> {
    match &config.source {
        Some(path) => println!("# loaded from {}", path.display()),
        None => println!("# no webview.toml found, using defaults"),
    }
    print!("{}", config.settings.to_toml()?);
    Ok(())
}
