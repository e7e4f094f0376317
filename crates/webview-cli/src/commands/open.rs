//! Open command - show a webview window until it is closed

use anyhow::{Context, Result};
use std::rc::Rc;
use tokio::sync::Notify;
use webview_bridge::{
    runtime, BridgeOptions, InstanceRegistry, LibraryResolver, Script, Size, SizeHint, WebView,
    WebviewLibrary,
};
use webview_config::{LoadedConfig, WindowHint};

/// Options of `webview open` beyond the configuration
#[derive(Debug, Clone, Default)]
pub struct OpenArgs {
    pub eval: Option<String>,
    pub exit: bool,
}

pub fn run(config: LoadedConfig, args: OpenArgs) -> Result<()> {
    let library = WebviewLibrary::open(&resolver(&config))
        .context("Failed to load the webview library (set WEBVIEW_PATH or --library)")?;

    runtime::block_on(show(library, config, args))
        .context("Failed to start the async runtime")?
}

fn resolver(config: &LoadedConfig) -> LibraryResolver {
    let mut resolver = LibraryResolver::new();
    for path in config.search_paths().into_iter().rev() {
        resolver.add_search_path(path);
    }
    match config.library_path() {
        Some(path) => resolver.with_override(path),
        None => resolver,
    }
}

fn size_hint(hint: WindowHint) -> SizeHint {
    match hint {
        WindowHint::None => SizeHint::None,
        WindowHint::Min => SizeHint::Min,
        WindowHint::Max => SizeHint::Max,
        WindowHint::Fixed => SizeHint::Fixed,
    }
}

async fn show(library: WebviewLibrary, config: LoadedConfig, args: OpenArgs) -> Result<()> {
    let settings = &config.settings;
    let options = BridgeOptions::default()
        .with_debug(settings.debug())
        .with_call_timeout(settings.call_timeout())
        .with_eval_timeout(settings.eval_timeout());

    let registry = InstanceRegistry::new();
    let closed = Rc::new(Notify::new());
    let signal = Rc::clone(&closed);
    registry.on_all_closed(move || signal.notify_one());

    let webview = WebView::with_options(library, &registry, options);
    webview.create()?;
    tracing::info!(instance = %webview.id(), "window opened");

    let (width, height, hint) = settings.size();
    webview.set_title(settings.title())?;
    webview.set_size(Size::new(width, height, size_hint(hint)))?;
    if let Some(url) = settings.url() {
        webview.set_url(url)?;
    } else if let Some(html) = settings.html() {
        webview.set_html(html)?;
    }

    if let Some(script) = args.eval {
        let outcome = webview.evaluate(Script::source(script))?.await;
        match outcome {
            Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            Err(e) => eprintln!("evaluation failed: {}", e),
        }
        if args.exit {
            webview.destroy();
        }
    }

    if webview.is_created() {
        closed.notified().await;
    }
    tracing::info!("window closed");
    Ok(())
}
