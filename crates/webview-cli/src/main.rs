use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

mod commands;

/// Open and script native webview windows.
///
/// Loads the C `webview` library, opens a window configured from
/// webview.toml and command-line flags, and runs it until it is closed.
///
/// EXAMPLES:
///     webview open --url https://example.com       Open a page
///     webview open --html '<h1>hi</h1>' --eval 'return document.title'
///     webview check-config                         Print the merged configuration
///
/// ENVIRONMENT VARIABLES:
///     WEBVIEW_PATH              Path of the webview library
///     WEBVIEW_DEBUG             Set to '1' to enable developer tools
///     WEBVIEW_CALL_TIMEOUT_MS   Timeout of page-to-host calls
///     RUST_LOG                  Log filter (e.g. 'webview_bridge=debug')
#[derive(Parser)]
#[command(name = "webview")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Configuration source shared by all commands
#[derive(clap::Args, Debug, Clone)]
struct ConfigArgs {
    /// Path to a webview.toml (default: search from the current directory)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
    /// Ignore WEBVIEW_* environment variables
    #[arg(long)]
    no_env: bool,
}

/// Window settings that override the configuration file
#[derive(clap::Args, Debug, Clone, Default)]
struct WindowArgs {
    /// Path of the webview library
    #[arg(long, short = 'l')]
    library: Option<PathBuf>,
    /// Window title
    #[arg(long, short = 't')]
    title: Option<String>,
    /// Window width in pixels
    #[arg(long)]
    width: Option<i32>,
    /// Window height in pixels
    #[arg(long)]
    height: Option<i32>,
    /// Page to navigate to
    #[arg(long, short = 'u', conflicts_with = "html")]
    url: Option<String>,
    /// Inline HTML content
    #[arg(long)]
    html: Option<String>,
    /// Enable developer tools
    #[arg(long, short = 'd')]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a webview window and run it until it is closed
    ///
    /// EXAMPLES:
    ///     webview open --url https://example.com
    ///     webview open --html '<p id=x>hi</p>' --eval 'return document.getElementById("x").textContent'
    ///     webview open --library ./build/webview-x64.so --debug
    #[command(visible_alias = "o")]
    Open {
        #[command(flatten)]
        config: ConfigArgs,
        #[command(flatten)]
        window: WindowArgs,
        /// Script to evaluate once the page is set; its result is printed as JSON
        #[arg(long, short = 'e')]
        eval: Option<String>,
        /// Close the window after --eval completes
        #[arg(long, requires = "eval")]
        exit: bool,
    },

    /// Print the merged configuration as TOML
    ///
    /// Shows the result of webview.toml, environment variables and flags
    /// combined, without loading the native library.
    ///
    /// EXAMPLES:
    ///     webview check-config
    ///     webview check-config --config ./app/webview.toml --title Demo
    CheckConfig {
        #[command(flatten)]
        config: ConfigArgs,
        #[command(flatten)]
        window: WindowArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Open {
            config,
            window,
            eval,
            exit,
        } => {
            let settings = commands::load_settings(&config, &window)?;
            let args = commands::open::OpenArgs { eval, exit };
            commands::open::run(settings, args)?;
        }
        Commands::CheckConfig { config, window } => {
            let settings = commands::load_settings(&config, &window)?;
            commands::check_config::run(&settings)?;
        }
    }

    Ok(())
}
