//! bookpub - on-demand builder and server for git-hosted books
//!
//! CLI entry point that dispatches to subcommands.

use bookpub::cli::args::{ConfigAction, ConfigArgs};
use bookpub::cli::{Cli, Commands};
use bookpub::config::{Config, ConfigManager};
use bookpub::error::BookpubResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> BookpubResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // A broken file must not block `config init --force` from replacing it
    let config = match config_manager.load().await {
        Ok(config) => config,
        Err(e) if is_config_init(&cli.command) => {
            eprintln!("{} {}", style("Warning:").yellow(), e);
            Config::default()
        }
        Err(e) => return Err(e),
    };

    init_logging(&cli, &config);
    debug!("Using config {}", config_manager.path().display());

    match cli.command {
        Commands::Serve(args) => bookpub::cli::commands::serve(args, config).await,
        Commands::Resolve(args) => bookpub::cli::commands::resolve(args, &config).await,
        Commands::Config(args) => bookpub::cli::commands::config(args, &config_manager, &config).await,
        Commands::Cache(args) => bookpub::cli::commands::cache(args, &config).await,
    }
}

fn is_config_init(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Config(ConfigArgs {
            action: Some(ConfigAction::Init { .. })
        })
    )
}

/// 0 = warn, 1 = info, 2+ = debug; `RUST_LOG` wins when set
fn init_logging(cli: &Cli, config: &Config) {
    let serve_debug = matches!(&cli.command, Commands::Serve(args) if args.debug);
    let level = if config.general.debug || serve_debug {
        "debug"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bookpub={}", level)));

    if config.general.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
