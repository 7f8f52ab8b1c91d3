mod cmd;
mod config;
mod error;

use clap::Parser;
use config::{Cli, Commands};

/// Без RUST_LOG: info, плюс `relay::traffic` на debug, чтобы `--display`
/// был виден без дополнительной настройки фильтра.
const DEFAULT_FILTER: &str = "info,relay::traffic=debug";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Serve(args) => {
            tracing::debug!(?args, "command: serve");
            cmd::serve::run(args).await
        }
    };
    if let Err(e) = result {
        tracing::error!(error = %e, "metric-relay failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
