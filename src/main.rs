mod api;
mod app;
mod application;
mod chat;
mod config;
mod domain;
#[cfg(test)]
mod testing;
mod ui;
mod utils;
mod video;

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = config::Config::from_env();
    init_tracing();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match app::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "relay stopped");
            ExitCode::FAILURE
        }
    }
}
