//! services/client/src/bin/feed.rs

use clap::Parser;
use client_lib::{
    cli::{self, Cli},
    config::Config,
    error::ClientError,
    state::AppState,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const RECOVERY_HINT: &str = "This might be due to corrupted local data. \
Run `feed reset` to clear it and start over.";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!(api_url = %config.api_url, "Configuration loaded");

    // --- 2. Build the Shared AppState ---
    let state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => return fault(&e.to_string()),
    };

    // --- 3. Run the Command Behind the Fault Boundary ---
    let task = tokio::spawn(async move {
        let mut out = std::io::stdout();
        cli::run(cli, &state, &mut out).await
    });

    match task.await {
        Ok(Ok(())) => ExitCode::SUCCESS,
        // Expected failures carry a message meant for the user.
        Ok(Err(ClientError::Action(failure))) => {
            eprintln!("{}", failure);
            ExitCode::FAILURE
        }
        Ok(Err(e)) => fault(&e.to_string()),
        Err(join_error) => fault(&join_error.to_string()),
    }
}

fn fault(detail: &str) -> ExitCode {
    error!("Error caught by boundary: {}", detail);
    eprintln!("Something went wrong: {}", detail);
    eprintln!("{}", RECOVERY_HINT);
    ExitCode::FAILURE
}
