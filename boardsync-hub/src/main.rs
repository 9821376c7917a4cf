//! `BoardSync` hub -- in-memory board server for local development.
//!
//! Serves the board REST endpoints and the per-board chat channel from
//! seed data held in memory. Nothing is persisted.
//!
//! # Usage
//!
//! ```bash
//! # Run the demo board on 127.0.0.1:8000
//! cargo run --bin boardsync-hub
//!
//! # Custom address and seed file
//! cargo run --bin boardsync-hub -- --bind 0.0.0.0:8080 --config hub.toml
//! ```

use std::sync::Arc;

use boardsync_hub::config::{HubCliArgs, HubConfig};
use boardsync_hub::hub;
use boardsync_hub::state::HubState;
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = HubCliArgs::parse();

    let config = match HubConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        users = config.seed.users.len(),
        boards = config.seed.boards.len(),
        tasks = config.seed.tasks.len(),
        "starting boardsync hub"
    );

    let state = Arc::new(HubState::new(config.seed));

    match hub::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "hub listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "hub server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start hub");
            std::process::exit(1);
        }
    }
}
