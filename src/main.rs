//! Retail Ledger - funds transfer service
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌──────────┐    ┌──────────┐
//! │ Gateway  │───▶│ Transaction  │───▶│  Ledger  │───▶│ Postgres │
//! │  (HTTP)  │    │   Engine     │    │(postings)│    │ / memory │
//! └──────────┘    └──────────────┘    └──────────┘    └──────────┘
//!                        ▲
//!                 ┌──────┴───────┐
//!                 │   Recovery   │
//!                 │    Worker    │
//!                 └──────────────┘
//! ```

use std::sync::Arc;

use retail_ledger::bootstrap;
use retail_ledger::config::AppConfig;
use retail_ledger::gateway::{self, state::AppState};
use retail_ledger::transaction::RecoveryWorker;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = retail_ledger::logging::init_logging(&app_config);

    tracing::info!("Starting Retail Ledger in {} mode", env);

    let (engine, database) = bootstrap::build_engine(&app_config).await?;

    if app_config.worker.enabled {
        let worker = RecoveryWorker::new(engine.clone(), app_config.worker.clone());
        tokio::spawn(async move {
            worker.run().await;
        });
    } else {
        tracing::warn!("Recovery worker disabled; stalled transactions will not be finished");
    }

    let state = Arc::new(AppState::new(engine, database));
    gateway::run_server(&app_config.gateway, state).await
}
