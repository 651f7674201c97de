#![cfg(not(tarpaulin_include))]

use aoc_portal::{Config, app};
use log::error;
use std::process::ExitCode;

/// Main entry point for the diagnostic portal
///
/// Settings come from the environment (`API_URL`, `API_KEY`, `API_URL_PDF`,
/// optional `API_BASE_URL`, `PAYMENTS_HOST`, `PORTAL_ADDR`,
/// `API_TIMEOUT_SECS`, `DEFAULT_COST_PER_TRADE`). Logging follows
/// `RUST_LOG`, defaulting to `info`.
#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match app::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("portal stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}
