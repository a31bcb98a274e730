//! Pullback Sniper
//!
//! Backtest and paper-monitor the pullback strategy from the command line.

use anyhow::Result;
use clap::Parser;

use pullback_sniper::adapters::cli::{self, configured_log_level, init_logging, CliApp};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (RUST_LOG, SNIPER_DATA_DIR)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    let level = configured_log_level(&app.command).unwrap_or_else(|| "warn".to_string());
    init_logging(app.verbose, app.debug, &level)?;

    cli::execute(app).await
}
