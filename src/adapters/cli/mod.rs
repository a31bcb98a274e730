//! CLI Adapter
//!
//! Command-line interface for the pullback sniper.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{
    configured_log_level, init_logging, BacktestCmd, CliApp, Command, MonitorCmd,
    StrategyOverrides, ValidateCmd,
};

use anyhow::Result;

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    commands::execute(app).await
}
