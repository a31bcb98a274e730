//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the pullback sniper.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapters::historical::{load_histories, save_histories, HistoricalPriceSource};
use crate::adapters::persistence::JsonPositionStore;
use crate::adapters::synthetic::SyntheticPriceSource;
use crate::application::{run_backtest, run_backtest_parallel, BacktestResult, LiveMonitor};
use crate::config::{load_config, Config};
use crate::ports::{InMemorySink, PositionStore, TokenHistory};
use crate::strategy::StrategyConfig;

/// Pullback sniper for freshly launched tokens
#[derive(Parser, Debug)]
#[command(
    name = "sniper",
    version = env!("CARGO_PKG_VERSION"),
    about = "Pullback sniper for freshly launched tokens",
    long_about = "Watches newly launched tokens for an early spike, waits for the \
                  pullback, buys the recovery and manages the exit with momentum-aware \
                  trailing stops. Backtests and paper monitoring share one engine."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay recorded or synthetic histories and report performance
    Backtest(BacktestCmd),

    /// Paper-trade the live monitor against a replayed price feed
    Monitor(MonitorCmd),

    /// Check a configuration file
    Validate(ValidateCmd),
}

/// Run backtesting
#[derive(Parser, Debug)]
pub struct BacktestCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/sniper.toml")]
    pub config: PathBuf,

    /// Recorded histories (JSON); overrides `[backtest] history_file`
    #[arg(long, value_name = "FILE")]
    pub history: Option<PathBuf>,

    /// Seed for synthetic data when no history file is given
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Number of synthetic tokens
    #[arg(long, value_name = "N")]
    pub tokens: Option<usize>,

    #[command(flatten)]
    pub overrides: StrategyOverrides,

    /// Replay tokens on parallel tasks
    #[arg(long)]
    pub parallel: bool,

    /// Print every trade
    #[arg(long)]
    pub trades: bool,

    /// Export results to JSON
    #[arg(long, value_name = "FILE")]
    pub export_json: Option<PathBuf>,

    /// Save the replayed histories to JSON
    #[arg(long, value_name = "FILE")]
    pub export_history: Option<PathBuf>,
}

/// Paper monitoring
#[derive(Parser, Debug)]
pub struct MonitorCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/sniper.toml")]
    pub config: PathBuf,

    /// Recorded histories (JSON) to replay as the live feed
    #[arg(long, value_name = "FILE")]
    pub history: Option<PathBuf>,

    /// Seed for the synthetic feed
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Run this many cycles back to back instead of polling until Ctrl+C
    #[arg(long, value_name = "N")]
    pub cycles: Option<usize>,

    /// Override the data directory for persisted positions
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: StrategyOverrides,
}

/// Validate configuration
#[derive(Parser, Debug)]
pub struct ValidateCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/sniper.toml")]
    pub config: PathBuf,
}

/// Strategy parameter overrides
#[derive(clap::Args, Debug, Default, Clone)]
pub struct StrategyOverrides {
    /// Watch threshold (K USD market cap)
    #[arg(long, value_name = "K")]
    pub watch_k: Option<f64>,

    /// Pullback trigger (K USD market cap)
    #[arg(long, value_name = "K")]
    pub trigger_k: Option<f64>,

    /// Recovery buy level (K USD market cap)
    #[arg(long, value_name = "K")]
    pub buy_k: Option<f64>,

    /// Take-profit multiplier
    #[arg(long, value_name = "X")]
    pub take_profit: Option<f64>,

    /// Stop loss percent
    #[arg(long, value_name = "PCT")]
    pub stop_loss: Option<f64>,

    /// Position size in USD
    #[arg(long, value_name = "USD")]
    pub size: Option<f64>,
}

impl StrategyOverrides {
    pub fn apply(&self, mut config: StrategyConfig) -> StrategyConfig {
        if let Some(k) = self.watch_k {
            config.watch_threshold_k = k;
        }
        if let Some(k) = self.trigger_k {
            config.buy_trigger_k = k;
        }
        if let Some(k) = self.buy_k {
            config.buy_price_k = k;
        }
        if let Some(x) = self.take_profit {
            config.take_profit_multiplier = x;
        }
        if let Some(pct) = self.stop_loss {
            config.stop_loss_percent = pct;
        }
        if let Some(usd) = self.size {
            config.position_size_usd = usd;
        }
        config
    }
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    match app.command {
        Command::Backtest(cmd) => backtest_command(cmd).await,
        Command::Monitor(cmd) => monitor_command(cmd).await,
        Command::Validate(cmd) => validate_command(cmd),
    }
}

/// Initialize logging system
///
/// `--debug` and `--verbose` win over `RUST_LOG`, which wins over the
/// configured fallback level.
pub fn init_logging(verbose: bool, debug: bool, fallback: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

/// Log level configured in the command's config file, if it loads
pub fn configured_log_level(command: &Command) -> Option<String> {
    let path = match command {
        Command::Backtest(cmd) => &cmd.config,
        Command::Monitor(cmd) => &cmd.config,
        Command::Validate(cmd) => &cmd.config,
    };
    load_config(path).ok().map(|c| c.logging.level)
}

fn load_with_overrides(path: &Path, overrides: &StrategyOverrides) -> Result<Config> {
    let mut config = load_config(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.strategy = overrides.apply(config.strategy);
    config
        .strategy
        .validate()
        .context("Strategy overrides are invalid")?;
    Ok(config)
}

/// Histories from an explicit file, the configured file, or the seeded generator
fn resolve_histories(
    config: &Config,
    history: Option<&Path>,
    seed: Option<u64>,
    tokens: Option<usize>,
) -> Result<Vec<TokenHistory>> {
    let path = history
        .map(Path::to_path_buf)
        .or_else(|| config.backtest.history_path());

    if let Some(path) = path {
        return load_histories(&path)
            .with_context(|| format!("Failed to load histories from {}", path.display()));
    }

    let seed = seed.unwrap_or(config.backtest.synthetic_seed);
    let tokens = tokens.unwrap_or(config.backtest.synthetic_tokens);
    tracing::info!("No history file; generating {} synthetic token(s) with seed {}", tokens, seed);
    Ok(SyntheticPriceSource::with_seed(seed, tokens, config.backtest.synthetic_points).generate())
}

/// Handle backtest command
async fn backtest_command(cmd: BacktestCmd) -> Result<()> {
    let config = load_with_overrides(&cmd.config, &cmd.overrides)?;
    let histories = resolve_histories(&config, cmd.history.as_deref(), cmd.seed, cmd.tokens)?;

    if let Some(ref path) = cmd.export_history {
        save_histories(path, &histories)
            .with_context(|| format!("Failed to write histories to {}", path.display()))?;
        println!("Histories written to {}", path.display());
    }

    let result = if cmd.parallel {
        run_backtest_parallel(config.strategy.clone(), histories).await?
    } else {
        run_backtest(config.strategy.clone(), &histories)?
    };

    print_backtest(&config.strategy, &result, cmd.trades);

    if let Some(ref path) = cmd.export_json {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write results to {}", path.display()))?;
        println!("\nResults exported to {}", path.display());
    }

    Ok(())
}

fn print_backtest(strategy: &StrategyConfig, result: &BacktestResult, show_trades: bool) {
    let m = &result.metrics;

    println!("======================================");
    println!("  Backtest Results");
    println!("======================================");
    println!(
        "  Levels:          watch {}K / trigger {}K / buy {}K",
        strategy.watch_threshold_k, strategy.buy_trigger_k, strategy.buy_price_k
    );
    println!(
        "  Exits:           TP {:.1}x / SL {:.1}% / max hold {}s",
        strategy.take_profit_multiplier, strategy.stop_loss_percent, strategy.max_hold_seconds
    );
    println!("  Tokens:          {}", result.tokens_processed);
    println!("  Trades:          {} ({} open)", m.total_trades, result.open_positions.len());
    println!(
        "  Win rate:        {:.1}% ({}W / {}L / {}BE)",
        m.win_rate, m.winning_trades, m.losing_trades, m.breakeven_trades
    );
    println!("  Total PnL:       ${:.2}", m.total_pnl);
    println!("  Avg trade:       ${:.2}", m.avg_trade);
    println!("  Largest win:     ${:.2}", m.largest_win);
    println!("  Largest loss:    ${:.2}", m.largest_loss);
    match m.profit_factor {
        Some(pf) => println!("  Profit factor:   {:.2}", pf),
        None => println!("  Profit factor:   n/a"),
    }
    println!("  Sharpe:          {:.2}", m.sharpe_ratio);
    println!("  Max drawdown:    {:.2}%", m.max_drawdown);
    println!(
        "  Final equity:    ${:.2} ({:+.2}%)",
        m.final_equity, m.total_return_percent
    );
    println!("  Avg hold:        {:.0}s", m.avg_hold_seconds);

    if !m.exit_reasons.is_empty() {
        println!("--------------------------------------");
        for (reason, count) in &m.exit_reasons {
            println!("  {:<16} {}", reason, count);
        }
    }
    println!("======================================");

    if show_trades {
        for trade in &result.trades {
            println!(
                "{}  {:<20} {:>+8.2}%  ${:>9.2}  {}",
                trade.exit_time.format("%Y-%m-%d %H:%M:%S"),
                trade.token_address,
                trade.pnl_percent,
                trade.pnl,
                trade.exit_reason
            );
        }
    }
}

/// Handle monitor command
async fn monitor_command(cmd: MonitorCmd) -> Result<()> {
    let config = load_with_overrides(&cmd.config, &cmd.overrides)?;
    let histories = resolve_histories(&config, cmd.history.as_deref(), cmd.seed, None)?;
    let feed = Arc::new(HistoricalPriceSource::new(histories).context("Invalid replay feed")?);

    let data_dir = cmd
        .data_dir
        .clone()
        .unwrap_or_else(|| config.monitor.data_dir_path());
    let store = Arc::new(
        JsonPositionStore::in_dir(&data_dir)
            .with_context(|| format!("Failed to open position store in {}", data_dir.display()))?,
    );
    let restored = store.open_positions()?.len();
    if restored > 0 {
        tracing::warn!("Restored {} open position(s) from {}", restored, store.path().display());
    }

    let sink = Arc::new(InMemorySink::new());
    let monitor = Arc::new(LiveMonitor::new(
        config.strategy.clone(),
        config.monitor.settings(),
        feed.clone(),
        Some(feed.clone()),
        store.clone(),
        sink.clone(),
    )?);

    println!("Paper monitoring (positions in {})", store.path().display());

    match cmd.cycles {
        Some(0) => bail!("--cycles must be at least 1"),
        Some(cycles) => {
            for _ in 0..cycles {
                let report = monitor.run_cycle().await;
                for trade in &report.trades {
                    print_trade(trade);
                }
                if feed.is_exhausted() {
                    tracing::info!("Replay feed exhausted");
                    break;
                }
            }
        }
        None => {
            monitor.start_monitoring().await?;
            println!("Press Ctrl+C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl+C")?;
            println!("\nStopping monitor...");
            monitor.stop_monitoring().await?;
            for trade in &sink.trades() {
                print_trade(trade);
            }
        }
    }

    let trades = sink.trades();
    let pnl: f64 = trades.iter().map(|t| t.pnl).sum();
    println!("--------------------------------------");
    println!("  Tokens tracked:  {}", monitor.tracked_count().await);
    println!("  Closed trades:   {}", trades.len());
    println!("  Realized PnL:    ${:.2}", pnl);
    println!("  Open positions:  {}", monitor.get_open_positions()?.len());
    for alert in sink.alerts() {
        tracing::debug!("Alert: {}", alert.message);
    }

    Ok(())
}

fn print_trade(trade: &crate::domain::Trade) {
    println!(
        "CLOSED {:<20} {:>+8.2}%  ${:>9.2}  {}",
        trade.token_address, trade.pnl_percent, trade.pnl, trade.exit_reason
    );
}

/// Handle validate command
fn validate_command(cmd: ValidateCmd) -> Result<()> {
    let config = load_config(&cmd.config)
        .with_context(|| format!("Invalid configuration: {}", cmd.config.display()))?;
    let s = &config.strategy;

    println!("✓ {} is valid", cmd.config.display());
    println!(
        "  watch ${:.0} / trigger ${:.0} / buy ${:.0}",
        s.watch_threshold_usd(),
        s.buy_trigger_usd(),
        s.buy_price_usd()
    );
    println!(
        "  take profit {:.1}x, stop loss {:.1}%, size ${:.2}",
        s.take_profit_multiplier, s.stop_loss_percent, s.position_size_usd
    );
    println!(
        "  poll {}s, data dir {}",
        config.monitor.poll_interval_secs,
        config.monitor.data_dir_path().display()
    );
    Ok(())
}
