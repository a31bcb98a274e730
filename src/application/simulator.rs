//! Backtest Simulator
//!
//! Replays recorded histories through the same `TokenEngine` the live monitor
//! uses. Points are consumed strictly in timestamp order; there is no wall
//! clock. Results are merged deterministically: trades sorted by exit time,
//! then token address.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinSet;

use super::engine::{EngineError, TokenEngine};
use crate::domain::{check_ordering, EquityCurve, Position, Token, TokenStatus, Trade};
use crate::metrics::{MetricsCalculator, PerformanceMetrics};
use crate::ports::{InMemoryPositionStore, PositionStore, TokenHistory};
use crate::strategy::{ConfigError, StrategyConfig};

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("Invalid strategy configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("No historical data to replay")]
    NoHistoricalData,

    #[error("History for {address} is not strictly ordered at index {index}")]
    InvalidHistory { address: String, index: usize },

    #[error("Token {0} appears more than once")]
    DuplicateToken(String),

    #[error("Engine error for {address}: {source}")]
    Engine {
        address: String,
        #[source]
        source: EngineError,
    },

    #[error("Replay task failed: {0}")]
    Join(String),
}

/// Outcome of replaying one token
#[derive(Debug, Clone)]
pub struct TokenReplay {
    pub address: String,
    pub final_status: TokenStatus,
    pub trades: Vec<Trade>,
    pub open_position: Option<Position>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: EquityCurve,
    pub metrics: PerformanceMetrics,
    /// Positions still open when the data ran out; never force-closed
    pub open_positions: Vec<Position>,
    pub tokens_processed: usize,
}

#[derive(Debug, Clone)]
pub struct Simulator {
    config: StrategyConfig,
}

impl Simulator {
    pub fn new(config: StrategyConfig) -> Result<Self, BacktestError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Replay a single token's history on a fresh engine and store
    pub fn replay_token(&self, history: &TokenHistory) -> Result<TokenReplay, BacktestError> {
        let address = history.address().to_string();
        let store = InMemoryPositionStore::new();
        let mut engine = TokenEngine::new(Token::from(&history.token), self.config.clone());
        let mut trades = Vec::new();

        for point in &history.points {
            let events = engine
                .on_point(point, &store)
                .map_err(|source| BacktestError::Engine {
                    address: address.clone(),
                    source,
                })?;
            trades.extend(events.iter().filter_map(|e| e.trade().cloned()));

            if engine.status().is_terminal() {
                break;
            }
        }

        let open_position = store.get(&address).map_err(|e| BacktestError::Engine {
            address: address.clone(),
            source: e.into(),
        })?;

        Ok(TokenReplay {
            address,
            final_status: engine.status(),
            trades,
            open_position,
        })
    }

    /// Replay every history sequentially
    pub fn run(&self, histories: &[TokenHistory]) -> Result<BacktestResult, BacktestError> {
        validate_histories(histories)?;
        tracing::info!("Backtesting {} token(s)", histories.len());

        let replays = histories
            .iter()
            .map(|h| self.replay_token(h))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assemble(replays))
    }

    /// Replay tokens on blocking tasks; same result as `run`
    pub async fn run_parallel(
        &self,
        histories: Vec<TokenHistory>,
    ) -> Result<BacktestResult, BacktestError> {
        validate_histories(&histories)?;
        tracing::info!("Backtesting {} token(s) in parallel", histories.len());

        let mut set = JoinSet::new();
        for history in histories {
            let sim = self.clone();
            set.spawn_blocking(move || sim.replay_token(&history));
        }

        let mut replays = Vec::new();
        while let Some(joined) = set.join_next().await {
            let replay = joined.map_err(|e| BacktestError::Join(e.to_string()))??;
            replays.push(replay);
        }
        Ok(assemble(replays))
    }
}

/// Validate the config and replay `histories`
pub fn run_backtest(
    config: StrategyConfig,
    histories: &[TokenHistory],
) -> Result<BacktestResult, BacktestError> {
    Simulator::new(config)?.run(histories)
}

pub async fn run_backtest_parallel(
    config: StrategyConfig,
    histories: Vec<TokenHistory>,
) -> Result<BacktestResult, BacktestError> {
    Simulator::new(config)?.run_parallel(histories).await
}

fn validate_histories(histories: &[TokenHistory]) -> Result<(), BacktestError> {
    if histories.iter().all(|h| h.points.is_empty()) {
        return Err(BacktestError::NoHistoricalData);
    }

    let mut seen = HashSet::new();
    for history in histories {
        if !seen.insert(history.address()) {
            return Err(BacktestError::DuplicateToken(history.address().to_string()));
        }
        check_ordering(&history.points).map_err(|index| BacktestError::InvalidHistory {
            address: history.address().to_string(),
            index,
        })?;
    }
    Ok(())
}

fn assemble(replays: Vec<TokenReplay>) -> BacktestResult {
    let tokens_processed = replays.len();
    let mut trades: Vec<Trade> = Vec::new();
    let mut open_positions: Vec<Position> = Vec::new();

    for replay in replays {
        trades.extend(replay.trades);
        open_positions.extend(replay.open_position);
    }

    trades.sort_by(|a, b| {
        a.exit_time
            .cmp(&b.exit_time)
            .then_with(|| a.token_address.cmp(&b.token_address))
    });
    open_positions.sort_by(|a, b| a.token_address.cmp(&b.token_address));

    let equity_curve = EquityCurve::from_trades(&trades);
    let metrics = MetricsCalculator::calculate(&trades, &equity_curve);

    tracing::info!(
        "Backtest complete: {} trade(s), {} open, PnL ${:.2}",
        trades.len(),
        open_positions.len(),
        metrics.total_pnl
    );

    BacktestResult {
        trades,
        equity_curve,
        metrics,
        open_positions,
        tokens_processed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExitReason, PricePoint, TokenCandidate};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn history(address: &str, caps: &[(i64, f64)]) -> TokenHistory {
        let token = TokenCandidate {
            address: address.to_string(),
            name: address.to_string(),
            symbol: address.to_uppercase(),
            market_cap: 0.0,
            price: 0.0,
            volume: 0.0,
            created_at: t(0),
        };
        let points = caps
            .iter()
            .map(|&(secs, mc)| PricePoint::new(t(secs), mc / 1e9, mc, 5_000.0))
            .collect();
        TokenHistory::new(token, points)
    }

    fn winner(address: &str) -> TokenHistory {
        history(
            address,
            &[(0, 12_000.0), (200, 12_000.0), (230, 5_500.0), (290, 8_200.0), (400, 16_400.0)],
        )
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StrategyConfig::default().with_levels(6.0, 10.0, 8.0);
        assert!(matches!(
            run_backtest(config, &[winner("a")]),
            Err(BacktestError::Config(ConfigError::TriggerAboveWatch { .. }))
        ));
    }

    #[test]
    fn test_no_data() {
        assert!(matches!(
            run_backtest(StrategyConfig::default(), &[]),
            Err(BacktestError::NoHistoricalData)
        ));
        assert!(matches!(
            run_backtest(StrategyConfig::default(), &[history("a", &[])]),
            Err(BacktestError::NoHistoricalData)
        ));
    }

    #[test]
    fn test_unordered_history_rejected() {
        let bad = history("a", &[(0, 12_000.0), (10, 12_000.0), (10, 12_000.0)]);
        assert!(matches!(
            run_backtest(StrategyConfig::default(), &[bad]),
            Err(BacktestError::InvalidHistory { index: 2, .. })
        ));
    }

    #[test]
    fn test_duplicate_token_rejected() {
        assert!(matches!(
            run_backtest(StrategyConfig::default(), &[winner("a"), winner("a")]),
            Err(BacktestError::DuplicateToken(_))
        ));
    }

    #[test]
    fn test_single_winner() {
        let result = run_backtest(StrategyConfig::default(), &[winner("a")]).unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::TakeProfit);
        assert_eq!(result.equity_curve.len(), 1);
        assert!(result.open_positions.is_empty());
        assert_eq!(result.metrics.winning_trades, 1);
    }

    #[test]
    fn test_open_position_reported_not_closed() {
        let open = history("a", &[(0, 12_000.0), (200, 12_000.0), (230, 5_500.0), (290, 8_200.0)]);
        let result = run_backtest(StrategyConfig::default(), &[open]).unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.open_positions.len(), 1);
        assert_eq!(result.metrics.total_trades, 0);
    }

    #[test]
    fn test_trades_sorted_by_exit_then_address() {
        let result =
            run_backtest(StrategyConfig::default(), &[winner("b"), winner("a")]).unwrap();
        let addresses: Vec<_> = result.trades.iter().map(|t| t.token_address.as_str()).collect();
        assert_eq!(addresses, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let histories = vec![
            winner("c"),
            winner("a"),
            history("b", &[(0, 12_000.0), (200, 12_000.0), (230, 5_500.0), (290, 8_200.0), (320, 6_000.0)]),
        ];
        let sequential = run_backtest(StrategyConfig::default(), &histories).unwrap();
        let parallel = run_backtest_parallel(StrategyConfig::default(), histories)
            .await
            .unwrap();
        assert_eq!(sequential.trades, parallel.trades);
        assert_eq!(sequential.metrics, parallel.metrics);
        assert_eq!(parallel.trades[0].exit_reason, ExitReason::StopLoss);
    }
}
