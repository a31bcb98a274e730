//! Calculator for strategy performance: win rate, PnL, drawdown, Sharpe ratio.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::domain::{EquityCurve, Trade};

/// Performance summary of a set of closed trades
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Trades closed at exactly zero PnL, neither win nor loss
    pub breakeven_trades: usize,

    /// Winning share in percent (0-100)
    pub win_rate: f64,

    /// Sum of realized PnL in USD
    pub total_pnl: f64,

    /// Mean PnL per trade in USD
    pub avg_trade: f64,

    /// Largest peak-to-trough equity decline in percent (0-100)
    pub max_drawdown: f64,

    /// Mean per-trade return over its sample standard deviation, not annualized
    pub sharpe_ratio: f64,

    /// Gross profit over gross loss; `None` when there are no losses
    pub profit_factor: Option<f64>,

    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_hold_seconds: f64,
    pub final_equity: f64,

    /// Final equity relative to initial capital, in percent
    pub total_return_percent: f64,

    /// Trade count per exit reason
    pub exit_reasons: BTreeMap<String, usize>,
}

/// Computes `PerformanceMetrics`; stateless.
pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn calculate(trades: &[Trade], curve: &EquityCurve) -> PerformanceMetrics {
        let mut metrics = PerformanceMetrics {
            final_equity: curve.current_equity(),
            ..Default::default()
        };

        if trades.is_empty() {
            return metrics;
        }

        Self::calculate_pnl_metrics(&mut metrics, trades);
        metrics.max_drawdown = Self::max_drawdown(curve);
        metrics.sharpe_ratio = Self::sharpe_ratio(trades);

        if curve.initial_capital > 0.0 {
            metrics.total_return_percent =
                (metrics.final_equity - curve.initial_capital) / curve.initial_capital * 100.0;
        }

        metrics.avg_hold_seconds =
            trades.iter().map(|t| t.hold_seconds() as f64).sum::<f64>() / trades.len() as f64;

        for trade in trades {
            *metrics
                .exit_reasons
                .entry(trade.exit_reason.as_str().to_string())
                .or_insert(0) += 1;
        }

        metrics
    }

    fn calculate_pnl_metrics(metrics: &mut PerformanceMetrics, trades: &[Trade]) {
        let wins: Vec<&Trade> = trades.iter().filter(|t| t.is_win()).collect();
        let losses: Vec<&Trade> = trades.iter().filter(|t| t.pnl < 0.0).collect();

        metrics.total_trades = trades.len();
        metrics.winning_trades = wins.len();
        metrics.losing_trades = losses.len();
        metrics.breakeven_trades = trades.len() - wins.len() - losses.len();
        metrics.win_rate = wins.len() as f64 / trades.len() as f64 * 100.0;

        metrics.total_pnl = trades.iter().map(|t| t.pnl).sum();
        metrics.avg_trade = metrics.total_pnl / trades.len() as f64;

        metrics.largest_win = wins.iter().map(|t| t.pnl).fold(0.0, f64::max);
        metrics.largest_loss = losses.iter().map(|t| t.pnl).fold(0.0, f64::min);

        let gross_profit: f64 = wins.iter().map(|t| t.pnl).sum();
        let gross_loss: f64 = losses.iter().map(|t| t.pnl.abs()).sum();
        if gross_loss > 0.0 {
            metrics.profit_factor = Some(gross_profit / gross_loss);
        }
    }

    /// Max drawdown in percent, peak starting at initial capital
    pub fn max_drawdown(curve: &EquityCurve) -> f64 {
        let mut peak = curve.initial_capital;
        let mut max_dd = 0.0_f64;

        for point in &curve.points {
            if point.equity > peak {
                peak = point.equity;
            }
            if peak > 0.0 {
                let dd = (peak - point.equity) / peak;
                if dd > max_dd {
                    max_dd = dd;
                }
            }
        }

        (max_dd * 100.0).clamp(0.0, 100.0)
    }

    /// Sharpe ratio over per-trade fractional returns
    pub fn sharpe_ratio(trades: &[Trade]) -> f64 {
        if trades.len() < 2 {
            return 0.0;
        }

        let returns: Vec<f64> = trades.iter().map(|t| t.pnl_percent / 100.0).collect();
        let mean = returns.iter().mean();
        let std_dev = returns.iter().std_dev();

        if !std_dev.is_finite() || std_dev <= f64::EPSILON {
            return 0.0;
        }
        mean / std_dev
    }
}
