use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::Position;

/// Starting equity for every equity curve
pub const INITIAL_CAPITAL_USD: f64 = 10_000.0;

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    VolumeDeath,
    TakeProfit,
    TrailingStop,
    StopLoss,
    TimeLimit,
    EmergencyStop,
}

impl ExitReason {
    /// Stable machine-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::VolumeDeath => "volume_death",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TimeLimit => "time_limit",
            ExitReason::EmergencyStop => "emergency_stop",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::EmergencyStop => write!(f, "Emergency stop activated"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Closed round trip. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub token_address: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub quantity: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn new(
        token_address: String,
        entry_price: f64,
        exit_price: f64,
        entry_time: DateTime<Utc>,
        exit_time: DateTime<Utc>,
        quantity: f64,
        exit_reason: ExitReason,
    ) -> Self {
        let pnl = (exit_price - entry_price) * quantity;
        let pnl_percent = if entry_price.abs() < f64::EPSILON {
            0.0
        } else {
            (exit_price - entry_price) / entry_price * 100.0
        };

        Self {
            token_address,
            entry_price,
            exit_price,
            entry_time,
            exit_time,
            quantity,
            pnl,
            pnl_percent,
            exit_reason,
        }
    }

    /// Close an open position into a trade record
    pub fn from_position(
        position: &Position,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        exit_reason: ExitReason,
    ) -> Self {
        Self::new(
            position.token_address.clone(),
            position.entry_price,
            exit_price,
            position.entry_time,
            exit_time,
            position.quantity,
            exit_reason,
        )
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    /// Seconds between entry and exit
    pub fn hold_seconds(&self) -> i64 {
        (self.exit_time - self.entry_time).num_seconds()
    }

    /// Key used by sinks to refuse recording the same trade twice
    pub fn idempotency_key(&self) -> (String, DateTime<Utc>) {
        (self.token_address.clone(), self.entry_time)
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.8} -> {:.8} ({:+.2}%, ${:+.2}) [{}]",
            self.token_address,
            self.entry_price,
            self.exit_price,
            self.pnl_percent,
            self.pnl,
            self.exit_reason
        )
    }
}

/// Alert category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    StatusChange,
    Entry,
    Exit,
    FetchFailure,
    EmergencyStop,
}

/// Notification emitted for the persistence sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    pub fn new(kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// One equity sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Realized equity over time, one sample per closed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCurve {
    pub initial_capital: f64,
    pub points: Vec<EquityPoint>,
}

impl Default for EquityCurve {
    fn default() -> Self {
        Self::new(INITIAL_CAPITAL_USD)
    }
}

impl EquityCurve {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            points: Vec::new(),
        }
    }

    /// Build a curve from trades in the order given
    pub fn from_trades(trades: &[Trade]) -> Self {
        let mut curve = Self::default();
        for trade in trades {
            curve.append(trade);
        }
        curve
    }

    pub fn current_equity(&self) -> f64 {
        self.points
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_capital)
    }

    pub fn append(&mut self, trade: &Trade) {
        let equity = self.current_equity() + trade.pnl;
        self.points.push(EquityPoint {
            timestamp: trade.exit_time,
            equity,
        });
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_trade_pnl() {
        let trade = Trade::new(
            "mint".to_string(),
            0.0001,
            0.00015,
            t(0),
            t(60),
            250_000.0,
            ExitReason::TakeProfit,
        );
        assert_relative_eq!(trade.pnl, 12.5, epsilon = 1e-9);
        assert_relative_eq!(trade.pnl_percent, 50.0, epsilon = 1e-9);
        assert!(trade.is_win());
        assert_eq!(trade.hold_seconds(), 60);
    }

    #[test]
    fn test_flat_trade_has_zero_pnl() {
        for quantity in [1.0, 250_000.0, 1e12] {
            let trade = Trade::new(
                "mint".to_string(),
                0.0042,
                0.0042,
                t(0),
                t(10),
                quantity,
                ExitReason::TimeLimit,
            );
            assert_eq!(trade.pnl, 0.0);
            assert_eq!(trade.pnl_percent, 0.0);
            assert!(!trade.is_win());
        }
    }

    #[test]
    fn test_zero_entry_price_no_division() {
        let trade = Trade::new("mint".to_string(), 0.0, 1.0, t(0), t(1), 10.0, ExitReason::StopLoss);
        assert_eq!(trade.pnl_percent, 0.0);
        assert!(!trade.pnl_percent.is_nan());
    }

    #[test]
    fn test_exit_reason_display() {
        assert_eq!(ExitReason::VolumeDeath.to_string(), "volume_death");
        assert_eq!(ExitReason::EmergencyStop.to_string(), "Emergency stop activated");
        assert_eq!(ExitReason::EmergencyStop.as_str(), "emergency_stop");
    }

    #[test]
    fn test_equity_curve() {
        let win = Trade::new("a".to_string(), 1.0, 2.0, t(0), t(10), 100.0, ExitReason::TakeProfit);
        let loss = Trade::new("b".to_string(), 1.0, 0.5, t(5), t(20), 100.0, ExitReason::StopLoss);

        let curve = EquityCurve::from_trades(&[win, loss]);
        assert_eq!(curve.len(), 2);
        assert_eq!(curve.points[0].equity, INITIAL_CAPITAL_USD + 100.0);
        assert_eq!(curve.points[1].equity, INITIAL_CAPITAL_USD + 50.0);
        assert_eq!(curve.points[1].timestamp, t(20));
        assert_eq!(curve.current_equity(), INITIAL_CAPITAL_USD + 50.0);
    }

    #[test]
    fn test_empty_equity_curve() {
        let curve = EquityCurve::default();
        assert!(curve.is_empty());
        assert_eq!(curve.current_equity(), INITIAL_CAPITAL_USD);
    }
}
