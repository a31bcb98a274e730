//! Persistence sink port
//!
//! The core emits trades and alerts; storage is someone else's job. The sink
//! is only read back to refuse recording a trade twice.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{Alert, Trade};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SinkError {
    #[error("Sink lock poisoned")]
    Poisoned,

    #[error("Sink write failed: {0}")]
    WriteFailed(String),
}

pub trait TradeSink: Send + Sync {
    /// Record a trade. Returns `false` if the same trade was already recorded.
    fn record_trade(&self, trade: &Trade) -> Result<bool, SinkError>;

    fn record_alert(&self, alert: &Alert) -> Result<(), SinkError>;

    fn has_trade(&self, address: &str, entry_time: DateTime<Utc>) -> Result<bool, SinkError>;
}

#[derive(Debug, Default)]
struct SinkState {
    trades: Vec<Trade>,
    keys: HashSet<(String, DateTime<Utc>)>,
    alerts: Vec<Alert>,
}

/// Sink that keeps everything in memory
#[derive(Debug, Default)]
pub struct InMemorySink {
    state: Mutex<SinkState>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded trades in recording order
    pub fn trades(&self) -> Vec<Trade> {
        self.state
            .lock()
            .map(|s| s.trades.clone())
            .unwrap_or_default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.state
            .lock()
            .map(|s| s.alerts.clone())
            .unwrap_or_default()
    }
}

impl TradeSink for InMemorySink {
    fn record_trade(&self, trade: &Trade) -> Result<bool, SinkError> {
        let mut state = self.state.lock().map_err(|_| SinkError::Poisoned)?;
        if !state.keys.insert(trade.idempotency_key()) {
            return Ok(false);
        }
        state.trades.push(trade.clone());
        Ok(true)
    }

    fn record_alert(&self, alert: &Alert) -> Result<(), SinkError> {
        let mut state = self.state.lock().map_err(|_| SinkError::Poisoned)?;
        state.alerts.push(alert.clone());
        Ok(())
    }

    fn has_trade(&self, address: &str, entry_time: DateTime<Utc>) -> Result<bool, SinkError> {
        let state = self.state.lock().map_err(|_| SinkError::Poisoned)?;
        Ok(state.keys.contains(&(address.to_string(), entry_time)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlertKind, ExitReason};
    use chrono::TimeZone;

    fn trade() -> Trade {
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        Trade::new(
            "mint".to_string(),
            1.0,
            2.0,
            t0,
            t0 + chrono::Duration::seconds(30),
            10.0,
            ExitReason::TakeProfit,
        )
    }

    #[test]
    fn test_trade_recorded_once() {
        let sink = InMemorySink::new();
        let trade = trade();
        assert_eq!(sink.record_trade(&trade), Ok(true));
        assert_eq!(sink.record_trade(&trade), Ok(false));
        assert_eq!(sink.trades().len(), 1);
        assert!(sink.has_trade("mint", trade.entry_time).unwrap());
        assert!(!sink.has_trade("other", trade.entry_time).unwrap());
    }

    #[test]
    fn test_alerts() {
        let sink = InMemorySink::new();
        sink.record_alert(&Alert::new(AlertKind::Entry, "bought TEST")).unwrap();
        let alerts = sink.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Entry);
    }
}
