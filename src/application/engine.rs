//! Token Engine
//!
//! The single per-token pipeline shared by the backtest simulator and the
//! live monitor. Feed it observations in timestamp order; it advances the
//! lifecycle, opens and closes positions through the injected store, and
//! reports what happened as events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::domain::{
    Alert, AlertKind, ExitReason, LifecycleError, Position, PricePoint, Token, TokenStatus, Trade,
};
use crate::ports::{PositionStore, StoreError};
use crate::strategy::{
    EntrySignal, EntrySignalDetector, ExitDecision, RiskExitEngine, StrategyConfig, TokenLifecycle,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Position store error: {0}")]
    Store(#[from] StoreError),

    #[error("Token {0} is bought but has no open position")]
    MissingPosition(String),
}

/// Something the engine did while processing an observation
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StatusChanged {
        address: String,
        from: TokenStatus,
        to: TokenStatus,
    },
    PositionOpened(Position),
    PositionClosed {
        trade: Trade,
        confidence: f64,
    },
    PointSkipped {
        address: String,
        reason: String,
    },
}

impl EngineEvent {
    /// Alert worth forwarding to the sink, if any
    pub fn to_alert(&self) -> Option<Alert> {
        match self {
            EngineEvent::StatusChanged { address, from, to } => Some(Alert::new(
                AlertKind::StatusChange,
                format!("{}: {} -> {}", address, from, to),
            )),
            EngineEvent::PositionOpened(position) => Some(Alert::new(
                AlertKind::Entry,
                format!(
                    "{}: bought {:.2} @ {:.10} (mc {:.1}K)",
                    position.token_address,
                    position.quantity,
                    position.entry_price,
                    position.entry_market_cap / 1000.0
                ),
            )),
            EngineEvent::PositionClosed { trade, .. } => {
                let kind = if trade.exit_reason == ExitReason::EmergencyStop {
                    AlertKind::EmergencyStop
                } else {
                    AlertKind::Exit
                };
                Some(Alert::new(kind, trade.to_string()))
            }
            EngineEvent::PointSkipped { .. } => None,
        }
    }

    pub fn trade(&self) -> Option<&Trade> {
        match self {
            EngineEvent::PositionClosed { trade, .. } => Some(trade),
            _ => None,
        }
    }
}

/// Terminal status for a closed position
pub fn status_for_exit(trade: &Trade) -> TokenStatus {
    match trade.exit_reason {
        ExitReason::TakeProfit => TokenStatus::Sold,
        ExitReason::StopLoss | ExitReason::TrailingStop | ExitReason::VolumeDeath => {
            TokenStatus::StoppedOut
        }
        ExitReason::EmergencyStop => TokenStatus::EmergencyStop,
        ExitReason::TimeLimit => {
            if trade.exit_price >= trade.entry_price {
                TokenStatus::Sold
            } else {
                TokenStatus::StoppedOut
            }
        }
    }
}

#[derive(Debug)]
pub struct TokenEngine {
    config: StrategyConfig,
    lifecycle: TokenLifecycle,
    detector: EntrySignalDetector,
    exits: RiskExitEngine,
    emergency: Arc<AtomicBool>,
}

impl TokenEngine {
    pub fn new(token: Token, config: StrategyConfig) -> Self {
        Self::with_lifecycle(TokenLifecycle::new(token), config)
    }

    /// Engine for a token whose position was recovered from a store
    pub fn resume_bought(token: Token, config: StrategyConfig) -> Result<Self, EngineError> {
        Ok(Self::with_lifecycle(TokenLifecycle::resumed_bought(token)?, config))
    }

    fn with_lifecycle(lifecycle: TokenLifecycle, config: StrategyConfig) -> Self {
        Self {
            exits: RiskExitEngine::new(config.clone()),
            config,
            lifecycle,
            detector: EntrySignalDetector::new(),
            emergency: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn address(&self) -> &str {
        self.lifecycle.address()
    }

    pub fn status(&self) -> TokenStatus {
        self.lifecycle.status()
    }

    pub fn token(&self) -> &Token {
        self.lifecycle.token()
    }

    pub fn last_point(&self) -> Option<&PricePoint> {
        self.lifecycle.last_point()
    }

    /// Flag that can be raised without holding the engine
    pub fn emergency_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.emergency)
    }

    pub fn request_emergency_stop(&self) {
        self.emergency.store(true, Ordering::SeqCst);
    }

    /// Process one observation
    pub fn on_point(
        &mut self,
        point: &PricePoint,
        store: &dyn PositionStore,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        let status = self.status();
        if status.is_terminal() {
            return Ok(Vec::new());
        }

        if !point.is_well_formed() {
            tracing::warn!(
                "{}: skipping malformed point at {} (price={}, mc={}, vol={})",
                self.address(),
                point.timestamp,
                point.price,
                point.market_cap,
                point.volume
            );
            return Ok(vec![self.skipped("malformed point")]);
        }

        if !self.lifecycle.is_fresh(point) {
            tracing::debug!("{}: stale point at {}", self.address(), point.timestamp);
            return Ok(vec![self.skipped("stale point")]);
        }

        self.lifecycle.observe(point);

        if status == TokenStatus::Bought {
            self.manage_position(point, store)
        } else {
            if self.emergency.swap(false, Ordering::SeqCst) {
                tracing::warn!("{}: emergency stop ignored, no open position", self.address());
            }
            self.seek_entry(point, store)
        }
    }

    /// Close an open position right away at the last observed price
    pub fn process_emergency(
        &mut self,
        store: &dyn PositionStore,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        if self.status() != TokenStatus::Bought {
            return Ok(Vec::new());
        }
        let Some(point) = self.lifecycle.last_point().copied() else {
            return Ok(Vec::new());
        };
        self.emergency.store(false, Ordering::SeqCst);

        let position = store
            .get(self.address())?
            .ok_or_else(|| EngineError::MissingPosition(self.address().to_string()))?;
        self.close(position, point.price, &point, ExitReason::EmergencyStop, 1.0, store)
    }

    fn seek_entry(
        &mut self,
        point: &PricePoint,
        store: &dyn PositionStore,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        let signal = self
            .detector
            .evaluate(self.lifecycle.token(), point, &self.config);

        let next = match signal {
            EntrySignal::None => return Ok(Vec::new()),
            EntrySignal::Watch => TokenStatus::Watching,
            EntrySignal::Trigger => TokenStatus::BuyTrigger,
            EntrySignal::Expire(_) => TokenStatus::Expired,
            EntrySignal::Buy => return self.enter(point, store),
        };

        let from = self.lifecycle.apply(next)?;
        Ok(vec![self.status_changed(from, next)])
    }

    fn enter(
        &mut self,
        point: &PricePoint,
        store: &dyn PositionStore,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        let position = match Position::open(
            self.address().to_string(),
            point,
            self.config.position_size_usd,
            self.config.stop_loss_percent,
        ) {
            Ok(position) => position,
            Err(e) => {
                tracing::warn!("{}: cannot open position: {}", self.address(), e);
                return Ok(vec![self.skipped(&e.to_string())]);
            }
        };

        store.open(position.clone())?;
        let from = self.lifecycle.apply(TokenStatus::Bought)?;
        tracing::info!(
            "{}: ENTRY {:.2} tokens @ {:.10} (mc {:.1}K, stop {:.10})",
            self.address(),
            position.quantity,
            position.entry_price,
            point.market_cap_k(),
            position.stop_loss_price
        );

        Ok(vec![
            self.status_changed(from, TokenStatus::Bought),
            EngineEvent::PositionOpened(position),
        ])
    }

    fn manage_position(
        &mut self,
        point: &PricePoint,
        store: &dyn PositionStore,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        let mut position = store
            .get(self.address())?
            .ok_or_else(|| EngineError::MissingPosition(self.address().to_string()))?;

        let emergency = self.emergency.swap(false, Ordering::SeqCst);
        let age = self.lifecycle.age_minutes_at(point.timestamp);

        match self.exits.evaluate(&mut position, point, age, emergency) {
            ExitDecision::Hold => {
                tracing::debug!(
                    "{}: hold @ {:.10} ({:+.1}%)",
                    self.address(),
                    point.price,
                    position.pnl_percent(point.price)
                );
                store.update(position)?;
                Ok(Vec::new())
            }
            ExitDecision::FullExit {
                reason,
                price,
                confidence,
            } => self.close(position, price, point, reason, confidence, store),
        }
    }

    fn close(
        &mut self,
        position: Position,
        price: f64,
        point: &PricePoint,
        reason: ExitReason,
        confidence: f64,
        store: &dyn PositionStore,
    ) -> Result<Vec<EngineEvent>, EngineError> {
        store.close(&position.token_address)?;
        let trade = Trade::from_position(&position, price, point.timestamp, reason);
        let next = status_for_exit(&trade);
        let from = self.lifecycle.apply(next)?;

        tracing::info!("{}: EXIT {}", self.address(), trade);

        Ok(vec![
            EngineEvent::PositionClosed { trade, confidence },
            self.status_changed(from, next),
        ])
    }

    fn status_changed(&self, from: TokenStatus, to: TokenStatus) -> EngineEvent {
        EngineEvent::StatusChanged {
            address: self.address().to_string(),
            from,
            to,
        }
    }

    fn skipped(&self, reason: &str) -> EngineEvent {
        EngineEvent::PointSkipped {
            address: self.address().to_string(),
            reason: reason.to_string(),
        }
    }
}
