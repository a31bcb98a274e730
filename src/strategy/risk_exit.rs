//! Risk Exit Engine
//!
//! Decides whether an open position should be closed on the latest
//! observation. Checks run in a fixed priority order and the first hit wins:
//!
//! 1. Emergency stop (external request)
//! 2. Volume death: volume below the age-bucketed minimum
//! 3. Take profit: price at or above `entry * take_profit * phase scale`
//! 4. Stop: price at or below the tighter of the static and trailing stops
//! 5. Time limit: held for at least `max_hold_seconds`
//!
//! The momentum phase only ever advances, so stops only tighten and targets
//! only widen over the life of a position.

use super::params::StrategyConfig;
use crate::domain::volume_gate::is_volume_viable;
use crate::domain::{ExitReason, MomentumPhase, Position, PricePoint};

/// Exit decision for one observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitDecision {
    Hold,
    FullExit {
        reason: ExitReason,
        price: f64,
        confidence: f64,
    },
}

impl ExitDecision {
    pub fn is_exit(&self) -> bool {
        matches!(self, ExitDecision::FullExit { .. })
    }

    pub fn reason(&self) -> Option<ExitReason> {
        match self {
            ExitDecision::FullExit { reason, .. } => Some(*reason),
            ExitDecision::Hold => None,
        }
    }
}

/// How sure the engine is that an exit reason reflects reality
pub fn exit_confidence(reason: ExitReason) -> f64 {
    match reason {
        ExitReason::EmergencyStop | ExitReason::VolumeDeath => 1.0,
        ExitReason::TakeProfit => 0.9,
        ExitReason::TrailingStop | ExitReason::StopLoss => 0.85,
        ExitReason::TimeLimit => 0.7,
    }
}

#[derive(Debug, Clone)]
pub struct RiskExitEngine {
    config: StrategyConfig,
}

impl RiskExitEngine {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Current take-profit price
    pub fn target_price(&self, position: &Position) -> f64 {
        position.entry_price
            * self.config.take_profit_multiplier
            * position.momentum_phase.target_scale()
    }

    /// Trailing stop implied by the peak; equals the static stop in the initial phase
    pub fn trailing_stop(&self, position: &Position) -> f64 {
        if position.momentum_phase == MomentumPhase::Initial {
            return position.stop_loss_price;
        }
        let distance = self.config.stop_loss_percent * position.momentum_phase.stop_weight();
        position.peak_price * (1.0 - distance / 100.0)
    }

    /// The binding stop and the reason it would report
    pub fn effective_stop(&self, position: &Position) -> (f64, ExitReason) {
        let trailing = self.trailing_stop(position);
        if trailing > position.stop_loss_price {
            (trailing, ExitReason::TrailingStop)
        } else {
            (position.stop_loss_price, ExitReason::StopLoss)
        }
    }

    /// Update the position with the latest observation and decide
    pub fn evaluate(
        &self,
        position: &mut Position,
        point: &PricePoint,
        token_age_minutes: f64,
        emergency: bool,
    ) -> ExitDecision {
        let price = point.price;

        if emergency {
            tracing::warn!("{}: emergency stop requested", position.token_address);
            return Self::exit(ExitReason::EmergencyStop, price);
        }

        let before = position.momentum_phase;
        position.observe(price);
        if position.momentum_phase != before {
            tracing::info!(
                "{}: momentum {} -> {} (peak {:.1}K)",
                position.token_address,
                before,
                position.momentum_phase,
                position.peak_market_cap() / 1000.0
            );
        }
        position.trailing_stop_price = self.trailing_stop(position);

        if !is_volume_viable(token_age_minutes, point.volume) {
            tracing::info!(
                "{}: volume death ({:.0} at {:.1} min)",
                position.token_address,
                point.volume,
                token_age_minutes
            );
            return Self::exit(ExitReason::VolumeDeath, price);
        }

        if price >= self.target_price(position) {
            return Self::exit(ExitReason::TakeProfit, price);
        }

        let (stop, stop_reason) = self.effective_stop(position);
        if price <= stop {
            return Self::exit(stop_reason, price);
        }

        let held = position.held_seconds_at(point.timestamp);
        if held >= 0 && held as u64 >= self.config.max_hold_seconds {
            return Self::exit(ExitReason::TimeLimit, price);
        }

        ExitDecision::Hold
    }

    fn exit(reason: ExitReason, price: f64) -> ExitDecision {
        ExitDecision::FullExit {
            reason,
            price,
            confidence: exit_confidence(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const SUPPLY: f64 = 1e9;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn point(secs: i64, market_cap: f64, volume: f64) -> PricePoint {
        PricePoint::new(t(secs), market_cap / SUPPLY, market_cap, volume)
    }

    fn position() -> Position {
        // Entry at 10K market cap
        Position::open("mint".to_string(), &point(0, 10_000.0, 5_000.0), 25.0, 25.0).unwrap()
    }

    fn engine() -> RiskExitEngine {
        RiskExitEngine::new(StrategyConfig::default())
    }

    #[test]
    fn test_hold_inside_band() {
        let mut pos = position();
        let decision = engine().evaluate(&mut pos, &point(30, 12_000.0, 5_000.0), 10.0, false);
        assert_eq!(decision, ExitDecision::Hold);
    }

    #[test]
    fn test_take_profit() {
        let mut pos = position();
        let decision = engine().evaluate(&mut pos, &point(30, 19_900.0, 5_000.0), 10.0, false);
        assert_eq!(decision, ExitDecision::Hold);
        let decision = engine().evaluate(&mut pos, &point(40, 20_100.0, 5_000.0), 10.0, false);
        assert_eq!(decision.reason(), Some(ExitReason::TakeProfit));
    }

    #[test]
    fn test_static_stop_loss() {
        let mut pos = position();
        let decision = engine().evaluate(&mut pos, &point(30, 7_400.0, 5_000.0), 10.0, false);
        assert_eq!(decision.reason(), Some(ExitReason::StopLoss));
    }

    #[test]
    fn test_volume_death_beats_everything_but_emergency() {
        let mut pos = position();
        // Would also take profit and breach the time limit
        let decision = engine().evaluate(&mut pos, &point(5_000, 30_000.0, 200.0), 10.0, false);
        assert_eq!(decision.reason(), Some(ExitReason::VolumeDeath));
        if let ExitDecision::FullExit { confidence, .. } = decision {
            assert_eq!(confidence, 1.0);
        }

        let mut pos = position();
        let decision = engine().evaluate(&mut pos, &point(30, 30_000.0, 200.0), 10.0, true);
        assert_eq!(decision.reason(), Some(ExitReason::EmergencyStop));
    }

    #[test]
    fn test_take_profit_beats_time_limit() {
        let mut pos = position();
        let decision = engine().evaluate(&mut pos, &point(3_600, 25_000.0, 5_000.0), 60.0, false);
        assert_eq!(decision.reason(), Some(ExitReason::TakeProfit));
    }

    #[test]
    fn test_time_limit() {
        let mut pos = position();
        let decision = engine().evaluate(&mut pos, &point(1_800, 11_000.0, 5_000.0), 40.0, false);
        assert_eq!(decision.reason(), Some(ExitReason::TimeLimit));

        let mut pos = position();
        let decision = engine().evaluate(&mut pos, &point(1_799, 11_000.0, 5_000.0), 40.0, false);
        assert_eq!(decision, ExitDecision::Hold);
    }

    #[test]
    fn test_breakout_widens_target_and_trails_stop() {
        let engine = engine();
        let mut pos = position();

        // 150K: breakout. Target 2.0 * 1.5 = 3x entry would be 30K, already exceeded
        let decision = engine.evaluate(&mut pos, &point(30, 150_000.0, 5_000.0), 10.0, false);
        assert_eq!(decision.reason(), Some(ExitReason::TakeProfit));
        assert_eq!(pos.momentum_phase, MomentumPhase::Breakout);
    }

    #[test]
    fn test_trailing_stop_after_breakout() {
        let engine = engine().config().clone().with_take_profit(100.0);
        let engine = RiskExitEngine::new(engine);
        let mut pos = position();

        assert_eq!(
            engine.evaluate(&mut pos, &point(30, 200_000.0, 5_000.0), 10.0, false),
            ExitDecision::Hold
        );
        assert_eq!(pos.momentum_phase, MomentumPhase::Breakout);
        // Stop distance 25% * 0.5 = 12.5% below the 200K peak
        assert_relative_eq!(pos.trailing_stop_price, 200_000.0 / SUPPLY * 0.875, epsilon = 1e-15);

        let decision = engine.evaluate(&mut pos, &point(60, 170_000.0, 5_000.0), 10.0, false);
        assert_eq!(decision.reason(), Some(ExitReason::TrailingStop));
    }

    #[test]
    fn test_explosive_tightens_further() {
        let engine = RiskExitEngine::new(StrategyConfig::default().with_take_profit(1_000.0));
        let mut pos = position();
        engine.evaluate(&mut pos, &point(30, 600_000.0, 5_000.0), 10.0, false);
        assert_eq!(pos.momentum_phase, MomentumPhase::Explosive);
        // 25% * 0.3 = 7.5%
        assert_relative_eq!(engine.trailing_stop(&pos), 600_000.0 / SUPPLY * 0.925, epsilon = 1e-15);
        assert_relative_eq!(engine.target_price(&pos), pos.entry_price * 3_000.0, epsilon = 1e-12);
    }

    #[test]
    fn test_effective_stop_never_below_static() {
        let engine = engine();
        let pos = position();
        let (stop, reason) = engine.effective_stop(&pos);
        assert_eq!(stop, pos.stop_loss_price);
        assert_eq!(reason, ExitReason::StopLoss);
    }

    #[test]
    fn test_confidence_values() {
        assert_eq!(exit_confidence(ExitReason::VolumeDeath), 1.0);
        assert!(exit_confidence(ExitReason::TimeLimit) < exit_confidence(ExitReason::TakeProfit));
    }
}
