//! Entry Signal Detector
//!
//! Detects the spike / pullback / re-entry pattern:
//! 1. Market cap crosses the watch threshold and *stays* there: any point
//!    below the threshold or the volume gate drops the crossing, which is
//!    confirmed by a point 3-5 minutes later that still clears both.
//! 2. Market cap pulls back to the buy trigger.
//! 3. Market cap recovers to the buy level within 5 minutes of the trigger.
//!
//! Every promotion also requires the age-bucketed volume gate to pass and the
//! token to be younger than `max_age_minutes`. The detector never mutates the
//! token; it emits a signal and the engine applies the transition.

use chrono::{DateTime, Utc};

use super::params::StrategyConfig;
use crate::domain::volume_gate::is_volume_viable;
use crate::domain::{PricePoint, Token, TokenStatus};

/// Earliest confirmation of a watch crossing, in seconds after the crossing
pub const MOMENTUM_CONFIRM_MIN_SECS: i64 = 180;
/// Latest confirmation of a watch crossing
pub const MOMENTUM_CONFIRM_MAX_SECS: i64 = 300;
/// Time allowed between the buy trigger and the buy
pub const BUY_WINDOW_SECS: i64 = 300;

/// Why a candidate stopped being eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    TooOld,
    BuyWindowElapsed,
}

/// Outcome of evaluating one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySignal {
    None,
    Watch,
    Trigger,
    Buy,
    Expire(ExpiryReason),
}

#[derive(Debug, Clone, Default)]
pub struct EntrySignalDetector {
    /// First unconfirmed crossing of the watch threshold
    pending_crossing: Option<DateTime<Utc>>,
    /// When the buy trigger fired
    triggered_at: Option<DateTime<Utc>>,
}

impl EntrySignalDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_crossing(&self) -> Option<DateTime<Utc>> {
        self.pending_crossing
    }

    pub fn triggered_at(&self) -> Option<DateTime<Utc>> {
        self.triggered_at
    }

    /// Evaluate the latest observation for a token still looking for an entry
    pub fn evaluate(&mut self, token: &Token, point: &PricePoint, config: &StrategyConfig) -> EntrySignal {
        let age = token.age_minutes_at(point.timestamp);
        let viable = is_volume_viable(age, point.volume);

        match token.status() {
            TokenStatus::New => {
                if age > config.max_age_minutes {
                    return EntrySignal::Expire(ExpiryReason::TooOld);
                }
                self.evaluate_watch(token, point, config, viable)
            }
            TokenStatus::Watching => {
                if age > config.max_age_minutes {
                    return EntrySignal::Expire(ExpiryReason::TooOld);
                }
                if viable && point.market_cap <= config.buy_trigger_usd() {
                    self.triggered_at = Some(point.timestamp);
                    return EntrySignal::Trigger;
                }
                EntrySignal::None
            }
            TokenStatus::BuyTrigger => {
                let triggered_at = *self.triggered_at.get_or_insert(point.timestamp);
                if (point.timestamp - triggered_at).num_milliseconds() > BUY_WINDOW_SECS * 1000 {
                    tracing::info!("{}: buy window elapsed without recovery", token.symbol);
                    return EntrySignal::Expire(ExpiryReason::BuyWindowElapsed);
                }
                if age > config.max_age_minutes {
                    return EntrySignal::Expire(ExpiryReason::TooOld);
                }
                if viable && point.market_cap >= config.buy_price_usd() {
                    return EntrySignal::Buy;
                }
                EntrySignal::None
            }
            _ => EntrySignal::None,
        }
    }

    fn evaluate_watch(
        &mut self,
        token: &Token,
        point: &PricePoint,
        config: &StrategyConfig,
        viable: bool,
    ) -> EntrySignal {
        let clears = viable && point.market_cap >= config.watch_threshold_usd();

        if let Some(crossed_at) = self.pending_crossing {
            let elapsed = (point.timestamp - crossed_at).num_seconds();
            if !clears {
                tracing::debug!("{}: fell back below watch threshold, crossing discarded", token.symbol);
                self.pending_crossing = None;
                return EntrySignal::None;
            }
            if elapsed > MOMENTUM_CONFIRM_MAX_SECS {
                tracing::debug!("{}: watch crossing not confirmed in time, discarded", token.symbol);
                self.pending_crossing = None;
            } else if elapsed >= MOMENTUM_CONFIRM_MIN_SECS {
                self.pending_crossing = None;
                return EntrySignal::Watch;
            } else {
                return EntrySignal::None;
            }
        }

        if clears {
            tracing::debug!(
                "{}: crossed watch threshold at {:.1}K, awaiting confirmation",
                token.symbol,
                point.market_cap_k()
            );
            self.pending_crossing = Some(point.timestamp);
        }
        EntrySignal::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn token() -> Token {
        Token::new("mint".to_string(), "Test".to_string(), "TEST".to_string(), t(0))
    }

    fn point(secs: i64, market_cap_k: f64, volume: f64) -> PricePoint {
        PricePoint::new(t(secs), market_cap_k * 1000.0 / 1e9, market_cap_k * 1000.0, volume)
    }

    fn config() -> StrategyConfig {
        StrategyConfig::default()
    }

    fn watching_token() -> Token {
        let mut tok = token();
        tok.transition(TokenStatus::Watching).unwrap();
        tok
    }

    #[test]
    fn test_single_spike_not_enough() {
        let mut detector = EntrySignalDetector::new();
        let tok = token();
        assert_eq!(detector.evaluate(&tok, &point(0, 12.0, 5_000.0), &config()), EntrySignal::None);
        assert_eq!(detector.pending_crossing(), Some(t(0)));
        // Too early to confirm
        assert_eq!(detector.evaluate(&tok, &point(60, 12.0, 5_000.0), &config()), EntrySignal::None);
    }

    #[test]
    fn test_sustained_crossing_confirms() {
        let mut detector = EntrySignalDetector::new();
        let tok = token();
        detector.evaluate(&tok, &point(0, 12.0, 5_000.0), &config());
        assert_eq!(
            detector.evaluate(&tok, &point(200, 11.0, 5_000.0), &config()),
            EntrySignal::Watch
        );
        assert!(detector.pending_crossing().is_none());
    }

    #[test]
    fn test_confirmation_requires_threshold() {
        let mut detector = EntrySignalDetector::new();
        let tok = token();
        detector.evaluate(&tok, &point(0, 12.0, 5_000.0), &config());
        // In window but below threshold
        assert_eq!(detector.evaluate(&tok, &point(190, 9.0, 5_000.0), &config()), EntrySignal::None);
        assert!(detector.pending_crossing().is_none());
    }

    #[test]
    fn test_thin_volume_drops_crossing() {
        let mut detector = EntrySignalDetector::new();
        let tok = token();
        detector.evaluate(&tok, &point(0, 12.0, 5_000.0), &config());
        // Above threshold, volume too thin for a 4-minute-old token
        assert_eq!(detector.evaluate(&tok, &point(240, 12.0, 500.0), &config()), EntrySignal::None);
        assert!(detector.pending_crossing().is_none());
    }

    #[test]
    fn test_dip_inside_window_restarts_confirmation() {
        let mut detector = EntrySignalDetector::new();
        let tok = token();
        detector.evaluate(&tok, &point(0, 12.0, 5_000.0), &config());
        assert_eq!(detector.evaluate(&tok, &point(60, 4.0, 5_000.0), &config()), EntrySignal::None);
        // Back above the threshold: a fresh crossing, not a confirmation
        assert_eq!(detector.evaluate(&tok, &point(200, 12.0, 5_000.0), &config()), EntrySignal::None);
        assert_eq!(detector.pending_crossing(), Some(t(200)));
        assert_eq!(
            detector.evaluate(&tok, &point(380, 12.0, 5_000.0), &config()),
            EntrySignal::Watch
        );
    }

    #[test]
    fn test_unconfirmed_crossing_discarded_after_window() {
        let mut detector = EntrySignalDetector::new();
        let tok = token();
        detector.evaluate(&tok, &point(0, 12.0, 5_000.0), &config());
        // Past the window and below threshold: crossing dropped silently
        assert_eq!(detector.evaluate(&tok, &point(400, 8.0, 5_000.0), &config()), EntrySignal::None);
        assert!(detector.pending_crossing().is_none());
    }

    #[test]
    fn test_late_point_starts_new_crossing() {
        let mut detector = EntrySignalDetector::new();
        let tok = token();
        detector.evaluate(&tok, &point(0, 12.0, 5_000.0), &config());
        assert_eq!(detector.evaluate(&tok, &point(400, 12.0, 5_000.0), &config()), EntrySignal::None);
        assert_eq!(detector.pending_crossing(), Some(t(400)));
    }

    #[test]
    fn test_low_volume_crossing_ignored() {
        let mut detector = EntrySignalDetector::new();
        let tok = token();
        assert_eq!(detector.evaluate(&tok, &point(0, 50.0, 100.0), &config()), EntrySignal::None);
        assert!(detector.pending_crossing().is_none());
    }

    #[test]
    fn test_trigger_on_pullback() {
        let mut detector = EntrySignalDetector::new();
        let tok = watching_token();
        assert_eq!(detector.evaluate(&tok, &point(200, 7.0, 5_000.0), &config()), EntrySignal::None);
        assert_eq!(detector.evaluate(&tok, &point(230, 5.5, 5_000.0), &config()), EntrySignal::Trigger);
        assert_eq!(detector.triggered_at(), Some(t(230)));
    }

    #[test]
    fn test_buy_on_recovery() {
        let mut detector = EntrySignalDetector::new();
        let mut tok = watching_token();
        detector.evaluate(&tok, &point(230, 5.5, 5_000.0), &config());
        tok.transition(TokenStatus::BuyTrigger).unwrap();

        assert_eq!(detector.evaluate(&tok, &point(260, 7.0, 5_000.0), &config()), EntrySignal::None);
        assert_eq!(detector.evaluate(&tok, &point(290, 8.2, 5_000.0), &config()), EntrySignal::Buy);
    }

    #[test]
    fn test_buy_blocked_by_volume() {
        let mut detector = EntrySignalDetector::new();
        let mut tok = watching_token();
        detector.evaluate(&tok, &point(230, 5.5, 5_000.0), &config());
        tok.transition(TokenStatus::BuyTrigger).unwrap();

        assert_eq!(detector.evaluate(&tok, &point(290, 8.2, 300.0), &config()), EntrySignal::None);
    }

    #[test]
    fn test_buy_window_elapses() {
        let mut detector = EntrySignalDetector::new();
        let mut tok = watching_token();
        detector.evaluate(&tok, &point(230, 5.5, 5_000.0), &config());
        tok.transition(TokenStatus::BuyTrigger).unwrap();

        assert_eq!(
            detector.evaluate(&tok, &point(230 + 301, 9.0, 5_000.0), &config()),
            EntrySignal::Expire(ExpiryReason::BuyWindowElapsed)
        );
    }

    #[test]
    fn test_buy_window_is_not_truncated_to_seconds() {
        let mut detector = EntrySignalDetector::new();
        let mut tok = watching_token();
        detector.evaluate(&tok, &point(230, 5.5, 5_000.0), &config());
        tok.transition(TokenStatus::BuyTrigger).unwrap();

        let late = PricePoint::new(
            t(230 + 300) + Duration::milliseconds(900),
            8.2e-6,
            8_200.0,
            5_000.0,
        );
        assert_eq!(
            detector.evaluate(&tok, &late, &config()),
            EntrySignal::Expire(ExpiryReason::BuyWindowElapsed)
        );
    }

    #[test]
    fn test_too_old_token_expires() {
        let mut detector = EntrySignalDetector::new();
        let tok = token();
        let cfg = config().with_max_age(10.0);
        assert_eq!(
            detector.evaluate(&tok, &point(11 * 60, 12.0, 5_000.0), &cfg),
            EntrySignal::Expire(ExpiryReason::TooOld)
        );
    }

    #[test]
    fn test_bought_token_ignored() {
        let mut detector = EntrySignalDetector::new();
        let mut tok = watching_token();
        tok.transition(TokenStatus::BuyTrigger).unwrap();
        tok.transition(TokenStatus::Bought).unwrap();
        assert_eq!(detector.evaluate(&tok, &point(300, 50.0, 5_000.0), &config()), EntrySignal::None);
    }
}
