use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::price_point::PricePoint;

/// Peak market cap above which a position enters the breakout phase
pub const BREAKOUT_MARKET_CAP: f64 = 100_000.0;
/// Peak market cap above which a position enters the explosive phase
pub const EXPLOSIVE_MARKET_CAP: f64 = 500_000.0;

/// How far a position has run. Only ever advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumPhase {
    Initial,
    Breakout,
    Explosive,
}

impl MomentumPhase {
    /// Phase implied by a peak market cap
    pub fn for_market_cap(market_cap: f64) -> Self {
        if market_cap > EXPLOSIVE_MARKET_CAP {
            MomentumPhase::Explosive
        } else if market_cap > BREAKOUT_MARKET_CAP {
            MomentumPhase::Breakout
        } else {
            MomentumPhase::Initial
        }
    }

    /// Weight applied to the configured stop distance
    pub fn stop_weight(&self) -> f64 {
        match self {
            MomentumPhase::Initial => 1.0,
            MomentumPhase::Breakout => 0.5,
            MomentumPhase::Explosive => 0.3,
        }
    }

    /// Scale applied to the configured take-profit multiplier
    pub fn target_scale(&self) -> f64 {
        match self {
            MomentumPhase::Initial => 1.0,
            MomentumPhase::Breakout => 1.5,
            MomentumPhase::Explosive => 3.0,
        }
    }
}

impl fmt::Display for MomentumPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MomentumPhase::Initial => write!(f, "initial"),
            MomentumPhase::Breakout => write!(f, "breakout"),
            MomentumPhase::Explosive => write!(f, "explosive"),
        }
    }
}

/// Open position in a single token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub token_address: String,
    pub entry_price: f64,
    pub entry_market_cap: f64,
    pub entry_time: DateTime<Utc>,
    pub quantity: f64,
    /// Static stop derived from the configured stop loss
    pub stop_loss_price: f64,
    /// Trailing stop, follows the peak once momentum builds
    pub trailing_stop_price: f64,
    pub peak_price: f64,
    pub momentum_phase: MomentumPhase,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PositionError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(f64),
    #[error("Invalid entry price: {0}")]
    InvalidEntryPrice(f64),
    #[error("Invalid position size: {0}")]
    InvalidPositionSize(f64),
}

impl Position {
    /// Open a position sized in USD at the given observation
    pub fn open(
        token_address: String,
        point: &PricePoint,
        position_size_usd: f64,
        stop_loss_percent: f64,
    ) -> Result<Self, PositionError> {
        if !point.price.is_finite() || point.price <= 0.0 {
            return Err(PositionError::InvalidEntryPrice(point.price));
        }
        if !position_size_usd.is_finite() || position_size_usd <= 0.0 {
            return Err(PositionError::InvalidPositionSize(position_size_usd));
        }

        let quantity = position_size_usd / point.price;
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(PositionError::InvalidQuantity(quantity));
        }

        let stop_loss_price = point.price * (1.0 - stop_loss_percent / 100.0);

        Ok(Self {
            token_address,
            entry_price: point.price,
            entry_market_cap: point.market_cap,
            entry_time: point.timestamp,
            quantity,
            stop_loss_price,
            trailing_stop_price: stop_loss_price,
            peak_price: point.price,
            momentum_phase: MomentumPhase::Initial,
        })
    }

    /// Tokens per unit of market cap at entry, used to turn prices back into market caps
    pub fn implied_supply(&self) -> f64 {
        if self.entry_price <= f64::EPSILON {
            return 0.0;
        }
        self.entry_market_cap / self.entry_price
    }

    /// Market cap implied by the peak price
    pub fn peak_market_cap(&self) -> f64 {
        self.peak_price * self.implied_supply()
    }

    /// Record a new price. Raises the peak and advances the phase; never regresses either.
    pub fn observe(&mut self, price: f64) {
        if price > self.peak_price {
            self.peak_price = price;
        }
        let implied = MomentumPhase::for_market_cap(self.peak_market_cap());
        if implied > self.momentum_phase {
            self.momentum_phase = implied;
        }
    }

    /// Unrealized PnL in percent; 0 when the entry price is unusable
    pub fn pnl_percent(&self, price: f64) -> f64 {
        if self.entry_price <= f64::EPSILON {
            return 0.0;
        }
        (price - self.entry_price) / self.entry_price * 100.0
    }

    /// Seconds held at the given observation time
    pub fn held_seconds_at(&self, at: DateTime<Utc>) -> i64 {
        (at - self.entry_time).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(price: f64, market_cap: f64) -> PricePoint {
        PricePoint::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            price,
            market_cap,
            5_000.0,
        )
    }

    #[test]
    fn test_open_position() {
        let position = Position::open("mint".to_string(), &point(0.0001, 8_200.0), 25.0, 25.0).unwrap();
        assert!((position.quantity - 250_000.0).abs() < 1e-6);
        assert!((position.stop_loss_price - 0.000075).abs() < 1e-12);
        assert_eq!(position.peak_price, 0.0001);
        assert_eq!(position.momentum_phase, MomentumPhase::Initial);
    }

    #[test]
    fn test_open_invalid_price() {
        let result = Position::open("mint".to_string(), &point(0.0, 8_200.0), 25.0, 25.0);
        assert!(matches!(result, Err(PositionError::InvalidEntryPrice(_))));
    }

    #[test]
    fn test_open_invalid_size() {
        let result = Position::open("mint".to_string(), &point(0.001, 8_200.0), 0.0, 25.0);
        assert!(matches!(result, Err(PositionError::InvalidPositionSize(_))));
    }

    #[test]
    fn test_phase_advances_and_never_regresses() {
        // supply = 1e9 tokens
        let mut position = Position::open("mint".to_string(), &point(0.00001, 10_000.0), 25.0, 25.0).unwrap();

        position.observe(0.00005); // 50K
        assert_eq!(position.momentum_phase, MomentumPhase::Initial);

        position.observe(0.00015); // 150K
        assert_eq!(position.momentum_phase, MomentumPhase::Breakout);

        position.observe(0.00002); // falls back, phase holds
        assert_eq!(position.momentum_phase, MomentumPhase::Breakout);
        assert_eq!(position.peak_price, 0.00015);

        position.observe(0.0006); // 600K
        assert_eq!(position.momentum_phase, MomentumPhase::Explosive);
    }

    #[test]
    fn test_phase_can_jump() {
        let mut position = Position::open("mint".to_string(), &point(0.00001, 10_000.0), 25.0, 25.0).unwrap();
        position.observe(0.001); // 1M
        assert_eq!(position.momentum_phase, MomentumPhase::Explosive);
    }

    #[test]
    fn test_phase_scales() {
        assert_eq!(MomentumPhase::Initial.stop_weight(), 1.0);
        assert_eq!(MomentumPhase::Breakout.stop_weight(), 0.5);
        assert_eq!(MomentumPhase::Explosive.stop_weight(), 0.3);
        assert_eq!(MomentumPhase::Initial.target_scale(), 1.0);
        assert_eq!(MomentumPhase::Breakout.target_scale(), 1.5);
        assert_eq!(MomentumPhase::Explosive.target_scale(), 3.0);
    }

    #[test]
    fn test_pnl_percent_zero_entry() {
        let mut position = Position::open("mint".to_string(), &point(0.001, 10_000.0), 25.0, 25.0).unwrap();
        position.entry_price = 0.0;
        assert_eq!(position.pnl_percent(1.0), 0.0);
        assert_eq!(position.implied_supply(), 0.0);
    }
}
