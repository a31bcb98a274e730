//! Strategy Parameters
//!
//! The tunable parameters shared by the live monitor and the backtester.
//! Market-cap levels are expressed in thousands of USD ("K").

use serde::{Deserialize, Serialize};

/// Main strategy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Market cap (K) a token must reach before it is watched
    pub watch_threshold_k: f64,
    /// Market cap (K) the pullback must reach to arm the buy
    pub buy_trigger_k: f64,
    /// Market cap (K) the recovery must reach to buy
    pub buy_price_k: f64,
    /// Take-profit as a multiple of entry price (2.0 = double)
    pub take_profit_multiplier: f64,
    /// Stop loss as a percentage drop from entry (0-100)
    pub stop_loss_percent: f64,
    /// Position size in USD
    pub position_size_usd: f64,
    /// Tokens older than this are not eligible for entries
    pub max_age_minutes: f64,
    /// Force exit after holding this long
    pub max_hold_seconds: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            watch_threshold_k: 10.0,
            buy_trigger_k: 6.0,
            buy_price_k: 8.0,
            take_profit_multiplier: 2.0,
            stop_loss_percent: 25.0,
            position_size_usd: 25.0,
            max_age_minutes: 60.0,
            max_hold_seconds: 1_800, // 30 minutes
        }
    }
}

impl StrategyConfig {
    /// Override the three entry levels at once
    pub fn with_levels(mut self, watch_k: f64, trigger_k: f64, buy_k: f64) -> Self {
        self.watch_threshold_k = watch_k;
        self.buy_trigger_k = trigger_k;
        self.buy_price_k = buy_k;
        self
    }

    pub fn with_take_profit(mut self, multiplier: f64) -> Self {
        self.take_profit_multiplier = multiplier;
        self
    }

    pub fn with_stop_loss(mut self, percent: f64) -> Self {
        self.stop_loss_percent = percent;
        self
    }

    pub fn with_position_size(mut self, usd: f64) -> Self {
        self.position_size_usd = usd;
        self
    }

    pub fn with_max_hold(mut self, seconds: u64) -> Self {
        self.max_hold_seconds = seconds;
        self
    }

    pub fn with_max_age(mut self, minutes: f64) -> Self {
        self.max_age_minutes = minutes;
        self
    }

    /// Watch threshold in USD
    pub fn watch_threshold_usd(&self) -> f64 {
        self.watch_threshold_k * 1000.0
    }

    /// Buy trigger in USD
    pub fn buy_trigger_usd(&self) -> f64 {
        self.buy_trigger_k * 1000.0
    }

    /// Buy price level in USD
    pub fn buy_price_usd(&self) -> f64 {
        self.buy_price_k * 1000.0
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let levels = [self.watch_threshold_k, self.buy_trigger_k, self.buy_price_k];
        if levels.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(ConfigError::InvalidLevel(format!(
                "levels must be positive, got watch={} trigger={} buy={}",
                self.watch_threshold_k, self.buy_trigger_k, self.buy_price_k
            )));
        }
        if self.buy_trigger_k >= self.watch_threshold_k {
            return Err(ConfigError::TriggerAboveWatch {
                trigger: self.buy_trigger_k,
                watch: self.watch_threshold_k,
            });
        }
        if self.buy_price_k < self.buy_trigger_k || self.buy_price_k > self.watch_threshold_k {
            return Err(ConfigError::BuyPriceOutOfRange {
                buy: self.buy_price_k,
                trigger: self.buy_trigger_k,
                watch: self.watch_threshold_k,
            });
        }
        if !self.take_profit_multiplier.is_finite() || self.take_profit_multiplier < 1.0 {
            return Err(ConfigError::InvalidTakeProfit(self.take_profit_multiplier));
        }
        if !self.stop_loss_percent.is_finite()
            || self.stop_loss_percent <= 0.0
            || self.stop_loss_percent >= 100.0
        {
            return Err(ConfigError::InvalidStopLoss(self.stop_loss_percent));
        }
        if !self.position_size_usd.is_finite() || self.position_size_usd <= 0.0 {
            return Err(ConfigError::InvalidPositionSize(self.position_size_usd));
        }
        if !self.max_age_minutes.is_finite() || self.max_age_minutes <= 0.0 {
            return Err(ConfigError::InvalidMaxAge(self.max_age_minutes));
        }
        if self.max_hold_seconds == 0 {
            return Err(ConfigError::InvalidMaxHold(self.max_hold_seconds));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid market cap level: {0}")]
    InvalidLevel(String),
    #[error("Buy trigger {trigger}K must be below watch threshold {watch}K")]
    TriggerAboveWatch { trigger: f64, watch: f64 },
    #[error("Buy price {buy}K must lie between trigger {trigger}K and watch {watch}K")]
    BuyPriceOutOfRange { buy: f64, trigger: f64, watch: f64 },
    #[error("Invalid take profit multiplier: {0} (must be >= 1)")]
    InvalidTakeProfit(f64),
    #[error("Invalid stop loss: {0}% (must be 0 < loss < 100)")]
    InvalidStopLoss(f64),
    #[error("Invalid position size: ${0} (must be > 0)")]
    InvalidPositionSize(f64),
    #[error("Invalid max token age: {0} minutes (must be > 0)")]
    InvalidMaxAge(f64),
    #[error("Invalid max hold: {0} seconds (must be > 0)")]
    InvalidMaxHold(u64),
}
