//! Strategy Layer - Pullback re-entry on freshly launched tokens
//!
//! - `params`: tunable levels, sizing and limits
//! - `lifecycle`: per-token status and observations
//! - `entry_signal`: spike / pullback / recovery detection
//! - `risk_exit`: prioritized exit rules with momentum-scaled stops and targets
//!
//! Everything here is synchronous and deterministic: given the same sequence
//! of observations it produces the same decisions, live or in a backtest.

pub mod params;
pub mod lifecycle;
pub mod entry_signal;
pub mod risk_exit;

pub use params::{StrategyConfig, ConfigError};
pub use lifecycle::TokenLifecycle;
pub use entry_signal::{
    EntrySignal, EntrySignalDetector, ExpiryReason, BUY_WINDOW_SECS, MOMENTUM_CONFIRM_MAX_SECS,
    MOMENTUM_CONFIRM_MIN_SECS,
};
pub use risk_exit::{exit_confidence, ExitDecision, RiskExitEngine};
