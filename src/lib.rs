//! Pullback Sniper - early-launch token trading library
//!
//! Watches freshly launched tokens for an initial spike, waits for the
//! pullback and buys the recovery, then manages the exit with momentum-aware
//! trailing stops. One engine drives both the backtest and the live monitor.
//!
//! # Modules
//!
//! - `domain`: Core types (PricePoint, Token, Position, Trade, EquityCurve)
//! - `ports`: Trait abstractions (PriceSource, PositionStore, TradeSink)
//! - `strategy`: Lifecycle, entry signal detection and risk exits
//! - `adapters`: Historical replay, synthetic data, JSON persistence, CLI
//! - `config`: Configuration loading and validation
//! - `application`: Per-token engine, backtest simulator and live monitor
//! - `metrics`: Performance statistics

pub mod domain;
pub mod ports;
pub mod strategy;
pub mod adapters;
pub mod config;
pub mod application;
pub mod metrics;
