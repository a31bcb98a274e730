//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Historical: replays recorded histories as a live price feed
//! - Synthetic: seeded launch-curve generator for demos and tests
//! - Persistence: JSON-file position store for crash recovery
//! - CLI: Command-line interface handlers

pub mod cli;
pub mod historical;
pub mod persistence;
pub mod synthetic;

pub use cli::CliApp;
pub use historical::{load_histories, save_histories, HistoricalPriceSource};
pub use persistence::{JsonPositionStore, DEFAULT_POSITIONS_FILE};
pub use synthetic::{SyntheticConfig, SyntheticPriceSource, SYNTHETIC_SUPPLY};
