//! Ports Layer - Trait definitions for external dependencies
//!
//! The core never talks to the outside world directly. These traits abstract:
//! - Token discovery and price observations (`price_source`)
//! - Open-position storage (`position_store`)
//! - Trade and alert persistence (`sink`)

pub mod price_source;
pub mod position_store;
pub mod sink;
pub mod mocks;

pub use price_source::{PriceSource, PriceSourceError, TokenDiscovery, TokenHistory};
pub use position_store::{InMemoryPositionStore, PositionStore, StoreError};
pub use sink::{InMemorySink, SinkError, TradeSink};
