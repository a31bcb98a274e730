//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    load_config, BacktestSection, Config, LoaderError, LoggingSection, MonitorSection, DATA_DIR_ENV,
};
