//! Performance metrics over closed trades and the realized equity curve.

pub mod calculator;

pub use calculator::{MetricsCalculator, PerformanceMetrics};
