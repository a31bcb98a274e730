pub mod engine;
pub mod simulator;
pub mod monitor;

pub use engine::{status_for_exit, EngineError, EngineEvent, TokenEngine};
pub use simulator::{
    run_backtest, run_backtest_parallel, BacktestError, BacktestResult, Simulator, TokenReplay,
};
pub use monitor::{CycleReport, LiveMonitor, MonitorError, MonitorSettings};
