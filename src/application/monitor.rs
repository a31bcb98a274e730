//! Live Monitor
//!
//! Fixed-period driver for the live universe. Each cycle discovers new
//! tokens, fetches the latest observation for every tracked token as an
//! independent task, and feeds it through that token's `TokenEngine`.
//!
//! - Cycles never overlap: a cycle that starts while another is running is
//!   skipped, not queued.
//! - Every external call is bounded by `fetch_timeout`; a failed or slow
//!   token is skipped this cycle and retried on the next.
//! - Each engine sits behind its own mutex, so one address has one writer.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use super::engine::{EngineError, EngineEvent, TokenEngine};
use crate::domain::{Alert, AlertKind, Position, Token, TokenCandidate, TokenStatus, Trade};
use crate::ports::{
    PositionStore, PriceSource, PriceSourceError, SinkError, StoreError, TokenDiscovery, TradeSink,
};
use crate::strategy::{ConfigError, StrategyConfig};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid strategy configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Monitor already running")]
    AlreadyRunning,

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    #[error("Position store error: {0}")]
    Store(#[from] StoreError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Monitor task failed: {0}")]
    Join(String),
}

/// Scheduling parameters
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            fetch_timeout: Duration::from_millis(5_000),
        }
    }
}

/// What a single cycle did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Another cycle held the guard
    pub skipped: bool,
    pub discovered: usize,
    pub processed: usize,
    pub no_data: usize,
    pub failed: usize,
    pub trades: Vec<Trade>,
}

enum TokenOutcome {
    Inactive,
    NoData,
    Failed,
    Processed(Vec<Trade>),
}

#[derive(Clone)]
struct TrackedToken {
    engine: Arc<Mutex<TokenEngine>>,
    emergency: Arc<AtomicBool>,
}

struct RunningTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct LiveMonitor {
    config: StrategyConfig,
    settings: MonitorSettings,
    source: Arc<dyn PriceSource>,
    discovery: Option<Arc<dyn TokenDiscovery>>,
    store: Arc<dyn PositionStore>,
    sink: Arc<dyn TradeSink>,
    tokens: RwLock<HashMap<String, TrackedToken>>,
    /// Addresses whose round trip is already in the sink
    settled: Mutex<HashSet<String>>,
    cycle_guard: Mutex<()>,
    task: Mutex<Option<RunningTask>>,
}

impl LiveMonitor {
    pub fn new(
        config: StrategyConfig,
        settings: MonitorSettings,
        source: Arc<dyn PriceSource>,
        discovery: Option<Arc<dyn TokenDiscovery>>,
        store: Arc<dyn PositionStore>,
        sink: Arc<dyn TradeSink>,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self {
            config,
            settings,
            source,
            discovery,
            store,
            sink,
            tokens: RwLock::new(HashMap::new()),
            settled: Mutex::new(HashSet::new()),
            cycle_guard: Mutex::new(()),
            task: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Start tracking a token. Returns `false` if the address is already known
    /// or its trade has already been recorded.
    ///
    /// A token with a position already in the store resumes in `bought`,
    /// unless the sink already holds the trade that closed it.
    pub async fn add_token(&self, candidate: &TokenCandidate) -> Result<bool, MonitorError> {
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&candidate.address) {
            return Ok(false);
        }
        let mut settled = self.settled.lock().await;
        if settled.contains(&candidate.address) {
            return Ok(false);
        }

        let token = Token::from(candidate);
        let engine = match self.store.get(&candidate.address)? {
            Some(position) if self.sink.has_trade(&candidate.address, position.entry_time)? => {
                tracing::warn!(
                    "{}: trade for position opened {} already recorded, dropping stale position",
                    candidate.symbol,
                    position.entry_time
                );
                self.store.close(&candidate.address)?;
                settled.insert(candidate.address.clone());
                return Ok(false);
            }
            Some(_) => {
                tracing::info!("{}: resuming open position", candidate.symbol);
                TokenEngine::resume_bought(token, self.config.clone())?
            }
            None => TokenEngine::new(token, self.config.clone()),
        };

        tracing::info!(
            "Tracking {} ({}) mc {:.1}K",
            candidate.symbol,
            candidate.address,
            candidate.market_cap / 1000.0
        );

        tokens.insert(
            candidate.address.clone(),
            TrackedToken {
                emergency: engine.emergency_handle(),
                engine: Arc::new(Mutex::new(engine)),
            },
        );
        Ok(true)
    }

    pub async fn tracked_count(&self) -> usize {
        self.tokens.read().await.len()
    }

    /// Status of every tracked token, sorted by address
    pub async fn statuses(&self) -> Vec<(String, TokenStatus)> {
        let tracked: Vec<(String, TrackedToken)> = self
            .tokens
            .read()
            .await
            .iter()
            .map(|(a, t)| (a.clone(), t.clone()))
            .collect();

        let mut statuses = Vec::with_capacity(tracked.len());
        for (address, token) in tracked {
            statuses.push((address, token.engine.lock().await.status()));
        }
        statuses.sort_by(|a, b| a.0.cmp(&b.0));
        statuses
    }

    pub fn get_open_positions(&self) -> Result<Vec<Position>, MonitorError> {
        Ok(self.store.open_positions()?)
    }

    /// Request an emergency exit for `address`.
    ///
    /// The flag is always raised; if the engine is idle the position is closed
    /// immediately at the last observed price, otherwise on its next tick.
    pub async fn emergency_stop(&self, address: &str) -> Result<Option<Trade>, MonitorError> {
        let tracked = self
            .tokens
            .read()
            .await
            .get(address)
            .cloned()
            .ok_or_else(|| MonitorError::UnknownToken(address.to_string()))?;

        tracked.emergency.store(true, Ordering::SeqCst);

        let Ok(mut engine) = tracked.engine.try_lock() else {
            tracing::warn!("{}: engine busy, emergency stop deferred to next tick", address);
            return Ok(None);
        };

        let events = engine.process_emergency(self.store.as_ref())?;
        publish(self.sink.as_ref(), &events);
        Ok(events.iter().find_map(|e| e.trade().cloned()))
    }

    /// Run one monitoring cycle
    pub async fn run_cycle(&self) -> CycleReport {
        let Ok(_guard) = self.cycle_guard.try_lock() else {
            tracing::debug!("Previous cycle still running, skipping");
            return CycleReport {
                skipped: true,
                ..Default::default()
            };
        };

        let mut report = CycleReport {
            discovered: self.discover().await,
            ..Default::default()
        };

        let tracked: Vec<(String, TrackedToken)> = self
            .tokens
            .read()
            .await
            .iter()
            .map(|(a, t)| (a.clone(), t.clone()))
            .collect();

        let mut set = JoinSet::new();
        for (address, token) in tracked {
            let source = Arc::clone(&self.source);
            let store = Arc::clone(&self.store);
            let sink = Arc::clone(&self.sink);
            let timeout = self.settings.fetch_timeout;
            set.spawn(async move {
                process_token(address, token.engine, source, store, sink, timeout).await
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(TokenOutcome::Inactive) => {}
                Ok(TokenOutcome::NoData) => report.no_data += 1,
                Ok(TokenOutcome::Failed) => report.failed += 1,
                Ok(TokenOutcome::Processed(trades)) => {
                    report.processed += 1;
                    report.trades.extend(trades);
                }
                Err(e) => {
                    tracing::warn!("Token task failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        report.trades.sort_by(|a, b| {
            a.exit_time
                .cmp(&b.exit_time)
                .then_with(|| a.token_address.cmp(&b.token_address))
        });

        tracing::debug!(
            "Cycle done: {} processed, {} without data, {} failed, {} trade(s)",
            report.processed,
            report.no_data,
            report.failed,
            report.trades.len()
        );
        report
    }

    async fn discover(&self) -> usize {
        let Some(discovery) = &self.discovery else {
            return 0;
        };

        let candidates = match tokio::time::timeout(self.settings.fetch_timeout, discovery.discover()).await {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => {
                tracing::warn!("Discovery failed: {}", e);
                return 0;
            }
            Err(_) => {
                tracing::warn!("Discovery timed out after {:?}", self.settings.fetch_timeout);
                return 0;
            }
        };

        let mut added = 0;
        for candidate in &candidates {
            match self.add_token(candidate).await {
                Ok(true) => added += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("Cannot track {}: {}", candidate.address, e),
            }
        }
        added
    }

    /// Start the periodic driver
    pub async fn start_monitoring(self: &Arc<Self>) -> Result<(), MonitorError> {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return Err(MonitorError::AlreadyRunning);
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let monitor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.settings.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(
                "Live monitor started (poll {:?}, timeout {:?})",
                monitor.settings.poll_interval,
                monitor.settings.fetch_timeout
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        monitor.run_cycle().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Live monitor stopped");
        });

        *task = Some(RunningTask { shutdown, handle });
        Ok(())
    }

    /// Signal the driver to stop and wait for the in-flight cycle to finish
    pub async fn stop_monitoring(&self) -> Result<(), MonitorError> {
        let Some(running) = self.task.lock().await.take() else {
            return Ok(());
        };
        // Receiver gone means the task already exited
        let _ = running.shutdown.send(true);
        running
            .handle
            .await
            .map_err(|e| MonitorError::Join(e.to_string()))
    }

    pub async fn is_active(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }
}

async fn process_token(
    address: String,
    engine: Arc<Mutex<TokenEngine>>,
    source: Arc<dyn PriceSource>,
    store: Arc<dyn PositionStore>,
    sink: Arc<dyn TradeSink>,
    timeout: Duration,
) -> TokenOutcome {
    if engine.lock().await.status().is_terminal() {
        return TokenOutcome::Inactive;
    }

    let fetched = match tokio::time::timeout(timeout, source.latest(&address)).await {
        Ok(result) => result,
        Err(_) => Err(PriceSourceError::Timeout(timeout.as_millis() as u64)),
    };

    let point = match fetched {
        Ok(Some(point)) => point,
        Ok(None) => return TokenOutcome::NoData,
        Err(e) => {
            tracing::warn!("{}: fetch failed, retrying next cycle: {}", address, e);
            record_alert(
                sink.as_ref(),
                &Alert::new(AlertKind::FetchFailure, format!("{}: {}", address, e)),
            );
            return TokenOutcome::Failed;
        }
    };

    // Store and sink writes may block on the filesystem
    let mut engine = engine.lock_owned().await;
    let stepped = tokio::task::spawn_blocking(move || {
        let events = engine.on_point(&point, store.as_ref())?;
        publish(sink.as_ref(), &events);
        Ok::<_, EngineError>(events)
    })
    .await;

    match stepped {
        Ok(Ok(events)) => {
            TokenOutcome::Processed(events.iter().filter_map(|e| e.trade().cloned()).collect())
        }
        Ok(Err(e)) => {
            tracing::warn!("{}: engine error: {}", address, e);
            TokenOutcome::Failed
        }
        Err(e) => {
            tracing::warn!("{}: engine task failed: {}", address, e);
            TokenOutcome::Failed
        }
    }
}

/// Forward trades and alerts to the sink; sink failures never stop the monitor
fn publish(sink: &dyn TradeSink, events: &[EngineEvent]) {
    for event in events {
        if let Some(trade) = event.trade() {
            match sink.record_trade(trade) {
                Ok(true) => {}
                Ok(false) => tracing::warn!(
                    "{}: trade entered at {} already recorded",
                    trade.token_address,
                    trade.entry_time
                ),
                Err(e) => tracing::warn!("{}: failed to record trade: {}", trade.token_address, e),
            }
        }
        if let Some(alert) = event.to_alert() {
            record_alert(sink, &alert);
        }
    }
}

fn record_alert(sink: &dyn TradeSink, alert: &Alert) {
    if let Err(e) = sink.record_alert(alert) {
        tracing::warn!("Failed to record alert: {}", e);
    }
}
