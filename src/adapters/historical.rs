//! Historical replay source
//!
//! Serves recorded histories through the live `PriceSource` interface: each
//! `latest` call advances that token's cursor by one point. Driving the live
//! monitor with this source reproduces a backtest exactly.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{check_ordering, PricePoint, TokenCandidate};
use crate::ports::{PriceSource, PriceSourceError, TokenDiscovery, TokenHistory};

#[derive(Debug)]
pub struct HistoricalPriceSource {
    histories: Vec<TokenHistory>,
    index: HashMap<String, usize>,
    cursors: Mutex<HashMap<String, usize>>,
}

impl HistoricalPriceSource {
    /// Build from in-memory histories; each must be strictly time-ordered
    pub fn new(histories: Vec<TokenHistory>) -> Result<Self, PriceSourceError> {
        let mut index = HashMap::with_capacity(histories.len());
        for (i, history) in histories.iter().enumerate() {
            check_ordering(&history.points).map_err(|at| PriceSourceError::UnorderedHistory {
                address: history.address().to_string(),
                index: at,
            })?;
            if index.insert(history.address().to_string(), i).is_some() {
                return Err(PriceSourceError::ParseError(format!(
                    "duplicate history for {}",
                    history.address()
                )));
            }
        }

        Ok(Self {
            histories,
            index,
            cursors: Mutex::new(HashMap::new()),
        })
    }

    /// Load histories from a JSON array of `{token, points}` records
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PriceSourceError> {
        Self::new(load_histories(path)?)
    }

    pub fn histories(&self) -> &[TokenHistory] {
        &self.histories
    }

    pub fn into_histories(self) -> Vec<TokenHistory> {
        self.histories
    }

    /// Whether every token has been fully replayed
    pub fn is_exhausted(&self) -> bool {
        let cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
        self.histories
            .iter()
            .all(|h| cursors.get(h.address()).copied().unwrap_or(0) >= h.points.len())
    }

    /// Restart every replay from the first point
    pub fn rewind(&self) {
        self.cursors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn lookup(&self, address: &str) -> Result<&TokenHistory, PriceSourceError> {
        self.index
            .get(address)
            .map(|&i| &self.histories[i])
            .ok_or_else(|| PriceSourceError::UnknownToken(address.to_string()))
    }
}

/// Read recorded histories from JSON
pub fn load_histories(path: impl AsRef<Path>) -> Result<Vec<TokenHistory>, PriceSourceError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| PriceSourceError::Unavailable(format!("{}: {}", path.display(), e)))?;
    let histories: Vec<TokenHistory> = serde_json::from_str(&content)
        .map_err(|e| PriceSourceError::ParseError(format!("{}: {}", path.display(), e)))?;

    tracing::info!("Loaded {} token histories from {}", histories.len(), path.display());
    Ok(histories)
}

/// Write histories as JSON, e.g. to keep a synthetic run for later replay
pub fn save_histories(path: impl AsRef<Path>, histories: &[TokenHistory]) -> Result<(), PriceSourceError> {
    let content = serde_json::to_string_pretty(histories)
        .map_err(|e| PriceSourceError::ParseError(e.to_string()))?;
    std::fs::write(path.as_ref(), content)
        .map_err(|e| PriceSourceError::Unavailable(e.to_string()))
}

#[async_trait]
impl PriceSource for HistoricalPriceSource {
    async fn latest(&self, address: &str) -> Result<Option<PricePoint>, PriceSourceError> {
        let history = self.lookup(address)?;
        let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
        let cursor = cursors.entry(address.to_string()).or_insert(0);

        let point = history.points.get(*cursor).copied();
        if point.is_some() {
            *cursor += 1;
        }
        Ok(point)
    }

    async fn history(&self, address: &str) -> Result<Vec<PricePoint>, PriceSourceError> {
        Ok(self.lookup(address)?.points.clone())
    }
}

#[async_trait]
impl TokenDiscovery for HistoricalPriceSource {
    async fn discover(&self) -> Result<Vec<TokenCandidate>, PriceSourceError> {
        Ok(self.histories.iter().map(|h| h.token.clone()).collect())
    }
}
