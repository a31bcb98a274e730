//! Position Persistence
//!
//! File-backed position store. Every mutation rewrites the JSON snapshot so
//! open positions survive a restart of the live monitor.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Position;
use crate::ports::{PositionStore, StoreError};

/// Default snapshot file name inside the data directory
pub const DEFAULT_POSITIONS_FILE: &str = "open_positions.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PositionsSnapshot {
    saved_at: DateTime<Utc>,
    positions: Vec<Position>,
}

#[derive(Debug)]
pub struct JsonPositionStore {
    path: PathBuf,
    positions: Mutex<HashMap<String, Position>>,
}

impl JsonPositionStore {
    /// Open the store at `path`, loading any existing snapshot
    pub fn at(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let positions = Self::load(&path)?
            .into_iter()
            .map(|p| (p.token_address.clone(), p))
            .collect::<HashMap<_, _>>();

        if !positions.is_empty() {
            tracing::info!(
                "Recovered {} open position(s) from {}",
                positions.len(),
                path.display()
            );
        }

        Ok(Self {
            path,
            positions: Mutex::new(positions),
        })
    }

    /// Store under the default file name in `data_dir`
    pub fn in_dir(data_dir: &Path) -> Result<Self, StoreError> {
        Self::at(data_dir.join(DEFAULT_POSITIONS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<Vec<Position>, StoreError> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::Persistence(format!("read {}: {}", path.display(), e)))?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let snapshot: PositionsSnapshot = serde_json::from_str(&content)
            .map_err(|e| StoreError::Persistence(format!("corrupted {}: {}", path.display(), e)))?;
        Ok(snapshot.positions)
    }

    fn save(&self, positions: &HashMap<String, Position>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Persistence(format!("create dir: {}", e)))?;
            }
        }

        let mut sorted: Vec<Position> = positions.values().cloned().collect();
        sorted.sort_by(|a, b| a.token_address.cmp(&b.token_address));

        let snapshot = PositionsSnapshot {
            saved_at: Utc::now(),
            positions: sorted,
        };
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| StoreError::Persistence(e.to_string()))?;

        // Readers only ever see a complete snapshot
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| StoreError::Persistence(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::Persistence(e.to_string()))?;
        Ok(())
    }
}

impl PositionStore for JsonPositionStore {
    fn open(&self, position: Position) -> Result<(), StoreError> {
        let mut positions = self.positions.lock().map_err(|_| StoreError::Poisoned)?;
        if positions.contains_key(&position.token_address) {
            return Err(StoreError::AlreadyOpen(position.token_address));
        }
        positions.insert(position.token_address.clone(), position);
        self.save(&positions)
    }

    fn get(&self, address: &str) -> Result<Option<Position>, StoreError> {
        let positions = self.positions.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(positions.get(address).cloned())
    }

    fn update(&self, position: Position) -> Result<(), StoreError> {
        let mut positions = self.positions.lock().map_err(|_| StoreError::Poisoned)?;
        match positions.get_mut(&position.token_address) {
            Some(slot) => {
                if *slot == position {
                    return Ok(());
                }
                *slot = position;
            }
            None => return Err(StoreError::NotFound(position.token_address)),
        }
        self.save(&positions)
    }

    fn close(&self, address: &str) -> Result<Position, StoreError> {
        let mut positions = self.positions.lock().map_err(|_| StoreError::Poisoned)?;
        let position = positions
            .remove(address)
            .ok_or_else(|| StoreError::NotFound(address.to_string()))?;
        self.save(&positions)?;
        Ok(position)
    }

    fn open_positions(&self) -> Result<Vec<Position>, StoreError> {
        let positions = self.positions.lock().map_err(|_| StoreError::Poisoned)?;
        let mut open: Vec<Position> = positions.values().cloned().collect();
        open.sort_by(|a, b| a.token_address.cmp(&b.token_address));
        Ok(open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PricePoint;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn position(address: &str) -> Position {
        let point = PricePoint::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            0.0000082,
            8_200.0,
            5_000.0,
        );
        Position::open(address.to_string(), &point, 25.0, 25.0).unwrap()
    }

    #[test]
    fn test_positions_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = JsonPositionStore::in_dir(dir.path()).unwrap();
            store.open(position("AAA")).unwrap();
            store.open(position("BBB")).unwrap();
            store.close("AAA").unwrap();
        }

        let store = JsonPositionStore::in_dir(dir.path()).unwrap();
        let open = store.open_positions().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].token_address, "BBB");
        assert_eq!(open[0], position("BBB"));
    }

    #[test]
    fn test_update_persists_peak() {
        let dir = tempdir().unwrap();
        let store = JsonPositionStore::in_dir(dir.path()).unwrap();
        let mut pos = position("AAA");
        store.open(pos.clone()).unwrap();

        pos.observe(0.00002);
        store.update(pos.clone()).unwrap();

        let reopened = JsonPositionStore::in_dir(dir.path()).unwrap();
        assert_eq!(reopened.get("AAA").unwrap().unwrap().peak_price, 0.00002);
    }

    #[test]
    fn test_duplicate_open_rejected() {
        let dir = tempdir().unwrap();
        let store = JsonPositionStore::in_dir(dir.path()).unwrap();
        store.open(position("AAA")).unwrap();
        assert!(matches!(store.open(position("AAA")), Err(StoreError::AlreadyOpen(_))));
    }

    #[test]
    fn test_missing_and_empty_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("positions.json");
        let store = JsonPositionStore::at(&path).unwrap();
        assert!(store.open_positions().unwrap().is_empty());

        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "   ").unwrap();
        assert!(JsonPositionStore::at(&path).unwrap().open_positions().unwrap().is_empty());
    }

    #[test]
    fn test_corrupted_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("positions.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(JsonPositionStore::at(&path), Err(StoreError::Persistence(_))));
    }

    #[test]
    fn test_close_unknown() {
        let dir = tempdir().unwrap();
        let store = JsonPositionStore::in_dir(dir.path()).unwrap();
        assert!(matches!(store.close("nope"), Err(StoreError::NotFound(_))));
    }
}
