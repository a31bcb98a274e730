//! Position store port
//!
//! Open positions keyed by token address. Engines receive a store instead of
//! reaching for shared global state, so tests and drivers can choose between
//! the in-memory store and the file-backed one.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use crate::domain::Position;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Position already open for {0}")]
    AlreadyOpen(String),

    #[error("No open position for {0}")]
    NotFound(String),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Persistence error: {0}")]
    Persistence(String),
}

pub trait PositionStore: Send + Sync {
    /// Insert a new position. Fails if the address already has one.
    fn open(&self, position: Position) -> Result<(), StoreError>;

    fn get(&self, address: &str) -> Result<Option<Position>, StoreError>;

    /// Replace an existing open position
    fn update(&self, position: Position) -> Result<(), StoreError>;

    /// Remove and return the open position
    fn close(&self, address: &str) -> Result<Position, StoreError>;

    fn open_positions(&self) -> Result<Vec<Position>, StoreError>;

    fn contains(&self, address: &str) -> Result<bool, StoreError> {
        Ok(self.get(address)?.is_some())
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryPositionStore {
    positions: RwLock<HashMap<String, Position>>,
}

impl InMemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, e.g. with positions recovered from disk
    pub fn with_positions(positions: Vec<Position>) -> Self {
        let map = positions
            .into_iter()
            .map(|p| (p.token_address.clone(), p))
            .collect();
        Self {
            positions: RwLock::new(map),
        }
    }
}

impl PositionStore for InMemoryPositionStore {
    fn open(&self, position: Position) -> Result<(), StoreError> {
        let mut positions = self.positions.write().map_err(|_| StoreError::Poisoned)?;
        if positions.contains_key(&position.token_address) {
            return Err(StoreError::AlreadyOpen(position.token_address));
        }
        positions.insert(position.token_address.clone(), position);
        Ok(())
    }

    fn get(&self, address: &str) -> Result<Option<Position>, StoreError> {
        let positions = self.positions.read().map_err(|_| StoreError::Poisoned)?;
        Ok(positions.get(address).cloned())
    }

    fn update(&self, position: Position) -> Result<(), StoreError> {
        let mut positions = self.positions.write().map_err(|_| StoreError::Poisoned)?;
        match positions.get_mut(&position.token_address) {
            Some(existing) => {
                *existing = position;
                Ok(())
            }
            None => Err(StoreError::NotFound(position.token_address)),
        }
    }

    fn close(&self, address: &str) -> Result<Position, StoreError> {
        let mut positions = self.positions.write().map_err(|_| StoreError::Poisoned)?;
        positions
            .remove(address)
            .ok_or_else(|| StoreError::NotFound(address.to_string()))
    }

    fn open_positions(&self) -> Result<Vec<Position>, StoreError> {
        let positions = self.positions.read().map_err(|_| StoreError::Poisoned)?;
        let mut list: Vec<Position> = positions.values().cloned().collect();
        list.sort_by(|a, b| a.token_address.cmp(&b.token_address));
        Ok(list)
    }
}
