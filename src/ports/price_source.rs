use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{PricePoint, TokenCandidate};

/// Price source error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PriceSourceError {
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    #[error("Data parsing error: {0}")]
    ParseError(String),

    #[error("Invalid history for {address}: point {index} is not after its predecessor")]
    UnorderedHistory { address: String, index: usize },
}

impl PriceSourceError {
    /// Transient failures are retried on the next cycle
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PriceSourceError::Timeout(_)
                | PriceSourceError::RateLimited(_)
                | PriceSourceError::Unavailable(_)
        )
    }
}

/// Full recorded history of one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHistory {
    pub token: TokenCandidate,
    pub points: Vec<PricePoint>,
}

impl TokenHistory {
    pub fn new(token: TokenCandidate, points: Vec<PricePoint>) -> Self {
        Self { token, points }
    }

    pub fn address(&self) -> &str {
        &self.token.address
    }
}

/// Per-token observation feed, live or replayed
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Next observation for a token, `None` if nothing new is available
    async fn latest(&self, address: &str) -> Result<Option<PricePoint>, PriceSourceError>;

    /// Complete ordered history for a token
    async fn history(&self, address: &str) -> Result<Vec<PricePoint>, PriceSourceError>;
}

/// Feed of newly launched tokens
#[async_trait]
pub trait TokenDiscovery: Send + Sync {
    async fn discover(&self) -> Result<Vec<TokenCandidate>, PriceSourceError>;
}
