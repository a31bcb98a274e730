use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::price_source::{PriceSource, PriceSourceError};
use crate::domain::PricePoint;

/// Scripted reply for one `latest` call
#[derive(Debug, Clone)]
pub enum MockResponse {
    Point(PricePoint),
    Empty,
    Fail(PriceSourceError),
    /// Sleep before answering, used to exercise timeouts
    Delayed(Duration, PricePoint),
}

/// Mock price source that records calls and replays scripted responses per token
#[derive(Debug, Default, Clone)]
pub struct MockPriceSource {
    calls: Arc<Mutex<Vec<String>>>,
    responses: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to queue a response for a given token
    pub fn with_response(self, address: &str, response: MockResponse) -> Self {
        self.push(address, response);
        self
    }

    /// Builder method to queue a sequence of points for a given token
    pub fn with_points(self, address: &str, points: &[PricePoint]) -> Self {
        for point in points {
            self.push(address, MockResponse::Point(*point));
        }
        self
    }

    /// Queue a response after construction
    pub fn push(&self, address: &str, response: MockResponse) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(address.to_string())
            .or_default()
            .push_back(response);
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn next_response(&self, address: &str) -> Option<MockResponse> {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(address)
            .and_then(|queue| queue.pop_front())
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn latest(&self, address: &str) -> Result<Option<PricePoint>, PriceSourceError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(address.to_string());

        match self.next_response(address) {
            Some(MockResponse::Point(point)) => Ok(Some(point)),
            Some(MockResponse::Empty) | None => Ok(None),
            Some(MockResponse::Fail(err)) => Err(err),
            Some(MockResponse::Delayed(delay, point)) => {
                tokio::time::sleep(delay).await;
                Ok(Some(point))
            }
        }
    }

    async fn history(&self, address: &str) -> Result<Vec<PricePoint>, PriceSourceError> {
        Err(PriceSourceError::Unavailable(format!(
            "mock source keeps no history for {}",
            address
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn point() -> PricePoint {
        PricePoint::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap(), 0.001, 10_000.0, 2_000.0)
    }

    #[tokio::test]
    async fn test_mock_replays_in_order() {
        let mock = MockPriceSource::new()
            .with_response("AAA", MockResponse::Point(point()))
            .with_response("AAA", MockResponse::Fail(PriceSourceError::Timeout(10)));

        assert_eq!(mock.latest("AAA").await, Ok(Some(point())));
        assert_eq!(mock.latest("AAA").await, Err(PriceSourceError::Timeout(10)));
        assert_eq!(mock.latest("AAA").await, Ok(None));
        assert_eq!(mock.get_calls(), vec!["AAA", "AAA", "AAA"]);
    }

    #[tokio::test]
    async fn test_mock_history_unavailable() {
        let mock = MockPriceSource::new();
        assert!(mock.history("AAA").await.is_err());
    }
}
