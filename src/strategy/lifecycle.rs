//! Token Lifecycle
//!
//! Owns one token's record and the observations seen for it. Every status
//! change goes through `apply`, which delegates to the token's transition
//! function and logs the edge.

use chrono::{DateTime, Utc};

use crate::domain::{LifecycleError, PricePoint, Token, TokenStatus};

#[derive(Debug, Clone)]
pub struct TokenLifecycle {
    token: Token,
    last_point: Option<PricePoint>,
    observations: u64,
    peak_market_cap: f64,
}

impl TokenLifecycle {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            last_point: None,
            observations: 0,
            peak_market_cap: 0.0,
        }
    }

    /// Rebuild a lifecycle for a token that already holds a position,
    /// walking the legal path so the transition rules stay the single authority.
    pub fn resumed_bought(token: Token) -> Result<Self, LifecycleError> {
        let mut lifecycle = Self::new(token);
        for next in [TokenStatus::Watching, TokenStatus::BuyTrigger, TokenStatus::Bought] {
            lifecycle.token.transition(next)?;
        }
        Ok(lifecycle)
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn address(&self) -> &str {
        &self.token.address
    }

    pub fn status(&self) -> TokenStatus {
        self.token.status()
    }

    pub fn last_point(&self) -> Option<&PricePoint> {
        self.last_point.as_ref()
    }

    pub fn observations(&self) -> u64 {
        self.observations
    }

    pub fn peak_market_cap(&self) -> f64 {
        self.peak_market_cap
    }

    pub fn age_minutes_at(&self, at: DateTime<Utc>) -> f64 {
        self.token.age_minutes_at(at)
    }

    /// Whether `point` is newer than anything seen so far
    pub fn is_fresh(&self, point: &PricePoint) -> bool {
        match &self.last_point {
            Some(last) => point.timestamp > last.timestamp,
            None => true,
        }
    }

    /// Record an observation
    pub fn observe(&mut self, point: &PricePoint) {
        self.observations += 1;
        if point.market_cap > self.peak_market_cap {
            self.peak_market_cap = point.market_cap;
        }
        self.last_point = Some(*point);
    }

    /// Move the token to `next`, returning the previous status
    pub fn apply(&mut self, next: TokenStatus) -> Result<TokenStatus, LifecycleError> {
        let previous = self.token.transition(next)?;
        tracing::info!(
            "{} ({}) {} -> {}",
            self.token.symbol,
            self.token.address,
            previous,
            next
        );
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn lifecycle() -> TokenLifecycle {
        TokenLifecycle::new(Token::new(
            "mint".to_string(),
            "Test".to_string(),
            "TEST".to_string(),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        ))
    }

    fn point(secs: i64, market_cap: f64) -> PricePoint {
        PricePoint::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs),
            market_cap / 1e9,
            market_cap,
            3_000.0,
        )
    }

    #[test]
    fn test_observe_tracks_peak_and_freshness() {
        let mut lc = lifecycle();
        lc.observe(&point(0, 5_000.0));
        lc.observe(&point(10, 12_000.0));
        lc.observe(&point(20, 7_000.0));

        assert_eq!(lc.observations(), 3);
        assert_eq!(lc.peak_market_cap(), 12_000.0);
        assert!(!lc.is_fresh(&point(20, 1.0)));
        assert!(!lc.is_fresh(&point(5, 1.0)));
        assert!(lc.is_fresh(&point(21, 1.0)));
    }

    #[test]
    fn test_apply_goes_through_transition_rules() {
        let mut lc = lifecycle();
        assert_eq!(lc.apply(TokenStatus::Watching), Ok(TokenStatus::New));
        assert!(lc.apply(TokenStatus::Sold).is_err());
        assert_eq!(lc.status(), TokenStatus::Watching);
    }

    #[test]
    fn test_resumed_bought() {
        let token = lifecycle().token().clone();
        let lc = TokenLifecycle::resumed_bought(token).unwrap();
        assert_eq!(lc.status(), TokenStatus::Bought);
    }
}
