//! Token records and the lifecycle state machine
//!
//! ```text
//!   new ──> watching ──> buy_trigger ──> bought ──> sold
//!    │          │             │             ├─────> stopped_out
//!    │          │             │             └─────> emergency_stop
//!    └──────────┴─────────────┴──> expired
//! ```
//!
//! `sold`, `stopped_out`, `emergency_stop` and `expired` are terminal. A token
//! that closed is never reused; re-entry means a fresh `Token`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a tracked token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    New,
    Watching,
    BuyTrigger,
    Bought,
    Sold,
    StoppedOut,
    EmergencyStop,
    Expired,
}

impl TokenStatus {
    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TokenStatus::Sold
                | TokenStatus::StoppedOut
                | TokenStatus::EmergencyStop
                | TokenStatus::Expired
        )
    }

    /// Whether the token may still produce a new entry
    pub fn is_entry_candidate(&self) -> bool {
        matches!(
            self,
            TokenStatus::New | TokenStatus::Watching | TokenStatus::BuyTrigger
        )
    }

    /// Legal edges of the state machine
    pub fn can_transition_to(&self, next: TokenStatus) -> bool {
        use TokenStatus::*;
        matches!(
            (self, next),
            (New, Watching)
                | (Watching, BuyTrigger)
                | (BuyTrigger, Bought)
                | (Bought, Sold)
                | (Bought, StoppedOut)
                | (Bought, EmergencyStop)
                | (New, Expired)
                | (Watching, Expired)
                | (BuyTrigger, Expired)
        )
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenStatus::New => "new",
            TokenStatus::Watching => "watching",
            TokenStatus::BuyTrigger => "buy_trigger",
            TokenStatus::Bought => "bought",
            TokenStatus::Sold => "sold",
            TokenStatus::StoppedOut => "stopped_out",
            TokenStatus::EmergencyStop => "emergency_stop",
            TokenStatus::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("Token {address} is in terminal state {status}")]
    Terminal { address: String, status: TokenStatus },

    #[error("Invalid transition for {address}: {from} -> {to}")]
    InvalidTransition {
        address: String,
        from: TokenStatus,
        to: TokenStatus,
    },
}

/// Candidate reported by the discovery feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenCandidate {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub market_cap: f64,
    pub price: f64,
    pub volume: f64,
    pub created_at: DateTime<Utc>,
}

/// A tracked token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub created_at: DateTime<Utc>,
    status: TokenStatus,
}

impl Token {
    pub fn new(address: String, name: String, symbol: String, created_at: DateTime<Utc>) -> Self {
        Self {
            address,
            name,
            symbol,
            created_at,
            status: TokenStatus::New,
        }
    }

    pub fn status(&self) -> TokenStatus {
        self.status
    }

    /// Age in minutes at the given observation time (never negative)
    pub fn age_minutes_at(&self, at: DateTime<Utc>) -> f64 {
        let secs = (at - self.created_at).num_milliseconds() as f64 / 1000.0;
        secs.max(0.0) / 60.0
    }

    /// The only way to change a token's status
    pub fn transition(&mut self, next: TokenStatus) -> Result<TokenStatus, LifecycleError> {
        if self.status.is_terminal() {
            return Err(LifecycleError::Terminal {
                address: self.address.clone(),
                status: self.status,
            });
        }
        if !self.status.can_transition_to(next) {
            return Err(LifecycleError::InvalidTransition {
                address: self.address.clone(),
                from: self.status,
                to: next,
            });
        }
        let previous = self.status;
        self.status = next;
        Ok(previous)
    }
}

impl From<&TokenCandidate> for Token {
    fn from(candidate: &TokenCandidate) -> Self {
        Token::new(
            candidate.address.clone(),
            candidate.name.clone(),
            candidate.symbol.clone(),
            candidate.created_at,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn token() -> Token {
        Token::new(
            "mint123".to_string(),
            "Test Token".to_string(),
            "TEST".to_string(),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
    }

    #[test]
    fn test_new_token_starts_new() {
        assert_eq!(token().status(), TokenStatus::New);
    }

    #[test]
    fn test_happy_path() {
        let mut t = token();
        assert_eq!(t.transition(TokenStatus::Watching), Ok(TokenStatus::New));
        t.transition(TokenStatus::BuyTrigger).unwrap();
        t.transition(TokenStatus::Bought).unwrap();
        t.transition(TokenStatus::Sold).unwrap();
        assert!(t.status().is_terminal());
    }

    #[test]
    fn test_skipping_states_rejected() {
        let mut t = token();
        let result = t.transition(TokenStatus::Bought);
        assert!(matches!(result, Err(LifecycleError::InvalidTransition { .. })));
        assert_eq!(t.status(), TokenStatus::New);
    }

    #[test]
    fn test_terminal_is_final() {
        let mut t = token();
        t.transition(TokenStatus::Expired).unwrap();
        let result = t.transition(TokenStatus::Watching);
        assert!(matches!(result, Err(LifecycleError::Terminal { .. })));
    }

    #[test]
    fn test_bought_cannot_expire() {
        assert!(!TokenStatus::Bought.can_transition_to(TokenStatus::Expired));
        assert!(TokenStatus::Bought.can_transition_to(TokenStatus::EmergencyStop));
    }

    #[test]
    fn test_age_minutes() {
        let t = token();
        let at = t.created_at + Duration::seconds(90);
        assert!((t.age_minutes_at(at) - 1.5).abs() < 1e-9);
        // Observations before creation clamp to zero
        assert_eq!(t.age_minutes_at(t.created_at - Duration::seconds(30)), 0.0);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TokenStatus::BuyTrigger.to_string(), "buy_trigger");
        assert_eq!(TokenStatus::StoppedOut.to_string(), "stopped_out");
        assert_eq!(TokenStatus::EmergencyStop.to_string(), "emergency_stop");
    }
}
