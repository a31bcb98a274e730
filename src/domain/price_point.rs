//! Price observations
//!
//! A `PricePoint` is one price/market-cap/volume sample for a token. A token's
//! history is a strictly time-increasing sequence of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observation of a token's market
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Price per token in USD
    pub price: f64,
    /// Market cap in USD
    pub market_cap: f64,
    /// Trading volume in USD
    pub volume: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64, market_cap: f64, volume: f64) -> Self {
        Self {
            timestamp,
            price,
            market_cap,
            volume,
        }
    }

    /// Market cap expressed in thousands, the unit config thresholds use
    pub fn market_cap_k(&self) -> f64 {
        self.market_cap / 1000.0
    }

    /// A point is usable for decisions only if every field is finite,
    /// price is positive and neither market cap nor volume is negative.
    pub fn is_well_formed(&self) -> bool {
        self.price.is_finite()
            && self.market_cap.is_finite()
            && self.volume.is_finite()
            && self.price > 0.0
            && self.market_cap >= 0.0
            && self.volume >= 0.0
    }
}

/// Check that a sequence is strictly increasing in time.
/// Returns the index of the first offending point.
pub fn check_ordering(points: &[PricePoint]) -> Result<(), usize> {
    for (i, pair) in points.windows(2).enumerate() {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(i + 1);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_market_cap_k() {
        let p = PricePoint::new(t(0), 0.00001, 12_500.0, 3_000.0);
        assert_eq!(p.market_cap_k(), 12.5);
    }

    #[test]
    fn test_well_formed() {
        assert!(PricePoint::new(t(0), 0.001, 10_000.0, 0.0).is_well_formed());
        assert!(!PricePoint::new(t(0), 0.0, 10_000.0, 5.0).is_well_formed());
        assert!(!PricePoint::new(t(0), f64::NAN, 10_000.0, 5.0).is_well_formed());
        assert!(!PricePoint::new(t(0), 0.001, -1.0, 5.0).is_well_formed());
        assert!(!PricePoint::new(t(0), 0.001, 10_000.0, f64::INFINITY).is_well_formed());
    }

    #[test]
    fn test_check_ordering() {
        let ok = vec![
            PricePoint::new(t(0), 1.0, 1.0, 1.0),
            PricePoint::new(t(10), 1.0, 1.0, 1.0),
        ];
        assert!(check_ordering(&ok).is_ok());

        let dup = vec![
            PricePoint::new(t(0), 1.0, 1.0, 1.0),
            PricePoint::new(t(10), 1.0, 1.0, 1.0),
            PricePoint::new(t(10), 1.0, 1.0, 1.0),
        ];
        assert_eq!(check_ordering(&dup), Err(2));

        assert!(check_ordering(&[]).is_ok());
    }
}
