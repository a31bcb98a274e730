//! Age-bucketed volume viability gate
//!
//! Fresh tokens need a minimum amount of trading volume to be considered
//! alive. The minimum depends on how old the token is:
//!
//! | age (min) | minimum volume |
//! |-----------|----------------|
//! | <= 5      | 1,000          |
//! | 5 - 15    | 2,000          |
//! | 15 - 30   | 1,500          |
//! | > 30      | 1,000          |
//!
//! The same gate guards entries and triggers the volume-death exit.

/// Minimum volume for tokens up to 5 minutes old
pub const MIN_VOLUME_LAUNCH: f64 = 1_000.0;
/// Minimum volume for tokens 5-15 minutes old
pub const MIN_VOLUME_EARLY: f64 = 2_000.0;
/// Minimum volume for tokens 15-30 minutes old
pub const MIN_VOLUME_SETTLING: f64 = 1_500.0;
/// Minimum volume for tokens older than 30 minutes
pub const MIN_VOLUME_MATURE: f64 = 1_000.0;

/// Minimum required volume for a token of the given age
pub fn min_volume_for_age(age_minutes: f64) -> f64 {
    if age_minutes <= 5.0 {
        MIN_VOLUME_LAUNCH
    } else if age_minutes <= 15.0 {
        MIN_VOLUME_EARLY
    } else if age_minutes <= 30.0 {
        MIN_VOLUME_SETTLING
    } else {
        MIN_VOLUME_MATURE
    }
}

/// Whether `volume` keeps a token of `age_minutes` viable
pub fn is_volume_viable(age_minutes: f64, volume: f64) -> bool {
    volume.is_finite() && volume >= min_volume_for_age(age_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(min_volume_for_age(0.0), 1_000.0);
        assert_eq!(min_volume_for_age(5.0), 1_000.0);
        assert_eq!(min_volume_for_age(5.01), 2_000.0);
        assert_eq!(min_volume_for_age(15.0), 2_000.0);
        assert_eq!(min_volume_for_age(15.5), 1_500.0);
        assert_eq!(min_volume_for_age(30.0), 1_500.0);
        assert_eq!(min_volume_for_age(31.0), 1_000.0);
        assert_eq!(min_volume_for_age(600.0), 1_000.0);
    }

    #[test]
    fn test_viability() {
        assert!(is_volume_viable(3.0, 1_000.0));
        assert!(!is_volume_viable(3.0, 999.0));
        assert!(!is_volume_viable(10.0, 1_500.0));
        assert!(is_volume_viable(20.0, 1_500.0));
        assert!(!is_volume_viable(20.0, 200.0));
        assert!(!is_volume_viable(20.0, f64::NAN));
    }
}
