//! Synthetic launch curves
//!
//! Seeded generator of pump.fun style launch histories: a spike, a plateau,
//! a pullback, then a random walk with occasional breakouts and volume
//! collapses. The same seed always yields the same histories.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::historical::HistoricalPriceSource;
use crate::domain::{PricePoint, TokenCandidate};
use crate::ports::{PriceSourceError, TokenHistory};

/// Circulating supply used to derive prices from market caps
pub const SYNTHETIC_SUPPLY: f64 = 1_000_000_000.0;

const MIN_MARKET_CAP: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    pub seed: u64,
    pub tokens: usize,
    /// Observations per token
    pub points: usize,
    /// Seconds between observations
    pub interval_secs: i64,
    /// Seconds between successive token launches
    pub launch_stagger_secs: i64,
    pub start: DateTime<Utc>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            tokens: 25,
            points: 240,
            interval_secs: 30,
            launch_stagger_secs: 90,
            start: Utc
                .timestamp_opt(1_700_000_000, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticPriceSource {
    config: SyntheticConfig,
}

impl SyntheticPriceSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn with_seed(seed: u64, tokens: usize, points: usize) -> Self {
        Self::new(SyntheticConfig {
            seed,
            tokens,
            points,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Generate every token history
    pub fn generate(&self) -> Vec<TokenHistory> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let histories: Vec<TokenHistory> = (0..self.config.tokens)
            .map(|i| self.generate_token(&mut rng, i))
            .collect();

        tracing::debug!(
            "Generated {} synthetic histories (seed {})",
            histories.len(),
            self.config.seed
        );
        histories
    }

    /// Generated histories wrapped in a replay source
    pub fn into_replay(self) -> Result<HistoricalPriceSource, PriceSourceError> {
        HistoricalPriceSource::new(self.generate())
    }

    fn generate_token(&self, rng: &mut StdRng, index: usize) -> TokenHistory {
        let created_at =
            self.config.start + Duration::seconds(self.config.launch_stagger_secs * index as i64);
        let address = format!("SYN{:04}{:08x}", index, rng.gen::<u32>());
        let symbol = format!("SYN{}", index);

        let curve = LaunchCurve::sample(rng);
        let mut market_cap = curve.launch_cap;
        let mut volume_scale = 1.0;
        let mut points = Vec::with_capacity(self.config.points);

        for step in 0..self.config.points {
            let previous = market_cap;
            market_cap = curve.next_cap(rng, step, market_cap).max(MIN_MARKET_CAP);

            if curve.volume_death_step.is_some_and(|s| step >= s) {
                volume_scale *= 0.7;
            }
            let move_size = ((market_cap - previous) / previous).abs();
            let volume =
                curve.base_volume * (1.0 + move_size * 10.0) * rng.gen_range(0.75..1.3) * volume_scale;

            let timestamp =
                created_at + Duration::seconds(self.config.interval_secs * (step as i64 + 1));
            points.push(PricePoint::new(
                timestamp,
                market_cap / SYNTHETIC_SUPPLY,
                market_cap,
                volume,
            ));
        }

        let candidate = TokenCandidate {
            address,
            name: format!("Synthetic {}", index),
            symbol,
            market_cap: curve.launch_cap,
            price: curve.launch_cap / SYNTHETIC_SUPPLY,
            volume: curve.base_volume,
            created_at,
        };
        TokenHistory::new(candidate, points)
    }
}

/// Shape parameters for one token
///
/// A curve that clears the watch level holds its plateau for at least seven
/// observations, dips below 6K and, unless it fails, reclaims 8K within
/// eight observations of the dip.
#[derive(Debug, Clone)]
struct LaunchCurve {
    launch_cap: f64,
    peak_cap: f64,
    spike_steps: usize,
    plateau_steps: usize,
    pullback_cap: f64,
    pullback_steps: usize,
    recovery_cap: f64,
    recovery_steps: usize,
    drift: f64,
    volatility: f64,
    breakout_step: Option<usize>,
    volume_death_step: Option<usize>,
    base_volume: f64,
}

impl LaunchCurve {
    fn sample(rng: &mut StdRng) -> Self {
        let launch_cap = rng.gen_range(3_000.0..6_000.0);
        // Some launches fizzle below the watch level
        let peak_cap = if rng.gen_bool(0.1) {
            rng.gen_range(6_000.0..9_500.0)
        } else {
            rng.gen_range(12_000.0..40_000.0)
        };
        let spike_steps = rng.gen_range(3..10);
        let plateau_steps = rng.gen_range(7..15);
        let pullback_steps = rng.gen_range(2..5);
        let pullback_cap = rng.gen_range(3_500.0..5_800.0);
        let recovery_steps = rng.gen_range(2..6);
        let recovery_cap = if rng.gen_bool(0.75) {
            rng.gen_range(8_500.0..14_000.0)
        } else {
            rng.gen_range(4_000.0..7_200.0)
        };
        let late = spike_steps + plateau_steps + pullback_steps + recovery_steps;

        Self {
            launch_cap,
            peak_cap,
            spike_steps,
            plateau_steps,
            pullback_cap,
            pullback_steps,
            recovery_cap,
            recovery_steps,
            drift: rng.gen_range(-0.03..0.05),
            volatility: rng.gen_range(0.03..0.12),
            breakout_step: rng.gen_bool(0.15).then(|| late + rng.gen_range(2..30)),
            volume_death_step: rng.gen_bool(0.3).then(|| late + rng.gen_range(5..60)),
            base_volume: rng.gen_range(3_500.0..9_000.0),
        }
    }

    fn next_cap(&self, rng: &mut StdRng, step: usize, current: f64) -> f64 {
        let plateau_end = self.spike_steps + self.plateau_steps;
        let pullback_end = plateau_end + self.pullback_steps;
        let recovery_end = pullback_end + self.recovery_steps;
        let noise = rng.gen_range(-0.03..0.03);

        if step < self.spike_steps {
            let progress = (step + 1) as f64 / self.spike_steps as f64;
            return lerp(self.launch_cap, self.peak_cap, progress) * (1.0 + noise);
        }
        if step < plateau_end {
            return self.peak_cap * (1.0 + noise);
        }
        if step < pullback_end {
            let progress = (step + 1 - plateau_end) as f64 / self.pullback_steps as f64;
            return lerp(self.peak_cap, self.pullback_cap, progress) * (1.0 + noise);
        }
        if step < recovery_end {
            let progress = (step + 1 - pullback_end) as f64 / self.recovery_steps as f64;
            return lerp(self.pullback_cap, self.recovery_cap, progress) * (1.0 + noise);
        }

        let drift = match self.breakout_step {
            Some(s) if step >= s && step < s + 20 => 0.15,
            _ => self.drift,
        };
        let shock = rng.gen_range(-1.0..1.0) * self.volatility;
        current * (drift + shock).exp()
    }
}

fn lerp(from: f64, to: f64, progress: f64) -> f64 {
    from + (to - from) * progress
}
