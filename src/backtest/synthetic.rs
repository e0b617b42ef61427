use crate::execution::aggregator::bucket_start;
use crate::models::Bar;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise
    Uptrend,
    /// Steady downtrend with noise
    Downtrend,
    /// Mean-reverting chop around the starting price
    Sideways,
    /// Every 50th bar is missing from the series
    WithGaps,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 4] = [
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Sideways,
        MarketScenario::WithGaps,
    ];
}

/// Generates synthetic bar series for backtests and demos
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    start: DateTime<Utc>,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 1.10,
            start: Utc.timestamp_opt(1_704_067_200, 0).single().unwrap_or_default(),
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate bars for a specific market scenario
    ///
    /// # Arguments
    /// * `scenario` - The market scenario to simulate
    /// * `num_bars` - Number of bar slots to generate
    /// * `granularity` - Bar duration; the first bar is aligned to it
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        num_bars: usize,
        granularity: Duration,
    ) -> Vec<Bar> {
        let start = bucket_start(self.start, granularity);
        let mut bars = Vec::with_capacity(num_bars);
        let mut price = self.base_price;

        // Drift of 5% over the whole series
        let drift = 0.05 / num_bars.max(1) as f64;

        for i in 0..num_bars {
            let change = match scenario {
                MarketScenario::Uptrend => {
                    price * (drift + self.rng.gen_range(-0.0005..0.0005))
                }
                MarketScenario::Downtrend => {
                    price * (-drift + self.rng.gen_range(-0.0005..0.0005))
                }
                MarketScenario::Sideways | MarketScenario::WithGaps => {
                    let reversion = (self.base_price - price) * 0.1;
                    reversion + price * self.rng.gen_range(-0.002..0.002)
                }
            };
            price += change;

            if scenario == MarketScenario::WithGaps && i % 50 == 49 {
                continue;
            }

            let start_time = start + granularity * i as i32;
            bars.push(self.create_bar(price, start_time));
        }

        bars
    }

    /// Build an OHLC bar around a close price
    fn create_bar(&mut self, close: f64, start_time: DateTime<Utc>) -> Bar {
        let noise_pct = 0.0005;

        let high = close * (1.0 + self.rng.gen_range(0.0..noise_pct));
        let low = close * (1.0 - self.rng.gen_range(0.0..noise_pct));
        let open = (close * (1.0 + self.rng.gen_range(-noise_pct..noise_pct))).clamp(low, high);

        Bar {
            start_time,
            open,
            high,
            low,
            close,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn granularity() -> Duration {
        Duration::days(1)
    }

    #[test]
    fn test_generate_uptrend() {
        let mut gen = SyntheticDataGenerator::new(42);
        let bars = gen.generate(MarketScenario::Uptrend, 500, granularity());

        assert_eq!(bars.len(), 500);

        let first = bars.first().unwrap().close;
        let last = bars.last().unwrap().close;
        assert!(last > first, "Uptrend should end higher: {} -> {}", first, last);
    }

    #[test]
    fn test_generate_downtrend() {
        let mut gen = SyntheticDataGenerator::new(42);
        let bars = gen.generate(MarketScenario::Downtrend, 500, granularity());

        let first = bars.first().unwrap().close;
        let last = bars.last().unwrap().close;
        assert!(last < first, "Downtrend should end lower: {} -> {}", first, last);
    }

    #[test]
    fn test_generate_sideways() {
        let mut gen = SyntheticDataGenerator::new(42);
        let bars = gen.generate(MarketScenario::Sideways, 500, granularity());

        let base = gen.base_price();
        for bar in &bars {
            assert!(
                bar.close > base * 0.95 && bar.close < base * 1.05,
                "Sideways should stay near base: {} vs {}",
                bar.close,
                base
            );
        }
    }

    #[test]
    fn test_generate_with_gaps() {
        let mut gen = SyntheticDataGenerator::new(42);
        let bars = gen.generate(MarketScenario::WithGaps, 100, granularity());

        assert_eq!(bars.len(), 98);
        let has_gap = bars
            .windows(2)
            .any(|pair| pair[1].start_time - pair[0].start_time > granularity());
        assert!(has_gap, "Should contain time gaps");
    }

    #[test]
    fn test_bars_are_aligned_and_sequential() {
        let g = Duration::minutes(5);
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 2, 17).unwrap();
        let mut gen = SyntheticDataGenerator::new(7).with_start(start);
        let bars = gen.generate(MarketScenario::Uptrend, 50, g);

        assert_eq!(bars[0].start_time, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
        for pair in bars.windows(2) {
            assert_eq!(pair[1].start_time - pair[0].start_time, g);
        }
    }

    #[test]
    fn test_ohlc_consistency() {
        let mut gen = SyntheticDataGenerator::new(42);
        let bars = gen.generate(MarketScenario::Sideways, 100, granularity());

        for bar in &bars {
            assert!(bar.high >= bar.close && bar.high >= bar.open);
            assert!(bar.low <= bar.close && bar.low <= bar.open);
        }
    }
}
