use super::{signals::MovingAveragePair, SignalEngine};
use crate::indicators::calculate_sma;
use crate::settings::SignalMethod;
use crate::Result;

/// Simple moving average crossover
///
/// Bullish while the short SMA is above the long SMA, bearish while below.
/// Produces no signal until the series holds more than `long_window` bars.
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    short_window: usize,
    long_window: usize,
    neutral_band: f64,
}

impl SmaCrossover {
    pub fn new(short_window: usize, long_window: usize) -> Result<Self> {
        SignalMethod::Sma {
            short_window,
            long_window,
        }
        .validate()?;

        Ok(Self {
            short_window,
            long_window,
            neutral_band: 0.0,
        })
    }

    pub fn with_neutral_band(mut self, neutral_band: f64) -> Self {
        self.neutral_band = neutral_band;
        self
    }
}

impl SignalEngine for SmaCrossover {
    fn averages(&self, closes: &[f64]) -> Option<MovingAveragePair> {
        Some(MovingAveragePair {
            short: calculate_sma(closes, self.short_window)?,
            long: calculate_sma(closes, self.long_window)?,
        })
    }

    fn warmup_bars(&self) -> usize {
        self.long_window
    }

    fn neutral_band(&self) -> f64 {
        self.neutral_band
    }

    fn name(&self) -> &str {
        "SmaCrossover"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bar, Signal};
    use chrono::{Duration, TimeZone, Utc};

    fn create_test_bars(closes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar::flat(start + Duration::minutes(i as i64), close))
            .collect()
    }

    #[test]
    fn test_rejects_short_not_below_long() {
        assert!(SmaCrossover::new(3, 3).is_err());
        assert!(SmaCrossover::new(0, 3).is_err());
    }

    #[test]
    fn test_not_ready_until_series_exceeds_long_window() {
        let engine = SmaCrossover::new(2, 4).unwrap();

        // Strongly trending data, still NotReady at len == long_window
        for len in 0..=4 {
            let closes: Vec<f64> = (0..len).map(|i| 100.0 + 10.0 * i as f64).collect();
            assert_eq!(engine.classify(&create_test_bars(&closes)), Signal::NotReady);
        }

        let bars = create_test_bars(&[100.0, 110.0, 120.0, 130.0, 140.0]);
        assert_eq!(engine.classify(&bars), Signal::Bullish);
    }

    #[test]
    fn test_bearish_when_short_below_long() {
        let engine = SmaCrossover::new(1, 3).unwrap();
        let bars = create_test_bars(&[1.30, 1.25, 1.20, 1.15]);
        assert_eq!(engine.classify(&bars), Signal::Bearish);
    }

    #[test]
    fn test_neutral_on_equal_averages() {
        let engine = SmaCrossover::new(1, 2).unwrap();
        let bars = create_test_bars(&[1.10, 1.10, 1.10]);
        assert_eq!(engine.classify(&bars), Signal::Neutral);
    }

    #[test]
    fn test_neutral_band_widens_no_action_zone() {
        let engine = SmaCrossover::new(1, 2).unwrap().with_neutral_band(0.01);
        let bars = create_test_bars(&[1.10, 1.10, 1.105]);
        assert_eq!(engine.classify(&bars), Signal::Neutral);
    }

    #[test]
    fn test_classify_does_not_mutate_bars() {
        let engine = SmaCrossover::new(1, 2).unwrap();
        let bars = create_test_bars(&[1.0, 2.0, 3.0]);
        let before = bars.clone();

        engine.classify(&bars);
        assert_eq!(bars, before);
    }
}
