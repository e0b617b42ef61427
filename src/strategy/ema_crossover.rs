use super::{signals::MovingAveragePair, SignalEngine};
use crate::indicators::calculate_ewma_halflife;
use crate::settings::SignalMethod;
use crate::Result;

/// Exponentially weighted moving average crossover, parameterised by half-lives
///
/// The averages exist from the first bar, but signals are still held back until
/// the series exceeds `warmup_bars` (default: the long half-life rounded up) so
/// that an EMA run warms up the same way an SMA run does.
#[derive(Debug, Clone)]
pub struct EmaCrossover {
    short_halflife: f64,
    long_halflife: f64,
    warmup_bars: usize,
    neutral_band: f64,
}

impl EmaCrossover {
    pub fn new(short_halflife: f64, long_halflife: f64) -> Result<Self> {
        let method = SignalMethod::Ema {
            short_halflife,
            long_halflife,
            warmup_bars: None,
        };
        method.validate()?;

        Ok(Self {
            short_halflife,
            long_halflife,
            warmup_bars: method.warmup_bars(),
            neutral_band: 0.0,
        })
    }

    pub fn with_warmup_bars(mut self, warmup_bars: usize) -> Self {
        self.warmup_bars = warmup_bars.max(1);
        self
    }

    pub fn with_neutral_band(mut self, neutral_band: f64) -> Self {
        self.neutral_band = neutral_band;
        self
    }
}

impl SignalEngine for EmaCrossover {
    fn averages(&self, closes: &[f64]) -> Option<MovingAveragePair> {
        Some(MovingAveragePair {
            short: calculate_ewma_halflife(closes, self.short_halflife)?,
            long: calculate_ewma_halflife(closes, self.long_halflife)?,
        })
    }

    fn warmup_bars(&self) -> usize {
        self.warmup_bars
    }

    fn neutral_band(&self) -> f64 {
        self.neutral_band
    }

    fn name(&self) -> &str {
        "EmaCrossover"
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
            .map(|(i, &close)| Bar::flat(start + Duration::hours(i as i64), close))
            .collect()
    }

    #[test]
    fn test_default_warmup_is_long_halflife_rounded_up() {
        let engine = EmaCrossover::new(1.5, 4.2).unwrap();
        assert_eq!(engine.warmup_bars(), 5);
    }

    #[test]
    fn test_averages_defined_from_first_bar() {
        let engine = EmaCrossover::new(1.0, 3.0).unwrap();
        let pair = engine.averages(&[1.5]).unwrap();
        assert_eq!(pair.short, 1.5);
        assert_eq!(pair.long, 1.5);
    }

    #[test]
    fn test_warmup_gates_signal() {
        let engine = EmaCrossover::new(1.0, 3.0).unwrap();
        let bars = create_test_bars(&[1.0, 2.0, 3.0]);
        assert_eq!(engine.classify(&bars), Signal::NotReady);

        let bars = create_test_bars(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(engine.classify(&bars), Signal::Bullish);
    }

    #[test]
    fn test_downtrend_is_bearish() {
        let engine = EmaCrossover::new(1.0, 4.0).unwrap().with_warmup_bars(2);
        let bars = create_test_bars(&[5.0, 4.0, 3.0, 2.0, 1.0]);
        assert_eq!(engine.classify(&bars), Signal::Bearish);
    }

    #[test]
    fn test_flat_series_is_neutral() {
        let engine = EmaCrossover::new(1.0, 4.0).unwrap().with_warmup_bars(2);
        let bars = create_test_bars(&[2.0; 6]);
        assert_eq!(engine.classify(&bars), Signal::Neutral);
    }
}
