use crate::models::{Bar, Signal};

/// Short and long moving averages at the latest bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAveragePair {
    pub short: f64,
    pub long: f64,
}

/// Extract the close column
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Classify a pair of averages
///
/// BULLISH iff `short - long > band`, BEARISH iff `long - short > band`,
/// NEUTRAL otherwise. With `band == 0.0` only exact equality is NEUTRAL.
pub fn classify_averages(pair: MovingAveragePair, band: f64) -> Signal {
    if !pair.short.is_finite() || !pair.long.is_finite() {
        return Signal::NotReady;
    }

    if pair.short - pair.long > band {
        Signal::Bullish
    } else if pair.long - pair.short > band {
        Signal::Bearish
    } else {
        Signal::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(short: f64, long: f64) -> MovingAveragePair {
        MovingAveragePair { short, long }
    }

    #[test]
    fn test_strict_inequality() {
        assert_eq!(classify_averages(pair(1.2, 1.1), 0.0), Signal::Bullish);
        assert_eq!(classify_averages(pair(1.1, 1.2), 0.0), Signal::Bearish);
        assert_eq!(classify_averages(pair(1.1, 1.1), 0.0), Signal::Neutral);
    }

    #[test]
    fn test_neutral_band() {
        assert_eq!(classify_averages(pair(1.1005, 1.1), 0.001), Signal::Neutral);
        assert_eq!(classify_averages(pair(1.0995, 1.1), 0.001), Signal::Neutral);
        assert_eq!(classify_averages(pair(1.102, 1.1), 0.001), Signal::Bullish);
    }

    #[test]
    fn test_non_finite_averages_are_not_ready() {
        assert_eq!(classify_averages(pair(f64::NAN, 1.0), 0.0), Signal::NotReady);
    }
}
