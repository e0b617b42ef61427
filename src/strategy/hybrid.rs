use super::{signals::MovingAveragePair, SignalEngine};
use crate::indicators::{calculate_ewma_halflife, calculate_sma};
use crate::settings::SignalMethod;
use crate::Result;

/// EMA line against an SMA line
///
/// Long while the EMA is above the SMA, short while below. The SMA window sets
/// the warm-up.
#[derive(Debug, Clone)]
pub struct EmaSmaHybrid {
    ema_halflife: f64,
    sma_window: usize,
    neutral_band: f64,
}

impl EmaSmaHybrid {
    pub fn new(ema_halflife: f64, sma_window: usize) -> Result<Self> {
        SignalMethod::EmaSma {
            ema_halflife,
            sma_window,
        }
        .validate()?;

        Ok(Self {
            ema_halflife,
            sma_window,
            neutral_band: 0.0,
        })
    }

    pub fn with_neutral_band(mut self, neutral_band: f64) -> Self {
        self.neutral_band = neutral_band;
        self
    }
}

impl SignalEngine for EmaSmaHybrid {
    fn averages(&self, closes: &[f64]) -> Option<MovingAveragePair> {
        Some(MovingAveragePair {
            short: calculate_ewma_halflife(closes, self.ema_halflife)?,
            long: calculate_sma(closes, self.sma_window)?,
        })
    }

    fn warmup_bars(&self) -> usize {
        self.sma_window
    }

    fn neutral_band(&self) -> f64 {
        self.neutral_band
    }

    fn name(&self) -> &str {
        "EmaSmaHybrid"
    }
}
