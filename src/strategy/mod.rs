// Trading signal module
pub mod ema_crossover;
pub mod hybrid;
pub mod signals;
pub mod sma_crossover;

pub use ema_crossover::EmaCrossover;
pub use hybrid::EmaSmaHybrid;
pub use signals::{classify_averages, closes, MovingAveragePair};
pub use sma_crossover::SmaCrossover;

use crate::models::{Bar, Signal};
use crate::settings::{SignalMethod, StrategyConfig};
use crate::Result;

/// Moving-average signal engine over bar closes
///
/// Engines are query-only: they never mutate the bars they are given.
pub trait SignalEngine: Send + Sync {
    /// Short and long averages of `closes`, if they can be computed
    fn averages(&self, closes: &[f64]) -> Option<MovingAveragePair>;

    /// Minimum number of bars that must be *exceeded* before a signal is produced
    fn warmup_bars(&self) -> usize;

    /// Averages closer than this are NEUTRAL
    fn neutral_band(&self) -> f64;

    /// Get engine name
    fn name(&self) -> &str;

    /// Classify the relationship of the averages at the last bar
    fn classify(&self, bars: &[Bar]) -> Signal {
        if bars.len() <= self.warmup_bars() {
            return Signal::NotReady;
        }

        match self.averages(&closes(bars)) {
            Some(pair) => classify_averages(pair, self.neutral_band()),
            None => Signal::NotReady,
        }
    }
}

/// Build the engine selected by the configuration
pub fn build_engine(config: &StrategyConfig) -> Result<Box<dyn SignalEngine>> {
    config.signal.validate()?;

    let band = config.neutral_band;
    let engine: Box<dyn SignalEngine> = match config.signal {
        SignalMethod::Sma {
            short_window,
            long_window,
        } => Box::new(SmaCrossover::new(short_window, long_window)?.with_neutral_band(band)),
        SignalMethod::Ema {
            short_halflife,
            long_halflife,
            warmup_bars,
        } => {
            let mut engine = EmaCrossover::new(short_halflife, long_halflife)?;
            if let Some(warmup) = warmup_bars {
                engine = engine.with_warmup_bars(warmup);
            }
            Box::new(engine.with_neutral_band(band))
        }
        SignalMethod::EmaSma {
            ema_halflife,
            sma_window,
        } => Box::new(EmaSmaHybrid::new(ema_halflife, sma_window)?.with_neutral_band(band)),
    };

    tracing::debug!(
        engine = engine.name(),
        warmup_bars = engine.warmup_bars(),
        "Built signal engine"
    );

    Ok(engine)
}
