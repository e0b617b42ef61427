use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::controller::{LifecycleController, TickOutcome};
use super::position_state::CloseOutReport;
use crate::gateway::ExecutionGateway;
use crate::models::{PositionState, Tick};
use crate::Result;

/// Seeded random walk of bid/ask quotes
///
/// Stands in for a streaming price source. Ticks arrive at a fixed spacing
/// with a constant spread around a mid that moves by at most `step` per tick.
pub struct SyntheticTickStream {
    rng: StdRng,
    mid: f64,
    spread: f64,
    step: f64,
    spacing: Duration,
    next_at: DateTime<Utc>,
}

impl SyntheticTickStream {
    pub fn new(seed: u64, start: DateTime<Utc>, initial_mid: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            mid: initial_mid,
            spread: 0.0002,
            step: 0.0005,
            spacing: Duration::seconds(1),
            next_at: start,
        }
    }

    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Quote stamped at `timestamp` instead of the next scheduled time
    pub fn next_tick_at(&mut self, timestamp: DateTime<Utc>) -> Tick {
        let change: f64 = self.rng.gen_range(-self.step..=self.step);
        self.mid = (self.mid + change).max(self.spread);

        let half = self.spread / 2.0;
        Tick::new(timestamp, self.mid - half, self.mid + half)
    }
}

impl Iterator for SyntheticTickStream {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        let at = self.next_at;
        self.next_at = at + self.spacing;
        Some(self.next_tick_at(at))
    }
}

/// How a finite replay ended
#[derive(Debug, Clone)]
pub struct ReplaySummary {
    pub ticks_processed: u64,
    pub bars: usize,
    pub trades: usize,
    pub final_state: PositionState,
    pub close_out: CloseOutReport,
    /// True when the stop condition fired before the ticks ran out
    pub stopped_early: bool,
}

/// Push recorded ticks through `controller` until the stop condition fires
/// or the ticks run out; either way the run is closed out
///
/// Out-of-order ticks are logged and skipped. Any other error aborts the
/// replay after attempting a close-out, unless the close-out itself failed.
pub fn replay<G, I>(controller: &mut LifecycleController<G>, ticks: I) -> Result<ReplaySummary>
where
    G: ExecutionGateway,
    I: IntoIterator<Item = Tick>,
{
    let mut stopped_early = false;

    for tick in ticks {
        match controller.on_tick(tick) {
            Ok(TickOutcome::Stopped(_)) => {
                stopped_early = true;
                break;
            }
            Ok(_) => {}
            Err(e @ crate::Error::NonMonotonicTick { .. }) => {
                tracing::warn!(error = %e, "Skipping out-of-order tick");
            }
            Err(e) => {
                if controller.close_out_failure().is_none() {
                    if let Err(close_err) = controller.close_out() {
                        tracing::error!(error = %close_err, "Close-out after failure also failed");
                    }
                }
                return Err(e);
            }
        }
    }

    let close_out = controller.close_out()?;

    let summary = ReplaySummary {
        ticks_processed: controller.ticks_processed(),
        bars: controller.bars().len(),
        trades: controller.trades().len(),
        final_state: controller.state(),
        close_out,
        stopped_early,
    };

    tracing::info!(
        ticks = summary.ticks_processed,
        bars = summary.bars,
        trades = summary.trades,
        stopped_early = summary.stopped_early,
        "Replay finished"
    );

    Ok(summary)
}

/// Stream synthetic ticks into `tx` every `interval`, stamped with wall-clock time
///
/// The task ends when the receiver is dropped.
pub fn spawn_synthetic_feed(
    mut stream: SyntheticTickStream,
    interval: std::time::Duration,
    tx: mpsc::Sender<Tick>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            let tick = stream.next_tick_at(Utc::now());

            if tx.send(tick).await.is_err() {
                tracing::debug!("Tick receiver dropped; stopping synthetic feed");
                break;
            }
        }
    })
}
