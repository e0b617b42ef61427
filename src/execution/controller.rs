use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregator::BarAggregator;
use super::position_state::{CloseOutReport, PositionStateMachine};
use super::tick_buffer::TickBuffer;
use crate::error::Error;
use crate::gateway::ExecutionGateway;
use crate::models::{Bar, PositionState, Signal, Tick, TradeRecord};
use crate::persistence::RunSnapshot;
use crate::settings::StrategyConfig;
use crate::strategy::{build_engine, SignalEngine};
use crate::Result;

/// Log a progress line every this many ticks
const PROGRESS_EVERY: u64 = 20;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// Stop condition reached (or the feed ended) and the run was closed out
    Stopped,
    /// An order (or the close-out) failed; the believed state can no longer be trusted
    Halted,
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// First tick of the run: bars initialised, no signal evaluated
    Initialized,
    /// Tick buffered inside the current bar
    Buffered,
    /// A bar boundary was crossed and the signal evaluated
    Evaluated {
        signal: Signal,
        trade: Option<TradeRecord>,
    },
    /// The stop condition tripped; the feed must halt
    Stopped(CloseOutReport),
}

/// Drives one run: tick buffering, bar boundaries, signals, orders, close-out
///
/// The controller exclusively owns the tick buffer and the position state.
/// Each call to [`on_tick`](Self::on_tick) is one complete step; the caller
/// delivers ticks one at a time in timestamp order.
pub struct LifecycleController<G: ExecutionGateway> {
    config: StrategyConfig,
    engine: Box<dyn SignalEngine>,
    aggregator: BarAggregator,
    ticks: TickBuffer,
    bars: Vec<Bar>,
    most_recent_bar: Option<Bar>,
    positions: PositionStateMachine,
    gateway: G,
    run_start_time: DateTime<Utc>,
    ticks_processed: u64,
    status: RunStatus,
    last_signal: Option<Signal>,
    close_out: Option<CloseOutReport>,
    close_out_failure: Option<String>,
}

impl<G: ExecutionGateway> LifecycleController<G> {
    /// Validate `config` and prepare a run starting now
    pub fn new(config: StrategyConfig, gateway: G) -> Result<Self> {
        config.validate()?;

        let engine = build_engine(&config)?;
        let aggregator = BarAggregator::new(config.granularity(), config.price_field)?;
        let positions = PositionStateMachine::from_config(&config)?;

        tracing::info!(
            instrument = %config.instrument,
            engine = engine.name(),
            granularity_secs = config.granularity_secs,
            trade_size = config.trade_size,
            long_short = config.long_short,
            "Strategy initialised"
        );

        Ok(Self {
            config,
            engine,
            aggregator,
            ticks: TickBuffer::new(),
            bars: Vec::new(),
            most_recent_bar: None,
            positions,
            gateway,
            run_start_time: Utc::now(),
            ticks_processed: 0,
            status: RunStatus::Running,
            last_signal: None,
            close_out: None,
            close_out_failure: None,
        })
    }

    /// Measure the timeout from `start` instead of construction time
    pub fn with_start_time(mut self, start: DateTime<Utc>) -> Self {
        self.run_start_time = start;
        self
    }

    /// Process one tick from the feed
    pub fn on_tick(&mut self, tick: Tick) -> Result<TickOutcome> {
        if self.status != RunStatus::Running {
            return Err(Error::Halted);
        }

        self.ticks.append(tick)?;
        self.ticks_processed += 1;
        self.gateway.mark_price(&self.config.instrument, &tick);

        if self.ticks_processed % PROGRESS_EVERY == 0 {
            tracing::debug!(
                ticks = self.ticks_processed,
                bars = self.bars.len(),
                state = %self.positions.state(),
                "Tick progress"
            );
        }

        let elapsed = tick.timestamp - self.run_start_time;
        if self.config.stop.is_exceeded(self.ticks_processed, elapsed) {
            tracing::info!(
                ticks = self.ticks_processed,
                elapsed_secs = elapsed.num_seconds(),
                "Stop condition reached"
            );
            let report = self.close_out()?;
            return Ok(TickOutcome::Stopped(report));
        }

        let boundary = match self.most_recent_bar {
            None => {
                // First tick only initialises the bar reference
                self.rebuild_bars()?;
                return Ok(TickOutcome::Initialized);
            }
            Some(bar) => bar.start_time + self.aggregator.granularity(),
        };

        if tick.timestamp <= boundary {
            return Ok(TickOutcome::Buffered);
        }

        self.rebuild_bars()?;

        let signal = self.engine.classify(&self.bars);
        self.last_signal = Some(signal);

        let trade = match self
            .positions
            .on_signal(signal, tick.timestamp, &mut self.gateway)
        {
            Ok(trade) => trade,
            Err(e) => {
                if e.is_fatal_to_run() {
                    self.status = RunStatus::Halted;
                    tracing::error!(error = %e, "Halting run after failed transition");
                }
                return Err(e);
            }
        };

        Ok(TickOutcome::Evaluated { signal, trade })
    }

    /// Close out the broker position exactly once
    ///
    /// Later calls return the first report without submitting anything. A
    /// failed close-out halts the run and is never retried: later calls
    /// return [`Error::CloseOutFailed`] and the account must be reconciled
    /// by hand.
    pub fn close_out(&mut self) -> Result<CloseOutReport> {
        if let Some(report) = &self.close_out {
            return Ok(report.clone());
        }
        if let Some(reason) = &self.close_out_failure {
            return Err(Error::CloseOutFailed {
                reason: reason.clone(),
            });
        }

        let timestamp = self
            .ticks
            .last()
            .map(|t| t.timestamp)
            .unwrap_or_else(Utc::now);

        let report = match self.positions.close_out(timestamp, &mut self.gateway) {
            Ok(report) => report,
            Err(e) => {
                self.status = RunStatus::Halted;
                self.close_out_failure = Some(e.to_string());
                tracing::error!(error = %e, "Close-out failed; halting run");
                return Err(e);
            }
        };

        if self.status == RunStatus::Running {
            self.status = RunStatus::Stopped;
        }
        self.close_out = Some(report.clone());

        Ok(report)
    }

    fn rebuild_bars(&mut self) -> Result<()> {
        self.bars = self.aggregator.aggregate(self.ticks.ticks())?;
        self.most_recent_bar = self.bars.last().copied();

        tracing::trace!(
            bars = self.bars.len(),
            most_recent = ?self.most_recent_bar.map(|b| b.start_time),
            "Rebuilt bar series"
        );

        Ok(())
    }

    /// Serializable copy of the run for later inspection
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            saved_at: Utc::now(),
            config: self.config.clone(),
            run_start_time: self.run_start_time,
            status: self.status,
            state: self.positions.state(),
            ticks: self.ticks.ticks().to_vec(),
            bars: self.bars.clone(),
            trades: self.positions.trades().to_vec(),
            close_out: self.close_out.clone(),
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }

    pub fn state(&self) -> PositionState {
        self.positions.state()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn ticks(&self) -> &TickBuffer {
        &self.ticks
    }

    pub fn most_recent_bar(&self) -> Option<&Bar> {
        self.most_recent_bar.as_ref()
    }

    pub fn trades(&self) -> &[TradeRecord] {
        self.positions.trades()
    }

    pub fn last_signal(&self) -> Option<Signal> {
        self.last_signal
    }

    pub fn ticks_processed(&self) -> u64 {
        self.ticks_processed
    }

    pub fn run_start_time(&self) -> DateTime<Utc> {
        self.run_start_time
    }

    pub fn close_out_report(&self) -> Option<&CloseOutReport> {
        self.close_out.as_ref()
    }

    /// Why the close-out failed, if it did
    pub fn close_out_failure(&self) -> Option<&str> {
        self.close_out_failure.as_deref()
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }
}
