use crate::backtest::history::HistoricalDataSource;
use crate::backtest::metrics::StrategyStatistics;
use crate::error::Error;
use crate::execution::PositionStateMachine;
use crate::gateway::PaperGateway;
use crate::models::{Bar, TradeRecord};
use crate::settings::StrategyConfig;
use crate::strategy::{build_engine, SignalEngine};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything a backtest produced
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub engine: String,
    pub bars: Vec<Bar>,
    /// Exposure held at the close of each bar (+1, 0, -1)
    pub exposures: Vec<f64>,
    /// Strategy log return for each bar after the first
    pub strategy_returns: Vec<f64>,
    /// `exp(cumsum(r)) - 1` after each bar after the first
    pub cumulative_returns: Vec<f64>,
    pub trades: Vec<TradeRecord>,
    pub statistics: StrategyStatistics,
}

/// Replays a bar series through the signal engine and position state machine
///
/// Uses the same classification and transition logic as the live path, but
/// skips aggregation: historical bars go in directly. Fills happen at each
/// bar's close on a paper gateway.
pub struct BacktestRunner {
    config: StrategyConfig,
    engine: Box<dyn SignalEngine>,
}

impl BacktestRunner {
    pub fn new(config: StrategyConfig) -> Result<Self> {
        config.validate()?;
        let engine = build_engine(&config)?;
        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Fetch bars from `source` and run over them
    pub fn run_from_source(
        &self,
        source: &dyn HistoricalDataSource,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BacktestResult> {
        let bars = source.fetch_bars(
            &self.config.instrument,
            start,
            end,
            self.config.granularity(),
        )?;
        self.run(&bars)
    }

    /// Run a backtest over `bars`
    ///
    /// # Arguments
    /// * `bars` - Historical bars, oldest first; at least two are needed for a return
    ///
    /// # Returns
    /// Per-bar exposures, shifted log returns and summary statistics
    pub fn run(&self, bars: &[Bar]) -> Result<BacktestResult> {
        if bars.len() < 2 {
            return Err(Error::insufficient_data(format!(
                "backtest needs at least 2 bars, got {}",
                bars.len()
            )));
        }

        tracing::info!(
            instrument = %self.config.instrument,
            engine = self.engine.name(),
            bars = bars.len(),
            "Starting backtest"
        );

        let instrument = self.config.instrument.as_str();
        let mut gateway = PaperGateway::new();
        let mut positions = PositionStateMachine::from_config(&self.config)?;
        let mut exposures = Vec::with_capacity(bars.len());

        for (i, bar) in bars.iter().enumerate() {
            gateway.set_price(instrument, bar.close);

            // Only bars up to and including this one are visible
            let signal = self.engine.classify(&bars[..=i]);
            positions.on_signal(signal, bar.start_time, &mut gateway)?;

            exposures.push(positions.state().exposure());
        }

        let mut strategy_returns = Vec::with_capacity(bars.len() - 1);
        for i in 1..bars.len() {
            let market = (bars[i].close / bars[i - 1].close).ln();
            // Exposure decided at the previous close earns this bar's return
            strategy_returns.push(exposures[i - 1] * market);
        }

        let mut cumulative = 0.0;
        let cumulative_returns = strategy_returns
            .iter()
            .map(|r| {
                cumulative += r;
                cumulative.exp() - 1.0
            })
            .collect();

        if let Some(last) = bars.last() {
            positions.close_out(last.start_time, &mut gateway)?;
        }

        let trades = positions.trades().to_vec();
        let statistics = StrategyStatistics::from_log_returns(
            &strategy_returns,
            self.config.periods_per_year,
            trades.len(),
        );

        tracing::info!(
            engine = self.engine.name(),
            trades = trades.len(),
            total_return = statistics.total_return,
            sharpe = ?statistics.sharpe_ratio,
            "Backtest finished"
        );

        Ok(BacktestResult {
            engine: self.engine.name().to_string(),
            bars: bars.to_vec(),
            exposures,
            strategy_returns,
            cumulative_returns,
            trades,
            statistics,
        })
    }
}
