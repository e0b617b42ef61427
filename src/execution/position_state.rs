use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::executor::{decide, ExecutionAction};
use crate::error::Error;
use crate::gateway::{ExecutionGateway, OrderFill};
use crate::models::{PositionState, Signal, TradeRecord, TradeSide};
use crate::settings::StrategyConfig;
use crate::Result;

/// Unit differences below this are treated as zero when reconciling
const UNITS_TOLERANCE: f64 = 1e-9;

/// Outcome of the terminal close-out
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloseOutReport {
    pub instrument: String,
    /// State the engine believed it held before closing out
    pub believed_state: PositionState,
    pub believed_units: f64,
    /// Net units the broker reported before closing out
    pub queried_units: f64,
    /// True when the broker disagreed with the believed state
    pub mismatch: bool,
    /// The closing order, if one was needed
    pub order: Option<TradeRecord>,
    /// Net units still open after the closing order
    pub residual_units: f64,
}

impl CloseOutReport {
    pub fn has_residual(&self) -> bool {
        self.residual_units.abs() > UNITS_TOLERANCE
    }
}

/// Owns the directional state and the trade log
///
/// Every change of state is exactly one order through the gateway. The state
/// only changes after the gateway confirms the fill.
#[derive(Debug, Clone)]
pub struct PositionStateMachine {
    instrument: String,
    base_size: f64,
    long_short: bool,
    state: PositionState,
    trades: Vec<TradeRecord>,
}

impl PositionStateMachine {
    pub fn new(instrument: impl Into<String>, base_size: f64, long_short: bool) -> Result<Self> {
        if !base_size.is_finite() || base_size <= 0.0 {
            return Err(Error::configuration(format!(
                "trade size must be positive, got {}",
                base_size
            )));
        }

        Ok(Self {
            instrument: instrument.into(),
            base_size,
            long_short,
            state: PositionState::Flat,
            trades: Vec::new(),
        })
    }

    pub fn from_config(config: &StrategyConfig) -> Result<Self> {
        Self::new(config.instrument.clone(), config.trade_size, config.long_short)
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Trade log, oldest first
    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    /// Net units implied by the believed state
    pub fn believed_units(&self) -> f64 {
        self.state.exposure() * self.base_size
    }

    /// Act on a classified signal
    ///
    /// Returns the trade when the state changed. On an execution failure the
    /// error is returned and the state is left as it was.
    pub fn on_signal<G: ExecutionGateway + ?Sized>(
        &mut self,
        signal: Signal,
        timestamp: DateTime<Utc>,
        gateway: &mut G,
    ) -> Result<Option<TradeRecord>> {
        let decision = decide(self.state, signal, self.long_short, self.base_size);

        let (target, units) = match decision.action {
            ExecutionAction::Skip => {
                tracing::debug!(state = %self.state, ?signal, reason = %decision.reason, "No transition");
                return Ok(None);
            }
            ExecutionAction::Execute { target, units } => (target, units),
        };

        let fill = gateway
            .submit_order(&self.instrument, units)
            .map_err(|e| {
                tracing::error!(
                    instrument = %self.instrument,
                    units,
                    from = %self.state,
                    to = %target,
                    error = %e,
                    "Order failed; position state unchanged"
                );
                e
            })?;

        let trade = self.record_fill(timestamp, units, &fill);

        tracing::info!(
            instrument = %self.instrument,
            from = %self.state,
            to = %target,
            units,
            price = trade.fill_price,
            "{}",
            decision.reason
        );

        self.state = target;
        Ok(Some(trade))
    }

    /// Flatten the instrument using the broker's reported position
    ///
    /// The broker's net units are trusted over the believed state: the closing
    /// order is sized to exactly cancel them. The state is reset to FLAT and
    /// any residual left afterwards is reported.
    pub fn close_out<G: ExecutionGateway + ?Sized>(
        &mut self,
        timestamp: DateTime<Utc>,
        gateway: &mut G,
    ) -> Result<CloseOutReport> {
        let believed_state = self.state;
        let believed_units = self.believed_units();

        let queried_units = gateway
            .get_net_positions()?
            .get(&self.instrument)
            .copied()
            .unwrap_or(0.0);

        let mismatch = (queried_units - believed_units).abs() > UNITS_TOLERANCE;
        if mismatch {
            tracing::warn!(
                instrument = %self.instrument,
                believed_state = %believed_state,
                believed_units,
                queried_units,
                "Broker position disagrees with believed state; closing broker position"
            );
        }

        let order = if queried_units.abs() > UNITS_TOLERANCE {
            let units = -queried_units;
            let fill = gateway.submit_order(&self.instrument, units)?;
            Some(self.record_fill(timestamp, units, &fill))
        } else {
            tracing::info!(instrument = %self.instrument, "Nothing to close out");
            None
        };

        self.state = PositionState::Flat;

        let residual_units = gateway
            .get_net_positions()?
            .get(&self.instrument)
            .copied()
            .unwrap_or(0.0);

        let report = CloseOutReport {
            instrument: self.instrument.clone(),
            believed_state,
            believed_units,
            queried_units,
            mismatch,
            order,
            residual_units,
        };

        if report.has_residual() {
            tracing::warn!(
                instrument = %self.instrument,
                residual_units,
                "Position still open after close-out"
            );
        } else {
            tracing::info!(instrument = %self.instrument, "All positions closed out");
        }

        Ok(report)
    }

    fn record_fill(&mut self, timestamp: DateTime<Utc>, units: f64, fill: &OrderFill) -> TradeRecord {
        let partial = (fill.filled_units - units).abs() > UNITS_TOLERANCE;
        if partial {
            tracing::warn!(
                instrument = %self.instrument,
                requested = units,
                filled = fill.filled_units,
                "Partial fill; state moves to the target and close-out reconciles"
            );
        }

        let trade = TradeRecord {
            id: Uuid::new_v4(),
            timestamp: fill.time.unwrap_or(timestamp),
            instrument: self.instrument.clone(),
            side: TradeSide::from_units(units),
            size: fill.filled_units.abs(),
            fill_price: fill.fill_price,
            realized_pl: fill.realized_pl,
            partial,
        };

        self.trades.push(trade.clone());
        trade
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::PaperGateway;

    const INSTRUMENT: &str = "EUR_USD";

    fn setup(long_short: bool) -> (PositionStateMachine, PaperGateway) {
        let machine = PositionStateMachine::new(INSTRUMENT, 1000.0, long_short).unwrap();
        let mut gateway = PaperGateway::new();
        gateway.set_price(INSTRUMENT, 1.10);
        (machine, gateway)
    }

    #[test]
    fn test_rejects_non_positive_trade_size() {
        assert!(PositionStateMachine::new(INSTRUMENT, 0.0, true).is_err());
    }

    #[test]
    fn test_flat_to_long_uses_base_size() {
        let (mut machine, mut gateway) = setup(true);

        let trade = machine
            .on_signal(Signal::Bullish, Utc::now(), &mut gateway)
            .unwrap()
            .unwrap();

        assert_eq!(machine.state(), PositionState::Long);
        assert_eq!(trade.side, TradeSide::Buy);
        assert_eq!(trade.size, 1000.0);
        assert_eq!(trade.fill_price, 1.10);
        assert_eq!(gateway.submitted_orders(), &[(INSTRUMENT.to_string(), 1000.0)]);
    }

    #[test]
    fn test_long_to_short_doubles_size() {
        let (mut machine, mut gateway) = setup(true);
        machine.on_signal(Signal::Bullish, Utc::now(), &mut gateway).unwrap();

        let trade = machine
            .on_signal(Signal::Bearish, Utc::now(), &mut gateway)
            .unwrap()
            .unwrap();

        assert_eq!(machine.state(), PositionState::Short);
        assert_eq!(trade.signed_units(), -2000.0);
        assert_eq!(gateway.get_net_positions().unwrap()[INSTRUMENT], -1000.0);
    }

    #[test]
    fn test_long_only_exits_to_flat() {
        let (mut machine, mut gateway) = setup(false);
        machine.on_signal(Signal::Bullish, Utc::now(), &mut gateway).unwrap();
        machine.on_signal(Signal::Bearish, Utc::now(), &mut gateway).unwrap();

        assert_eq!(machine.state(), PositionState::Flat);
        assert_eq!(machine.trades()[1].signed_units(), -1000.0);

        // Another bearish signal does nothing while flat
        let trade = machine.on_signal(Signal::Bearish, Utc::now(), &mut gateway).unwrap();
        assert!(trade.is_none());
        assert_eq!(machine.trades().len(), 2);
    }

    #[test]
    fn test_neutral_issues_no_order() {
        let (mut machine, mut gateway) = setup(true);
        machine.on_signal(Signal::Bullish, Utc::now(), &mut gateway).unwrap();

        for signal in [Signal::Neutral, Signal::NotReady, Signal::Bullish] {
            assert!(machine.on_signal(signal, Utc::now(), &mut gateway).unwrap().is_none());
        }
        assert_eq!(gateway.submitted_orders().len(), 1);
        assert_eq!(machine.state(), PositionState::Long);
    }

    #[test]
    fn test_execution_failure_leaves_state_unchanged() {
        let (mut machine, mut gateway) = setup(true);
        gateway.reject_next("insufficient margin");

        let result = machine.on_signal(Signal::Bullish, Utc::now(), &mut gateway);
        assert!(matches!(result, Err(Error::Execution { .. })));
        assert_eq!(machine.state(), PositionState::Flat);
        assert!(machine.trades().is_empty());
    }

    #[test]
    fn test_partial_fill_is_flagged_and_reconciled() {
        let (mut machine, mut gateway) = setup(true);
        gateway.limit_next_fill(400.0);

        let trade = machine
            .on_signal(Signal::Bullish, Utc::now(), &mut gateway)
            .unwrap()
            .unwrap();

        assert!(trade.partial);
        assert_eq!(trade.size, 400.0);
        assert_eq!(machine.state(), PositionState::Long);

        let report = machine.close_out(Utc::now(), &mut gateway).unwrap();
        assert!(report.mismatch);
        let order = report.order.as_ref().unwrap();
        assert_eq!(order.signed_units(), -400.0);
        assert!(!order.partial);
        assert!(!report.has_residual());
    }

    #[test]
    fn test_close_out_cancels_broker_position() {
        let (mut machine, mut gateway) = setup(true);
        gateway.set_net_position(INSTRUMENT, 500.0, 1.05);

        let report = machine.close_out(Utc::now(), &mut gateway).unwrap();

        assert_eq!(report.queried_units, 500.0);
        assert_eq!(report.order.as_ref().unwrap().signed_units(), -500.0);
        assert_eq!(gateway.submitted_orders(), &[(INSTRUMENT.to_string(), -500.0)]);
        assert_eq!(machine.state(), PositionState::Flat);
        assert!(!report.has_residual());
    }

    #[test]
    fn test_close_out_trusts_broker_over_believed_state() {
        let (mut machine, mut gateway) = setup(true);
        machine.on_signal(Signal::Bullish, Utc::now(), &mut gateway).unwrap();

        // Someone trimmed the position by hand
        gateway.set_net_position(INSTRUMENT, 400.0, 1.10);

        let report = machine.close_out(Utc::now(), &mut gateway).unwrap();
        assert!(report.mismatch);
        assert_eq!(report.believed_state, PositionState::Long);
        assert_eq!(report.believed_units, 1000.0);
        assert_eq!(report.order.unwrap().signed_units(), -400.0);
        assert_eq!(gateway.get_net_positions().unwrap()[INSTRUMENT], 0.0);
    }

    #[test]
    fn test_close_out_when_flat_submits_nothing() {
        let (mut machine, mut gateway) = setup(true);

        let report = machine.close_out(Utc::now(), &mut gateway).unwrap();
        assert!(report.order.is_none());
        assert!(!report.mismatch);
        assert!(gateway.submitted_orders().is_empty());
    }
}
