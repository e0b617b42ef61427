use super::{net_positions_from, BrokerFill, BrokerPosition, ExecutionGateway, OrderFill};
use crate::error::Error;
use crate::models::{NetPositionMap, Tick};
use crate::Result;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
struct PaperPosition {
    units: f64,
    avg_price: f64,
}

/// In-process broker simulation
///
/// Fills market orders at the last price set for the instrument, keeps a
/// signed net book with an average entry price, and reports realised P&L on
/// reducing fills. A rejection or a partial fill can be scripted for the next
/// order.
#[derive(Debug, Default)]
pub struct PaperGateway {
    book: HashMap<String, PaperPosition>,
    prices: HashMap<String, f64>,
    pending_rejection: Option<String>,
    pending_fill_limit: Option<f64>,
    submitted: Vec<(String, f64)>,
}

impl PaperGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the instrument at `price`; subsequent orders fill there
    pub fn set_price(&mut self, instrument: &str, price: f64) {
        self.prices.insert(instrument.to_string(), price);
    }

    pub fn last_price(&self, instrument: &str) -> Option<f64> {
        self.prices.get(instrument).copied()
    }

    /// Reject the next submitted order with `reason`
    pub fn reject_next(&mut self, reason: impl Into<String>) {
        self.pending_rejection = Some(reason.into());
    }

    /// Fill at most `max_units` of the next order
    pub fn limit_next_fill(&mut self, max_units: f64) {
        self.pending_fill_limit = Some(max_units.abs());
    }

    /// Overwrite the book outside the strategy (e.g. a manual trade on the account)
    pub fn set_net_position(&mut self, instrument: &str, units: f64, avg_price: f64) {
        self.book
            .insert(instrument.to_string(), PaperPosition { units, avg_price });
    }

    /// Every order accepted so far, as (instrument, signed units)
    pub fn submitted_orders(&self) -> &[(String, f64)] {
        &self.submitted
    }

    /// Broker-style view of the book
    pub fn positions(&self) -> Vec<BrokerPosition> {
        let mut positions: Vec<BrokerPosition> = self
            .book
            .iter()
            .map(|(instrument, p)| BrokerPosition {
                instrument: instrument.clone(),
                long_units: p.units.max(0.0),
                short_units: (-p.units).max(0.0),
            })
            .collect();
        positions.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        positions
    }

    /// Apply a fill to the book, returning realised P&L if the fill reduced exposure
    fn apply_fill(&mut self, instrument: &str, units: f64, price: f64) -> Option<f64> {
        let position = self.book.entry(instrument.to_string()).or_default();

        let reducing = position.units != 0.0 && position.units.signum() != units.signum();
        let realized = if reducing {
            let closed = units.abs().min(position.units.abs());
            Some((price - position.avg_price) * closed * position.units.signum())
        } else {
            None
        };

        let new_units = position.units + units;
        if new_units == 0.0 {
            position.avg_price = 0.0;
        } else if !reducing {
            // Adding to (or opening) a position
            let cost = position.avg_price * position.units.abs() + price * units.abs();
            position.avg_price = cost / new_units.abs();
        } else if new_units.signum() != position.units.signum() {
            // Flipped through zero; the remainder was opened at this price
            position.avg_price = price;
        }
        position.units = new_units;

        realized
    }
}

impl ExecutionGateway for PaperGateway {
    fn submit_order(&mut self, instrument: &str, units: f64) -> Result<OrderFill> {
        if let Some(reason) = self.pending_rejection.take() {
            tracing::warn!(instrument, units, %reason, "Paper order rejected");
            return Err(Error::Execution {
                instrument: instrument.to_string(),
                units,
                reason,
            });
        }

        if units == 0.0 || !units.is_finite() {
            return Err(Error::Execution {
                instrument: instrument.to_string(),
                units,
                reason: "order units must be non-zero".to_string(),
            });
        }

        let price = self
            .last_price(instrument)
            .ok_or_else(|| Error::Execution {
                instrument: instrument.to_string(),
                units,
                reason: "no price available for instrument".to_string(),
            })?;

        let filled_units = match self.pending_fill_limit.take() {
            Some(max) => units.signum() * units.abs().min(max),
            None => units,
        };

        let realized_pl = self.apply_fill(instrument, filled_units, price);
        self.submitted.push((instrument.to_string(), units));

        tracing::debug!(instrument, units, filled_units, price, ?realized_pl, "Paper order filled");

        OrderFill::try_from(BrokerFill {
            price,
            units: filled_units,
            pl: realized_pl,
            time: None,
            instrument: Some(instrument.to_string()),
            extra: HashMap::new(),
        })
    }

    fn get_net_positions(&mut self) -> Result<NetPositionMap> {
        Ok(net_positions_from(&self.positions()))
    }

    fn mark_price(&mut self, instrument: &str, tick: &Tick) {
        self.set_price(instrument, tick.mid());
    }
}
