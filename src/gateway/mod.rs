// Order execution and position inquiry collaborators
pub mod paper;

pub use paper::PaperGateway;

use crate::error::Error;
use crate::models::{NetPositionMap, Tick};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;

/// Order fill as a broker reports it
///
/// Brokers send prices and units either as JSON numbers or numeric strings.
/// Fields other than the ones below are collected in `extra` and dropped
/// when converting into an [`OrderFill`].
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerFill {
    #[serde(deserialize_with = "number_or_string")]
    pub price: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub units: f64,
    #[serde(default, deserialize_with = "optional_number_or_string")]
    pub pl: Option<f64>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub instrument: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    fn parse<E: serde::de::Error>(self) -> std::result::Result<f64, E> {
        match self {
            RawNumber::Number(v) => Ok(v),
            RawNumber::Text(s) => s.trim().parse().map_err(E::custom),
        }
    }
}

fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    RawNumber::deserialize(deserializer)?.parse()
}

fn optional_number_or_string<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawNumber>::deserialize(deserializer)?
        .map(RawNumber::parse)
        .transpose()
}

/// Result of a filled market order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFill {
    pub fill_price: f64,
    pub filled_units: f64,
    pub realized_pl: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

impl OrderFill {
    /// Parse and validate a raw broker fill object
    pub fn from_broker_fields(fields: &Value) -> Result<Self> {
        let fill = BrokerFill::deserialize(fields).map_err(|e| Error::MalformedFill {
            reason: e.to_string(),
        })?;
        Self::try_from(fill)
    }
}

impl TryFrom<BrokerFill> for OrderFill {
    type Error = Error;

    fn try_from(fill: BrokerFill) -> Result<Self> {
        for key in fill.extra.keys() {
            tracing::debug!(field = %key, "Discarding unknown broker fill field");
        }

        if !fill.price.is_finite() || fill.price <= 0.0 {
            return Err(Error::MalformedFill {
                reason: format!("fill price must be positive, got {}", fill.price),
            });
        }
        if !fill.units.is_finite() {
            return Err(Error::MalformedFill {
                reason: format!("fill units are not finite: {}", fill.units),
            });
        }
        if fill.pl.is_some_and(|pl| !pl.is_finite()) {
            return Err(Error::MalformedFill {
                reason: "realised P&L is not finite".to_string(),
            });
        }

        Ok(Self {
            fill_price: fill.price,
            filled_units: fill.units,
            realized_pl: fill.pl,
            time: fill.time,
        })
    }
}

/// Per-instrument position as the broker reports it
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerPosition {
    pub instrument: String,
    /// Units held long (non-negative)
    pub long_units: f64,
    /// Units held short, as a non-negative magnitude
    pub short_units: f64,
}

impl BrokerPosition {
    pub fn net_units(&self) -> f64 {
        self.long_units - self.short_units
    }
}

/// Collapse broker positions into signed net units per instrument
pub fn net_positions_from(positions: &[BrokerPosition]) -> NetPositionMap {
    positions
        .iter()
        .map(|p| (p.instrument.clone(), p.net_units()))
        .collect()
}

/// Market order submission and position inquiry
///
/// Calls are synchronous: the caller does not continue until the fill (or the
/// rejection) is known. Failures are never retried by the core. Implementations
/// deserialize the broker's fill into a [`BrokerFill`] and convert it with
/// `OrderFill::try_from`, so malformed fills surface as `Error::MalformedFill`.
pub trait ExecutionGateway {
    /// Submit a market order for `units` (positive buys, negative sells)
    fn submit_order(&mut self, instrument: &str, units: f64) -> Result<OrderFill>;

    /// Broker-side net units (long minus short) per instrument
    fn get_net_positions(&mut self) -> Result<NetPositionMap>;

    /// Latest quote for the instrument. Live brokers price orders themselves.
    fn mark_price(&mut self, _instrument: &str, _tick: &Tick) {}
}

impl<G: ExecutionGateway + ?Sized> ExecutionGateway for Box<G> {
    fn submit_order(&mut self, instrument: &str, units: f64) -> Result<OrderFill> {
        (**self).submit_order(instrument, units)
    }

    fn get_net_positions(&mut self) -> Result<NetPositionMap> {
        (**self).get_net_positions()
    }

    fn mark_price(&mut self, instrument: &str, tick: &Tick) {
        (**self).mark_price(instrument, tick)
    }
}
