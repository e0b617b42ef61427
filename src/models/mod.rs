use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// A single bid/ask quote from the market data stream
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, bid: f64, ask: f64) -> Self {
        Self { timestamp, bid, ask }
    }

    /// Bid-ask spread
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Mid price: bid plus half the spread
    pub fn mid(&self) -> f64 {
        self.bid + self.spread() / 2.0
    }

    /// Price used for aggregation
    pub fn price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Bid => self.bid,
            PriceField::Ask => self.ask,
            PriceField::Mid => self.mid(),
        }
    }
}

/// Which side of the quote feeds the bar series
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Bid,
    Ask,
    #[default]
    Mid,
}

/// OHLC bar for one fixed-width time bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub start_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    /// Bar with all four prices equal (an empty bucket carrying a close forward)
    pub fn flat(start_time: DateTime<Utc>, price: f64) -> Self {
        Self {
            start_time,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.open == self.close && self.high == self.close && self.low == self.close
    }
}

/// Classification of the moving-average relationship
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Signal {
    Bullish,
    Bearish,
    Neutral,
    /// Not enough bars yet; acted on exactly like `Neutral`
    NotReady,
}

/// Directional exposure held by the strategy
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum PositionState {
    #[default]
    Flat,
    Long,
    Short,
}

impl PositionState {
    /// +1 long, -1 short, 0 flat
    pub fn exposure(&self) -> f64 {
        match self {
            PositionState::Flat => 0.0,
            PositionState::Long => 1.0,
            PositionState::Short => -1.0,
        }
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PositionState::Flat => "FLAT",
            PositionState::Long => "LONG",
            PositionState::Short => "SHORT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn from_units(units: f64) -> Self {
        if units < 0.0 {
            TradeSide::Sell
        } else {
            TradeSide::Buy
        }
    }
}

/// Filled order, appended to the trade log and never modified afterwards
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub instrument: String,
    pub side: TradeSide,
    pub size: f64,
    pub fill_price: f64,
    pub realized_pl: Option<f64>,
    /// The broker filled fewer units than were ordered
    #[serde(default)]
    pub partial: bool,
}

impl TradeRecord {
    /// Units with sign: positive for buys, negative for sells
    pub fn signed_units(&self) -> f64 {
        match self.side {
            TradeSide::Buy => self.size,
            TradeSide::Sell => -self.size,
        }
    }
}

/// Broker-reported net units (long minus short) per instrument
pub type NetPositionMap = HashMap<String, f64>;
