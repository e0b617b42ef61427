use crate::error::Error;
use crate::models::Tick;
use crate::Result;
use chrono::{DateTime, Utc};

/// Append-only, time-ordered store of raw ticks
///
/// The only mutable record of un-aggregated market data. Owned by the
/// lifecycle controller; bars are always re-derived from it.
#[derive(Debug, Clone, Default)]
pub struct TickBuffer {
    ticks: Vec<Tick>,
}

impl TickBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a buffer from previously recorded ticks
    pub fn from_ticks(ticks: Vec<Tick>) -> Result<Self> {
        let mut buffer = Self::new();
        for tick in ticks {
            buffer.append(tick)?;
        }
        Ok(buffer)
    }

    /// Append a tick
    ///
    /// Timestamps must be non-decreasing; an older tick is rejected and the
    /// buffer is left untouched.
    pub fn append(&mut self, tick: Tick) -> Result<()> {
        if let Some(last) = self.ticks.last() {
            if tick.timestamp < last.timestamp {
                return Err(Error::NonMonotonicTick {
                    previous: last.timestamp,
                    received: tick.timestamp,
                });
            }
        }

        self.ticks.push(tick);
        Ok(())
    }

    /// All ticks, oldest first
    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    /// Ticks with timestamp at or before `cutoff`
    pub fn ticks_until(&self, cutoff: DateTime<Utc>) -> &[Tick] {
        let end = self.ticks.partition_point(|t| t.timestamp <= cutoff);
        &self.ticks[..end]
    }

    pub fn last(&self) -> Option<&Tick> {
        self.ticks.last()
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }
}
