use crate::error::Error;
use crate::models::Bar;
use crate::Result;
use chrono::{DateTime, Duration, Utc};

/// Bulk source of historical bars for the backtest path
pub trait HistoricalDataSource {
    /// Bars for `instrument` whose start lies in `[start, end]`, oldest first
    fn fetch_bars(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Duration,
    ) -> Result<Vec<Bar>>;
}

/// Historical bars held in memory for a single instrument
///
/// Missing buckets are forward-filled on fetch so the returned series has
/// uniform spacing, matching what live aggregation produces.
#[derive(Debug, Clone)]
pub struct InMemoryHistory {
    instrument: String,
    granularity: Duration,
    bars: Vec<Bar>,
}

impl InMemoryHistory {
    pub fn new(instrument: impl Into<String>, granularity: Duration, mut bars: Vec<Bar>) -> Result<Self> {
        if granularity <= Duration::zero() {
            return Err(Error::configuration("history granularity must be positive"));
        }

        bars.sort_by_key(|b| b.start_time);
        bars.dedup_by_key(|b| b.start_time);

        Ok(Self {
            instrument: instrument.into(),
            granularity,
            bars,
        })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

impl HistoricalDataSource for InMemoryHistory {
    fn fetch_bars(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Duration,
    ) -> Result<Vec<Bar>> {
        if instrument != self.instrument {
            return Err(Error::insufficient_data(format!(
                "no history for {} (holding {})",
                instrument, self.instrument
            )));
        }
        if granularity != self.granularity {
            return Err(Error::configuration(format!(
                "requested granularity {} does not match stored granularity {}",
                granularity, self.granularity
            )));
        }

        let mut bars: Vec<Bar> = Vec::new();
        for bar in self
            .bars
            .iter()
            .filter(|b| b.start_time >= start && b.start_time <= end)
        {
            if let Some(prev) = bars.last().copied() {
                let mut next = prev.start_time + self.granularity;
                while next < bar.start_time {
                    bars.push(Bar::flat(next, prev.close));
                    next += self.granularity;
                }
            }
            bars.push(*bar);
        }

        if bars.is_empty() {
            return Err(Error::insufficient_data(format!(
                "no {} bars between {} and {}",
                instrument, start, end
            )));
        }

        tracing::debug!(instrument, bars = bars.len(), "Fetched historical bars");

        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn create_test_history(offsets: &[i64]) -> InMemoryHistory {
        let bars = offsets
            .iter()
            .map(|&d| Bar::flat(start() + Duration::days(d), 1.0 + d as f64 * 0.01))
            .collect();
        InMemoryHistory::new("EUR_USD", Duration::days(1), bars).unwrap()
    }

    #[test]
    fn test_filters_by_date_range() {
        let history = create_test_history(&[0, 1, 2, 3, 4]);
        let bars = history
            .fetch_bars("EUR_USD", start() + Duration::days(1), start() + Duration::days(3), Duration::days(1))
            .unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].start_time, start() + Duration::days(1));
    }

    #[test]
    fn test_fills_missing_bars() {
        let history = create_test_history(&[0, 1, 4]);
        let bars = history
            .fetch_bars("EUR_USD", start(), start() + Duration::days(10), Duration::days(1))
            .unwrap();

        assert_eq!(bars.len(), 5);
        assert!(bars[2].is_flat() && bars[3].is_flat());
        assert!((bars[3].close - 1.01).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_wrong_granularity_and_instrument() {
        let history = create_test_history(&[0, 1]);
        let end = start() + Duration::days(1);

        let result = history.fetch_bars("EUR_USD", start(), end, Duration::hours(1));
        assert!(matches!(result, Err(Error::Configuration { .. })));

        let result = history.fetch_bars("GBP_USD", start(), end, Duration::days(1));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_range_is_insufficient_data() {
        let history = create_test_history(&[0, 1]);
        let later = start() + Duration::days(30);

        let result = history.fetch_bars("EUR_USD", later, later, Duration::days(1));
        assert!(matches!(result, Err(Error::InsufficientData { .. })));
    }
}
