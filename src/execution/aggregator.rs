use crate::error::Error;
use crate::models::{Bar, PriceField, Tick};
use crate::Result;
use chrono::{DateTime, Duration, Utc};

/// Start of the fixed-width bucket containing `timestamp`
///
/// Buckets are aligned to the Unix epoch, so a 5-second granularity yields
/// buckets at :00, :05, :10 and so on.
pub fn bucket_start(timestamp: DateTime<Utc>, granularity: Duration) -> DateTime<Utc> {
    let width_ms = granularity.num_milliseconds();
    let into_bucket_ms = timestamp.timestamp_millis().rem_euclid(width_ms);
    let sub_ms_nanos = (timestamp.timestamp_subsec_nanos() % 1_000_000) as i64;

    timestamp - Duration::milliseconds(into_bucket_ms) - Duration::nanoseconds(sub_ms_nanos)
}

/// Resamples ticks into fixed-duration OHLC bars
#[derive(Debug, Clone, Copy)]
pub struct BarAggregator {
    granularity: Duration,
    price_field: PriceField,
}

impl BarAggregator {
    pub fn new(granularity: Duration, price_field: PriceField) -> Result<Self> {
        if granularity.num_milliseconds() <= 0 {
            return Err(Error::configuration(format!(
                "granularity must be at least one millisecond, got {}",
                granularity
            )));
        }

        Ok(Self {
            granularity,
            price_field,
        })
    }

    pub fn granularity(&self) -> Duration {
        self.granularity
    }

    /// Build the complete bar series from `ticks`
    ///
    /// A full re-derivation on every call: the same ticks always produce the
    /// same bars. Buckets without ticks repeat the previous close for all four
    /// prices. Fails with `InsufficientData` when there are no ticks.
    pub fn aggregate(&self, ticks: &[Tick]) -> Result<Vec<Bar>> {
        let first = ticks.first().ok_or_else(|| {
            Error::insufficient_data("cannot aggregate an empty tick buffer")
        })?;

        let mut bars = Vec::new();
        let mut current = Bar::flat(
            bucket_start(first.timestamp, self.granularity),
            first.price(self.price_field),
        );

        for tick in &ticks[1..] {
            let price = tick.price(self.price_field);
            let start = bucket_start(tick.timestamp, self.granularity);

            if start == current.start_time {
                current.high = current.high.max(price);
                current.low = current.low.min(price);
                current.close = price;
                continue;
            }

            if start < current.start_time {
                return Err(Error::NonMonotonicTick {
                    previous: current.start_time,
                    received: tick.timestamp,
                });
            }

            // Close the bucket, then forward-fill any empty buckets in between
            let carried = current.close;
            let mut next = current.start_time + self.granularity;
            bars.push(current);
            while next < start {
                bars.push(Bar::flat(next, carried));
                next += self.granularity;
            }

            current = Bar::flat(start, price);
        }

        bars.push(current);

        tracing::trace!(
            ticks = ticks.len(),
            bars = bars.len(),
            "Aggregated tick buffer"
        );

        Ok(bars)
    }
}

/// Convenience wrapper around [`BarAggregator::aggregate`]
pub fn aggregate(ticks: &[Tick], granularity: Duration, price_field: PriceField) -> Result<Vec<Bar>> {
    BarAggregator::new(granularity, price_field)?.aggregate(ticks)
}
