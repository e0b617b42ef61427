use crate::error::Error;
use crate::models::PriceField;
use crate::Result;
use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix, e.g. `FXBOT_TRADE_SIZE` or `FXBOT_STOP__MAX_TICKS`
const ENV_PREFIX: &str = "FXBOT";

/// Longest supported bar (one calendar month)
const MAX_GRANULARITY_SECS: u64 = 31 * 86_400;

/// Which pair of moving averages drives the signal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalMethod {
    /// Two trailing arithmetic means over bar closes
    Sma {
        short_window: usize,
        long_window: usize,
    },
    /// Two exponentially weighted means parameterised by half-life (in bars)
    Ema {
        short_halflife: f64,
        long_halflife: f64,
        #[serde(default)]
        warmup_bars: Option<usize>,
    },
    /// EMA line as the fast average against an SMA line as the slow one
    EmaSma { ema_halflife: f64, sma_window: usize },
}

impl SignalMethod {
    /// Bars that must be exceeded before a signal is produced
    pub fn warmup_bars(&self) -> usize {
        match self {
            SignalMethod::Sma { long_window, .. } => *long_window,
            SignalMethod::Ema {
                long_halflife,
                warmup_bars,
                ..
            } => warmup_bars.unwrap_or_else(|| long_halflife.ceil() as usize),
            SignalMethod::EmaSma { sma_window, .. } => *sma_window,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SignalMethod::Sma { .. } => "SMA crossover",
            SignalMethod::Ema { .. } => "EMA crossover",
            SignalMethod::EmaSma { .. } => "EMA/SMA hybrid",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            SignalMethod::Sma {
                short_window,
                long_window,
            } => {
                if *short_window == 0 {
                    return Err(Error::configuration("short_window must be at least 1"));
                }
                if short_window >= long_window {
                    return Err(Error::configuration(format!(
                        "short_window ({}) must be strictly less than long_window ({})",
                        short_window, long_window
                    )));
                }
            }
            SignalMethod::Ema {
                short_halflife,
                long_halflife,
                warmup_bars,
            } => {
                check_halflife("short_halflife", *short_halflife)?;
                check_halflife("long_halflife", *long_halflife)?;
                if short_halflife >= long_halflife {
                    return Err(Error::configuration(format!(
                        "short_halflife ({}) must be strictly less than long_halflife ({})",
                        short_halflife, long_halflife
                    )));
                }
                if *warmup_bars == Some(0) {
                    return Err(Error::configuration("warmup_bars must be at least 1"));
                }
            }
            SignalMethod::EmaSma {
                ema_halflife,
                sma_window,
            } => {
                check_halflife("ema_halflife", *ema_halflife)?;
                if *ema_halflife >= *sma_window as f64 {
                    return Err(Error::configuration(format!(
                        "ema_halflife ({}) must be strictly less than sma_window ({})",
                        ema_halflife, sma_window
                    )));
                }
            }
        }
        Ok(())
    }
}

fn seconds_to_duration(secs: u64) -> Option<Duration> {
    i64::try_from(secs).ok().and_then(Duration::try_seconds)
}

fn check_halflife(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::configuration(format!(
            "{} must be a positive number, got {}",
            name, value
        )));
    }
    Ok(())
}

/// When a live run ends. Either limit trips the stop.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StopCondition {
    pub max_ticks: Option<u64>,
    pub timeout_secs: Option<u64>,
}

impl StopCondition {
    pub fn after_ticks(max_ticks: u64) -> Self {
        Self {
            max_ticks: Some(max_ticks),
            timeout_secs: None,
        }
    }

    pub fn after_secs(timeout_secs: u64) -> Self {
        Self {
            max_ticks: None,
            timeout_secs: Some(timeout_secs),
        }
    }

    /// True once more than `max_ticks` ticks were processed or more than
    /// `timeout_secs` elapsed since the run started
    pub fn is_exceeded(&self, ticks_processed: u64, elapsed: Duration) -> bool {
        let ticks_exceeded = self.max_ticks.is_some_and(|max| ticks_processed > max);
        // A timeout beyond the representable range is never reached
        let time_exceeded = self
            .timeout_secs
            .and_then(seconds_to_duration)
            .is_some_and(|limit| elapsed > limit);
        ticks_exceeded || time_exceeded
    }

    fn is_configured(&self) -> bool {
        self.max_ticks.is_some() || self.timeout_secs.is_some()
    }
}

/// Full strategy configuration, validated before any component is built
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyConfig {
    pub instrument: String,
    pub signal: SignalMethod,
    pub granularity_secs: u64,
    pub trade_size: f64,
    /// Whether SHORT entries are permitted
    pub long_short: bool,
    /// Fixed UTC offset used when displaying timestamps, e.g. `-05:00`
    pub timezone: String,
    pub price_field: PriceField,
    /// Averages closer than this are NEUTRAL. Zero means exact equality.
    pub neutral_band: f64,
    pub stop: StopCondition,
    /// Annualisation factor for backtest statistics
    pub periods_per_year: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            instrument: "EUR_USD".to_string(),
            signal: SignalMethod::Sma {
                short_window: 20,
                long_window: 50,
            },
            granularity_secs: 5,
            trade_size: 1000.0,
            long_short: true,
            timezone: "-05:00".to_string(),
            price_field: PriceField::Mid,
            neutral_band: 0.0,
            stop: StopCondition::after_ticks(150),
            periods_per_year: 252.0,
        }
    }
}

impl StrategyConfig {
    /// Load configuration: struct defaults, then the optional TOML file, then
    /// `FXBOT_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;

        tracing::debug!(?config, "Loaded strategy configuration");

        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(toml, ::config::FileFormat::Toml))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Bar duration; zero when `granularity_secs` is out of range, which the
    /// aggregator rejects
    pub fn granularity(&self) -> Duration {
        seconds_to_duration(self.granularity_secs).unwrap_or_else(Duration::zero)
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        self.timezone.parse::<FixedOffset>().map_err(|e| {
            Error::configuration(format!("invalid timezone '{}': {}", self.timezone, e))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.instrument.trim().is_empty() {
            return Err(Error::configuration("instrument must not be empty"));
        }

        self.signal.validate()?;

        if self.granularity_secs == 0 || self.granularity_secs > MAX_GRANULARITY_SECS {
            return Err(Error::configuration(format!(
                "granularity_secs must be between 1 and {}, got {}",
                MAX_GRANULARITY_SECS, self.granularity_secs
            )));
        }
        if !self.trade_size.is_finite() || self.trade_size <= 0.0 {
            return Err(Error::configuration(format!(
                "trade_size must be positive, got {}",
                self.trade_size
            )));
        }
        if !self.neutral_band.is_finite() || self.neutral_band < 0.0 {
            return Err(Error::configuration(format!(
                "neutral_band must be a non-negative number, got {}",
                self.neutral_band
            )));
        }
        if !self.stop.is_configured() {
            return Err(Error::configuration(
                "a stop condition (max_ticks or timeout_secs) is required",
            ));
        }
        if let Some(secs) = self.stop.timeout_secs {
            if seconds_to_duration(secs).is_none() {
                return Err(Error::configuration(format!(
                    "stop.timeout_secs {} is out of range",
                    secs
                )));
            }
        }
        if !self.periods_per_year.is_finite() || self.periods_per_year <= 0.0 {
            return Err(Error::configuration("periods_per_year must be positive"));
        }

        self.utc_offset()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StrategyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.granularity(), Duration::seconds(5));
        assert_eq!(config.utc_offset().unwrap().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_short_window_must_be_below_long_window() {
        let config = StrategyConfig {
            signal: SignalMethod::Sma {
                short_window: 50,
                long_window: 50,
            },
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("strictly less"));
    }

    #[test]
    fn test_short_halflife_must_be_below_long_halflife() {
        let method = SignalMethod::Ema {
            short_halflife: 10.0,
            long_halflife: 5.0,
            warmup_bars: None,
        };
        assert!(method.validate().is_err());

        let hybrid = SignalMethod::EmaSma {
            ema_halflife: 30.0,
            sma_window: 20,
        };
        assert!(hybrid.validate().is_err());
    }

    #[test]
    fn test_rejects_non_positive_trade_size_and_granularity() {
        let config = StrategyConfig {
            trade_size: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StrategyConfig {
            granularity_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_durations() {
        for granularity_secs in [MAX_GRANULARITY_SECS + 1, u64::MAX / 2, u64::MAX] {
            let config = StrategyConfig {
                granularity_secs,
                ..Default::default()
            };
            let err = config.validate().unwrap_err();
            assert!(matches!(err, Error::Configuration { .. }));
            assert_eq!(config.granularity(), Duration::zero());
        }

        let config = StrategyConfig {
            granularity_secs: MAX_GRANULARITY_SECS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = StrategyConfig {
            stop: StopCondition::after_secs(u64::MAX),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_huge_timeout_never_trips() {
        let stop = StopCondition::after_secs(u64::MAX);
        assert!(!stop.is_exceeded(1, Duration::seconds(1)));
        assert!(!stop.is_exceeded(1, Duration::days(365 * 100)));
    }

    #[test]
    fn test_requires_a_stop_condition() {
        let config = StrategyConfig {
            stop: StopCondition::default(),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("stop"));
    }

    #[test]
    fn test_rejects_bad_timezone() {
        let config = StrategyConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_warmup_bars() {
        let ema = SignalMethod::Ema {
            short_halflife: 2.0,
            long_halflife: 7.5,
            warmup_bars: None,
        };
        assert_eq!(ema.warmup_bars(), 8);

        let ema = SignalMethod::Ema {
            short_halflife: 2.0,
            long_halflife: 7.5,
            warmup_bars: Some(30),
        };
        assert_eq!(ema.warmup_bars(), 30);

        let sma = SignalMethod::Sma {
            short_window: 1,
            long_window: 2,
        };
        assert_eq!(sma.warmup_bars(), 2);
    }

    #[test]
    fn test_stop_condition_is_exceeded() {
        let stop = StopCondition::after_ticks(3);
        assert!(!stop.is_exceeded(3, Duration::zero()));
        assert!(stop.is_exceeded(4, Duration::zero()));

        let stop = StopCondition::after_secs(60);
        assert!(!stop.is_exceeded(1_000, Duration::seconds(60)));
        assert!(stop.is_exceeded(1, Duration::seconds(61)));
    }

    #[test]
    fn test_from_toml_str() {
        let toml = r#"
            instrument = "GBP_USD"
            granularity_secs = 60
            trade_size = 10000
            long_short = false

            [signal]
            kind = "ema"
            short_halflife = 3.0
            long_halflife = 12.0

            [stop]
            timeout_secs = 3600
        "#;

        let config = StrategyConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.instrument, "GBP_USD");
        assert_eq!(config.trade_size, 10000.0);
        assert!(!config.long_short);
        assert_eq!(config.stop.timeout_secs, Some(3600));
        assert_eq!(config.stop.max_ticks, None);
        assert_eq!(config.price_field, PriceField::Mid);
        assert!(matches!(config.signal, SignalMethod::Ema { .. }));
    }

    #[test]
    fn test_from_toml_str_rejects_invalid_windows() {
        let toml = r#"
            [signal]
            kind = "sma"
            short_window = 60
            long_window = 20
        "#;

        let err = StrategyConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
