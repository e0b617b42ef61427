use chrono::{DateTime, Utc};

/// Every failure the trading core can surface.
///
/// A `NotReady` signal is not an error and lives on [`crate::models::Signal`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("failed to load configuration: {0}")]
    ConfigLoad(#[from] ::config::ConfigError),

    #[error("insufficient data: {reason}")]
    InsufficientData { reason: String },

    #[error("tick at {received} is older than the last buffered tick at {previous}")]
    NonMonotonicTick {
        previous: DateTime<Utc>,
        received: DateTime<Utc>,
    },

    #[error("order for {units} units of {instrument} failed: {reason}")]
    Execution {
        instrument: String,
        units: f64,
        reason: String,
    },

    #[error("malformed broker fill: {reason}")]
    MalformedFill { reason: String },

    #[error("run has stopped; no further ticks are accepted")]
    Halted,

    #[error("close-out already failed ({reason}); reconcile the account manually")]
    CloseOutFailed { reason: String },

    #[error("persistence error: {reason}")]
    Persistence { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Error::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn insufficient_data(reason: impl Into<String>) -> Self {
        Error::InsufficientData {
            reason: reason.into(),
        }
    }

    /// True for failures that leave the believed position state untrustworthy.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, Error::Execution { .. } | Error::MalformedFill { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_message() {
        let err = Error::Execution {
            instrument: "EUR_USD".to_string(),
            units: -2000.0,
            reason: "insufficient margin".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "order for -2000 units of EUR_USD failed: insufficient margin"
        );
        assert!(err.is_fatal_to_run());
    }

    #[test]
    fn test_configuration_error_is_not_run_fatal() {
        let err = Error::configuration("short window must be below long window");
        assert!(err.to_string().contains("short window"));
        assert!(!err.is_fatal_to_run());
    }
}
