// Historical backtesting over bar series
pub mod history;
pub mod metrics;
pub mod runner;
pub mod synthetic;

pub use history::{HistoricalDataSource, InMemoryHistory};
pub use metrics::{format_ratio, StrategyStatistics};
pub use runner::{BacktestResult, BacktestRunner};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
