// Core modules
pub mod backtest;
pub mod error;
pub mod execution;
pub mod gateway;
pub mod indicators;
pub mod models;
pub mod persistence;
pub mod settings;
pub mod strategy;

// Re-export commonly used types
pub use error::Error;
pub use models::*;
pub use settings::StrategyConfig;
pub use strategy::SignalEngine;

// Error handling
pub type Result<T> = std::result::Result<T, Error>;
