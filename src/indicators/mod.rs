// Moving averages over bar closes
pub mod moving_average;

pub use moving_average::{calculate_ewma_halflife, calculate_sma, halflife_alpha};
