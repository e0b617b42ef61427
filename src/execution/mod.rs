// Live execution: tick intake, bar aggregation, state transitions and close-out
pub mod aggregator;
pub mod controller;
pub mod executor;
pub mod feed;
pub mod position_state;
pub mod tick_buffer;

pub use aggregator::{aggregate, bucket_start, BarAggregator};
pub use controller::{LifecycleController, RunStatus, TickOutcome};
pub use executor::{decide, order_units, target_state, ExecutionAction, ExecutionDecision};
pub use feed::{replay, spawn_synthetic_feed, ReplaySummary, SyntheticTickStream};
pub use position_state::{CloseOutReport, PositionStateMachine};
pub use tick_buffer::TickBuffer;
