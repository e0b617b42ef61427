use crate::models::{PositionState, Signal};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExecutionAction {
    /// Move to `target` with a market order for signed `units`
    Execute { target: PositionState, units: f64 },
    Skip,
}

#[derive(Debug, Clone)]
pub struct ExecutionDecision {
    pub action: ExecutionAction,
    pub reason: String,
}

/// State the signal asks for, or `None` when no transition applies
///
/// | current | signal  | long_short | target |
/// |---------|---------|------------|--------|
/// | FLAT    | BULLISH | any        | LONG   |
/// | FLAT    | BEARISH | true       | SHORT  |
/// | LONG    | BEARISH | true       | SHORT  |
/// | LONG    | BEARISH | false      | FLAT   |
/// | SHORT   | BULLISH | any        | LONG   |
///
/// NEUTRAL, NOT READY and same-direction repeats never transition.
pub fn target_state(
    current: PositionState,
    signal: Signal,
    long_short: bool,
) -> Option<PositionState> {
    match (current, signal) {
        (_, Signal::Neutral | Signal::NotReady) => None,
        (PositionState::Long, Signal::Bullish) => None,
        (PositionState::Short, Signal::Bearish) => None,
        (PositionState::Flat | PositionState::Short, Signal::Bullish) => Some(PositionState::Long),
        (PositionState::Flat, Signal::Bearish) if long_short => Some(PositionState::Short),
        (PositionState::Flat, Signal::Bearish) => None,
        (PositionState::Long, Signal::Bearish) if long_short => Some(PositionState::Short),
        (PositionState::Long, Signal::Bearish) => Some(PositionState::Flat),
    }
}

/// Signed units needed to move from one exposure to another
///
/// One `base_size` out of FLAT or into FLAT, twice that on a direct reversal.
pub fn order_units(from: PositionState, to: PositionState, base_size: f64) -> f64 {
    (to.exposure() - from.exposure()) * base_size
}

/// Decide what to do with a signal given the current state
pub fn decide(
    current: PositionState,
    signal: Signal,
    long_short: bool,
    base_size: f64,
) -> ExecutionDecision {
    match target_state(current, signal, long_short) {
        Some(target) => ExecutionDecision {
            action: ExecutionAction::Execute {
                target,
                units: order_units(current, target, base_size),
            },
            reason: format!("{:?} signal moves {} -> {}", signal, current, target),
        },
        None => {
            let reason = match (current, signal) {
                (_, Signal::NotReady) => "Not enough bars for a signal".to_string(),
                (_, Signal::Neutral) => "Averages are level".to_string(),
                (PositionState::Flat, Signal::Bearish) => "Short entries disabled".to_string(),
                _ => format!("Already {}", current),
            };
            ExecutionDecision {
                action: ExecutionAction::Skip,
                reason,
            }
        }
    }
}
