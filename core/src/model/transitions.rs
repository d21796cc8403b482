//! Run state transition rules.

use super::run::RunState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: RunState, to: RunState },
    #[error("cannot transition from terminal state {state:?}")]
    FromTerminalState { state: RunState },
}

/// Validate a run state transition.
///
/// `scheduled -> queued -> running -> {succeeded, failed, cancelled}`, with
/// `scheduled -> cancelled` and `queued -> cancelled` permitted directly.
pub fn validate(from: RunState, to: RunState) -> Result<(), TransitionError> {
    if from.is_terminal() {
        return Err(TransitionError::FromTerminalState { state: from });
    }

    let is_valid = match (from, to) {
        (RunState::Scheduled, RunState::Queued) => true,
        (RunState::Queued, RunState::Running) => true,
        (RunState::Scheduled, RunState::Cancelled) => true,
        (RunState::Queued, RunState::Cancelled) => true,
        (RunState::Running, RunState::Succeeded)
        | (RunState::Running, RunState::Failed)
        | (RunState::Running, RunState::Cancelled) => true,
        _ => false,
    };

    if is_valid {
        Ok(())
    } else {
        Err(TransitionError::InvalidTransition { from, to })
    }
}
