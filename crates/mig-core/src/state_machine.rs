use crate::error::StateMachineError;
use serde::{Deserialize, Serialize};

/// Negotiation states
///
/// The pending-error hold is not a state of its own; it is the
/// [`ErrorCorrelator`](crate::correlator::ErrorCorrelator) slot being
/// occupied, which can happen in any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    /// Waiting for the partitions question
    DiscoveryPending,
    /// Walking the worker's discovery questions
    DiscoveryActive,
    /// Candidate tree handed to the presenter
    AwaitingSelection,
    /// Selections written, waiting for the worker to re-run
    Applying,
    /// Nothing left to negotiate
    Done,
}

impl NegotiationState {
    /// Whether the negotiator is still in the discovery pass
    #[inline]
    #[must_use]
    pub fn is_discovery(self) -> bool {
        matches!(self, Self::DiscoveryPending | Self::DiscoveryActive)
    }
}

/// Validates a state transition.
///
/// Illegal transitions panic with the `strict-debug` feature so they show up
/// immediately under test; otherwise an error is returned.
pub fn validate_transition(
    from: NegotiationState,
    to: NegotiationState,
) -> Result<(), StateMachineError> {
    if allowed(from, to) {
        Ok(())
    } else {
        #[cfg(feature = "strict-debug")]
        panic!("Illegal state transition attempted: {:?} -> {:?}", from, to);

        Err(StateMachineError::IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: NegotiationState) -> Vec<NegotiationState> {
    use NegotiationState::*;
    match from {
        DiscoveryPending => vec![DiscoveryActive, AwaitingSelection, Done],
        DiscoveryActive => vec![AwaitingSelection, Done],
        AwaitingSelection => vec![Applying],
        Applying => vec![AwaitingSelection, Done],
        Done => vec![],
    }
}

fn allowed(from: NegotiationState, to: NegotiationState) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}
