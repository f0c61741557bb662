//! Error types for concord-progression.

use thiserror::Error;

use crate::stage::Stage;

/// Result type for progression operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when advancing a party's progression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A regression or skip was attempted. Never clamped.
    #[error("invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },

    /// The current stage's gating condition is not satisfied.
    #[error("gate not satisfied for leaving {stage}")]
    GateNotSatisfied { stage: Stage },
}
