//! Error types for window resolution and classification.

use thiserror::Error;

use crate::models::DeadlineType;

/// A due date needed to bound a round is not on record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no {deadline_type:?} deadline recorded for round {round}")]
pub struct MissingDeadlineError {
    pub round: u32,
    pub deadline_type: DeadlineType,
}

/// A round whose status cannot be derived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("round {round} has no resolvable window")]
    Window {
        round: u32,
        #[source]
        source: MissingDeadlineError,
    },
}
