use std::time::Duration;

use thiserror::Error;

use crate::warning::Stage;

/// Failures that abort a reconnaissance run.
///
/// Anything that still leaves a useful partial result is recorded as a
/// [`crate::warning::Warning`] instead and never reaches this type.
#[derive(Debug, Error)]
pub enum ReconError {
    /// The caller handed the pipeline something it cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stage could not run at all, so no partial result is possible.
    #[error("{stage} failed: {reason}")]
    StageFatal { stage: Stage, reason: String },

    #[error("reconnaissance did not finish within {0:?}")]
    DeadlineExceeded(Duration),
}

impl ReconError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn fatal(stage: Stage, reason: impl ToString) -> Self {
        Self::StageFatal {
            stage,
            reason: reason.to_string(),
        }
    }

    /// Whether the failure was caused by the caller rather than the infrastructure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
