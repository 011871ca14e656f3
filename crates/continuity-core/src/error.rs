//! Error taxonomy for the continuity engine.
//!
//! None of these is fatal to the process: validation errors are returned to the
//! caller, collaborator errors degrade the enclosing operation, and persistence
//! errors leave the affected store empty with a warning.

use std::time::Duration;
use thiserror::Error;

/// Malformed or out-of-order input. The caller must fix the input before retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown goal name '{0}'")]
    UnknownGoal(String),

    #[error("goal {0} is already completed and cannot re-enter the stack")]
    CompletedGoal(String),

    #[error("narrative text is empty")]
    EmptyNarrative,

    #[error("episode count {given} is lower than the previous capture ({previous})")]
    NonMonotonicEpisodeCount { previous: u64, given: u64 },
}

/// An external inference or similarity call failed or timed out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("{collaborator} timed out after {after:?}")]
    Timeout {
        collaborator: &'static str,
        after: Duration,
    },

    #[error("{collaborator} failed: {message}")]
    Failed {
        collaborator: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    pub fn failed(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            collaborator,
            message: message.into(),
        }
    }
}

/// A store document could not be read, parsed, validated or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {store}: {source}")]
    Io {
        store: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {store}: {source}")]
    Json {
        store: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{store} violates an invariant: {reason}")]
    Invalid { store: &'static str, reason: String },
}

/// Top-level error for controller operations.
#[derive(Debug, Error)]
pub enum ContinuityError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

pub type Result<T> = std::result::Result<T, ContinuityError>;
