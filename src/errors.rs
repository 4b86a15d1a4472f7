//! Typed error hierarchy for the bookish workflow engine.
//!
//! One enum per subsystem:
//! - `StoreError` - session store failures (always turn-fatal)
//! - `RegistryError` - phase registry misconfiguration, caught at startup
//! - `WorkerError` - failures raised inside a phase worker
//! - `OrchestratorError` - everything that aborts an external turn

use thiserror::Error;

use crate::phase::Phase;

/// Errors from a session store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Failed to (de)serialize session data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session {id} not found")]
    SessionNotFound { id: String },

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Store task panicked: {0}")]
    TaskJoin(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Phase registry consistency violations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Phase sequence is empty")]
    EmptySequence,

    #[error("Phase {phase} has no completion task mapping")]
    MissingMapping { phase: Phase },

    #[error("Completion task '{task}' is registered more than once")]
    DuplicateTask { task: String },

    #[error("Phase chain contains a cycle at {phase}")]
    Cycle { phase: Phase },

    #[error("Terminal phase {phase} must not have a completion task")]
    TerminalHasMapping { phase: Phase },

    #[error("Phase {phase} has more than one outbound completion task")]
    BranchingPhase { phase: Phase },

    #[error("Completion task for {from} must advance to {expected}, not {actual}")]
    NonLinear {
        from: Phase,
        expected: Phase,
        actual: Phase,
    },
}

/// Errors raised by a phase worker while handling one invocation.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Metadata lookup failed: {0}")]
    Lookup(#[from] crate::integrations::LookupError),

    #[error("Artifact publishing failed: {0}")]
    Publish(#[from] crate::integrations::PublishError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification used by callers to pick a user-facing outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Storage,
    Worker,
    IterationLimit,
    Configuration,
}

/// Errors that abort the current external turn.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Session store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Worker for phase {phase} failed: {source}")]
    Worker {
        phase: Phase,
        #[source]
        source: WorkerError,
    },

    #[error("Exceeded {limit} worker invocations in one turn (last phase: {phase})")]
    IterationLimitExceeded { limit: usize, phase: Phase },

    #[error("No worker registered for phase {phase}")]
    MissingWorker { phase: Phase },

    #[error("Invalid phase registry: {0}")]
    Registry(#[from] RegistryError),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::Store(_) => ErrorKind::Storage,
            OrchestratorError::Worker { .. } => ErrorKind::Worker,
            OrchestratorError::IterationLimitExceeded { .. } => ErrorKind::IterationLimit,
            OrchestratorError::MissingWorker { .. } | OrchestratorError::Registry(_) => {
                ErrorKind::Configuration
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_from_rusqlite_keeps_message() {
        let err: StoreError = rusqlite::Error::InvalidQuery.into();
        match &err {
            StoreError::Database(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Database variant"),
        }
    }

    #[test]
    fn session_not_found_carries_id() {
        let err = StoreError::SessionNotFound {
            id: "abc".to_string(),
        };
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn iteration_limit_is_distinguishable() {
        let err = OrchestratorError::IterationLimitExceeded {
            limit: 5,
            phase: Phase::Scheduling,
        };
        assert_eq!(err.kind(), ErrorKind::IterationLimit);
        assert!(err.to_string().contains('5'));
        assert!(err.to_string().contains("scheduling"));
    }

    #[test]
    fn orchestrator_error_converts_from_store_error() {
        let err: OrchestratorError = StoreError::LockPoisoned.into();
        assert!(matches!(err, OrchestratorError::Store(StoreError::LockPoisoned)));
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn worker_error_wraps_anyhow() {
        let inner = WorkerError::Other(anyhow::anyhow!("boom"));
        let err = OrchestratorError::Worker {
            phase: Phase::Discovery,
            source: inner,
        };
        assert_eq!(err.kind(), ErrorKind::Worker);
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&StoreError::LockPoisoned);
        assert_std_error(&RegistryError::Cycle {
            phase: Phase::Discovery,
        });
        assert_std_error(&WorkerError::Other(anyhow::anyhow!("x")));
        assert_std_error(&OrchestratorError::MissingWorker {
            phase: Phase::Engagement,
        });
    }
}
