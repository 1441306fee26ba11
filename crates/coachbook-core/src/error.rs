//! Typed errors for the plan engine.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the engine's operations.
///
/// `ManualOverrideSkipped` is deliberately absent: preserving a manual
/// override is a per-kind outcome reported in
/// [`crate::sync::SyncReport`], not a failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A referenced budget, assignment, or generated plan does not exist.
    /// The operation aborts with no partial state.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// A budget was cloned for isolation, but repointing the assignment at
    /// the clone failed. Distinct from [`Self::NotFound`] so a retry can
    /// reuse `fork` instead of cloning again; the orphaned private budget
    /// is a tolerated leak, not a correctness violation.
    #[error("budget {original} was forked to {fork}, but repointing assignment {assignment} failed")]
    ForkRepointFailed {
        original: Uuid,
        fork: Uuid,
        assignment: Uuid,
        #[source]
        source: anyhow::Error,
    },

    /// A kind-upsert inside a sync batch failed. The whole batch rolled
    /// back; the subscriber's prior active plans remain in effect.
    #[error("plan sync for subscriber {subscriber} on budget {budget} failed and was rolled back")]
    SyncPartialFailure {
        subscriber: Uuid,
        budget: Uuid,
        #[source]
        source: anyhow::Error,
    },

    /// A store-level failure outside the cases above.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_repoint_failed_names_the_fork() {
        let original = Uuid::new_v4();
        let fork = Uuid::new_v4();
        let assignment = Uuid::new_v4();
        let err = EngineError::ForkRepointFailed {
            original,
            fork,
            assignment,
            source: anyhow::anyhow!("connection reset"),
        };

        let message = err.to_string();
        assert!(message.contains(&fork.to_string()));
        assert!(message.contains(&original.to_string()));
    }

    #[test]
    fn not_found_message() {
        let id = Uuid::new_v4();
        let err = EngineError::NotFound {
            entity: "budget",
            id,
        };
        assert_eq!(err.to_string(), format!("budget {id} not found"));
    }
}
