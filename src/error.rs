//! Error types for the evaluation core.
//!
//! Data-quality problems in rosters and responses are not errors here: the
//! importer and the aggregation engine recover from them locally and report
//! them through `ImportStats` and `SkippedRecord`. What remains are failures
//! the caller has to act on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The rubric has no scale for this answer type.
    #[error("unknown answer type: {0}")]
    UnknownAnswerType(String),

    /// Another writer saved the state after it was loaded.
    #[error("state is stale: loaded at revision {expected}, store is at {found}")]
    StaleState { expected: i64, found: i64 },

    #[error("failed to (de)serialize state key {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EvaluationError {
    /// Returns `true` if reloading the state and retrying the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EvaluationError::StaleState { .. })
    }
}
