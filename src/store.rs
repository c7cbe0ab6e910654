//! Persistence boundary for `EvaluationState`.
//!
//! Core operations are plain functions over a loaded state; a store only
//! loads and saves it. Saves are compare-and-set on the revision the state
//! was loaded at, so two sessions that load the same revision cannot both
//! write back and silently drop each other's changes.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::EvaluationError;
use crate::state::EvaluationState;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<EvaluationState, EvaluationError>;

    /// Persists every key of `state` and advances its revision.
    ///
    /// Fails with `EvaluationError::StaleState` when the store has been saved
    /// since `state` was loaded.
    async fn save(&self, state: &mut EvaluationState) -> Result<(), EvaluationError>;
}

/// Loads the state, applies `apply` and saves it, reloading and reapplying
/// up to `attempts` times while the save keeps hitting a stale revision.
pub async fn update<S, F, T>(store: &S, attempts: usize, mut apply: F) -> Result<T, EvaluationError>
where
    S: StateStore + ?Sized,
    F: FnMut(&mut EvaluationState) -> T + Send,
    T: Send,
{
    let mut attempt = 1;
    loop {
        let mut state = store.load().await?;
        let output = apply(&mut state);
        match store.save(&mut state).await {
            Ok(()) => return Ok(output),
            Err(err) if err.is_retryable() && attempt < attempts => {
                tracing::warn!(attempt, error = %err, "state changed concurrently, retrying");
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[derive(Debug, Default)]
struct Stored {
    revision: i64,
    entries: HashMap<String, Value>,
}

/// In-process store holding the serialized keys.
#[derive(Debug, Default)]
pub struct MemoryStore {
    stored: Mutex<Stored>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> i64 {
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .revision
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<EvaluationState, EvaluationError> {
        let stored = self.stored.lock().unwrap_or_else(PoisonError::into_inner);
        EvaluationState::from_entries(stored.entries.clone(), stored.revision)
    }

    async fn save(&self, state: &mut EvaluationState) -> Result<(), EvaluationError> {
        let entries = state.to_entries()?;
        let mut stored = self.stored.lock().unwrap_or_else(PoisonError::into_inner);
        if stored.revision != state.revision {
            return Err(EvaluationError::StaleState {
                expected: state.revision,
                found: stored.revision,
            });
        }

        for (key, value) in entries {
            stored.entries.insert(key.to_string(), value);
        }
        stored.revision += 1;
        state.revision = stored.revision;
        Ok(())
    }
}
