//! Idempotency record store.
//!
//! Every mutating engine call records its outcome under the caller's
//! key together with a fingerprint of the call parameters. A retry with
//! the same key and fingerprint replays the recorded outcome without
//! touching the ledger; the same key with different parameters is a
//! caller bug and is rejected.

use dashmap::DashMap;

use kasira_shared::types::IdempotencyKey;
use kasira_shared::{EngineError, EngineResult};

#[derive(Debug, Clone)]
struct IdempotencyRecord<T> {
    fingerprint: String,
    outcome: T,
}

/// In-memory idempotency records.
#[derive(Debug)]
pub struct IdempotencyStore<T> {
    records: DashMap<IdempotencyKey, IdempotencyRecord<T>>,
}

impl<T: Clone> IdempotencyStore<T> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Looks up a previously recorded outcome for `key`.
    ///
    /// Returns `None` when the key is unseen.
    ///
    /// # Errors
    ///
    /// `Validation` when the key was recorded with a different
    /// fingerprint (key reuse across distinct requests).
    pub fn recall(&self, key: &IdempotencyKey, fingerprint: &str) -> EngineResult<Option<T>> {
        match self.records.get(key) {
            None => Ok(None),
            Some(record) if record.fingerprint == fingerprint => Ok(Some(record.outcome.clone())),
            Some(_) => Err(EngineError::Validation(format!(
                "idempotency key {key} was already used with different parameters"
            ))),
        }
    }

    /// Records the outcome of a completed call.
    pub fn record(&self, key: IdempotencyKey, fingerprint: impl Into<String>, outcome: T) {
        self.records.insert(
            key,
            IdempotencyRecord {
                fingerprint: fingerprint.into(),
                outcome,
            },
        );
    }
}

impl<T: Clone> Default for IdempotencyStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
