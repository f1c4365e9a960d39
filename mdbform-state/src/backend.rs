//! State backend trait and error types

use async_trait::async_trait;
use thiserror::Error;

use crate::lock::LockInfo;
use crate::state::StateFile;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("State is locked by {who} (lock ID: {lock_id}, operation: {operation})")]
    Locked {
        lock_id: String,
        who: String,
        operation: String,
    },

    #[error("Lock not found: {0}")]
    LockNotFound(String),

    #[error("Lock ID mismatch: expected {expected}, got {actual}")]
    LockMismatch { expected: String, actual: String },

    #[error("Invalid state file: {0}")]
    InvalidState(String),

    /// The stored state belongs to a different lineage
    #[error("State lineage mismatch: expected {expected}, got {actual}")]
    LineageMismatch { expected: String, actual: String },

    /// The stored state was written after the state being saved was read
    #[error("State serial {attempted} is not newer than stored serial {stored}")]
    StaleSerial { stored: u64, attempted: u64 },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BackendError {
    pub fn locked(lock: &LockInfo) -> Self {
        Self::Locked {
            lock_id: lock.id.clone(),
            who: lock.who.clone(),
            operation: lock.operation.clone(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage for the state file and its lock
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Read the stored state; `None` before the first write
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Store the state
    ///
    /// Rejects a state from another lineage and one whose serial is not
    /// newer than the stored one.
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;

    /// Take the lock for an operation unless someone holds an unexpired one
    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo>;

    /// Release a lock this process holds
    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()>;

    /// Remove a lock by id regardless of owner or expiry
    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()>;
}

/// Check a state about to be written against the stored one
pub fn check_overwrite(stored: Option<&StateFile>, incoming: &StateFile) -> BackendResult<()> {
    let Some(stored) = stored else {
        return Ok(());
    };
    if stored.lineage != incoming.lineage {
        return Err(BackendError::LineageMismatch {
            expected: stored.lineage.clone(),
            actual: incoming.lineage.clone(),
        });
    }
    if incoming.serial <= stored.serial {
        return Err(BackendError::StaleSerial {
            stored: stored.serial,
            attempted: incoming.serial,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_locked() {
        let lock = LockInfo::new("apply");
        match BackendError::locked(&lock) {
            BackendError::Locked {
                lock_id,
                who,
                operation,
            } => {
                assert_eq!(lock_id, lock.id);
                assert_eq!(who, lock.who);
                assert_eq!(operation, "apply");
            }
            other => panic!("Expected Locked error, got {other:?}"),
        }
    }

    #[test]
    fn test_first_write_is_always_allowed() {
        assert!(check_overwrite(None, &StateFile::new()).is_ok());
    }

    #[test]
    fn test_overwrite_requires_same_lineage() {
        let stored = StateFile::with_lineage("a");
        let mut incoming = StateFile::with_lineage("b");
        incoming.increment_serial();
        let err = check_overwrite(Some(&stored), &incoming).unwrap_err();
        assert_eq!(err.to_string(), "State lineage mismatch: expected a, got b");
    }

    #[test]
    fn test_overwrite_requires_newer_serial() {
        let mut stored = StateFile::with_lineage("a");
        stored.increment_serial();
        let incoming = stored.clone();
        assert!(matches!(
            check_overwrite(Some(&stored), &incoming),
            Err(BackendError::StaleSerial { stored: 1, attempted: 1 })
        ));

        let mut newer = stored.clone();
        newer.increment_serial();
        assert!(check_overwrite(Some(&stored), &newer).is_ok());
    }
}
