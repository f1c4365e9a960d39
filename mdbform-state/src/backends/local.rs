//! Local file backend
//!
//! State lives in a JSON file (default: mdbform.state.json) with a sibling
//! `.lock` file holding the current [`LockInfo`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::backend::{BackendError, BackendResult, StateBackend, check_overwrite};
use crate::lock::LockInfo;
use crate::state::StateFile;

pub struct LocalBackend {
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl LocalBackend {
    pub const DEFAULT_STATE_FILE: &'static str = "mdbform.state.json";

    pub fn new() -> Self {
        Self::with_path(PathBuf::from(Self::DEFAULT_STATE_FILE))
    }

    pub fn with_path(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let lock_path = state_path.with_extension("lock");
        Self {
            state_path,
            lock_path,
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    async fn read_lock(&self) -> BackendResult<Option<LockInfo>> {
        let content = match fs::read_to_string(&self.lock_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::Io(format!("Failed to read lock file: {}", e))),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| BackendError::InvalidState(format!("Failed to parse lock file: {}", e)))
    }

    /// Create the lock file; fails with `AlreadyExists` if another lock is present
    async fn create_lock_file(&self, lock: &LockInfo) -> std::io::Result<()> {
        let content = serde_json::to_vec_pretty(lock)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .await?;
        file.write_all(&content).await?;
        file.flush().await
    }

    async fn remove_lock_file(&self) -> BackendResult<()> {
        fs::remove_file(&self.lock_path)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to remove lock file: {}", e)))
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        let content = match fs::read_to_string(&self.state_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BackendError::Io(format!("Failed to read state file: {}", e))),
        };
        let state: StateFile = serde_json::from_str(&content).map_err(|e| {
            BackendError::InvalidState(format!("Failed to parse state file: {}", e))
        })?;
        if state.version > StateFile::CURRENT_VERSION {
            return Err(BackendError::InvalidState(format!(
                "state file version {} is newer than supported version {}",
                state.version,
                StateFile::CURRENT_VERSION
            )));
        }
        Ok(Some(state))
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        let stored = self.read_state().await?;
        check_overwrite(stored.as_ref(), state)?;

        let content = serde_json::to_string_pretty(state).map_err(|e| {
            BackendError::Serialization(format!("Failed to serialize state: {}", e))
        })?;

        // Write beside the state file, then rename over it
        let tmp_path = self.state_path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to write state file: {}", e)))?;
        fs::rename(&tmp_path, &self.state_path)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to replace state file: {}", e)))?;

        debug!(
            "wrote state serial {} to {}",
            state.serial,
            self.state_path.display()
        );
        Ok(())
    }

    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo> {
        let lock = LockInfo::new(operation);
        match self.create_lock_file(&lock).await {
            Ok(()) => return Ok(lock),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(BackendError::Io(format!("Failed to write lock file: {}", e))),
        }

        match self.read_lock().await {
            Ok(Some(existing)) if !existing.is_expired() => {
                return Err(BackendError::locked(&existing));
            }
            Ok(Some(existing)) => warn!(
                "taking over expired lock {} held by {} for {}",
                existing.id, existing.who, existing.operation
            ),
            Ok(None) => {}
            Err(BackendError::InvalidState(message)) => {
                warn!("replacing unreadable lock file: {}", message)
            }
            Err(e) => return Err(e),
        }

        if let Err(e) = fs::remove_file(&self.lock_path).await
            && e.kind() != ErrorKind::NotFound
        {
            return Err(BackendError::Io(format!("Failed to remove lock file: {}", e)));
        }
        match self.create_lock_file(&lock).await {
            Ok(()) => Ok(lock),
            // Another process took the lock between removal and creation
            Err(e) if e.kind() == ErrorKind::AlreadyExists => match self.read_lock().await? {
                Some(existing) => Err(BackendError::locked(&existing)),
                None => Err(BackendError::Io("lock file vanished while locking".to_string())),
            },
            Err(e) => Err(BackendError::Io(format!("Failed to write lock file: {}", e))),
        }
    }

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()> {
        let existing = self
            .read_lock()
            .await?
            .ok_or_else(|| BackendError::LockNotFound(lock.id.clone()))?;
        if existing.id != lock.id {
            return Err(BackendError::LockMismatch {
                expected: lock.id.clone(),
                actual: existing.id,
            });
        }
        self.remove_lock_file().await
    }

    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()> {
        match self.read_lock().await {
            Ok(None) => return Err(BackendError::LockNotFound(lock_id.to_string())),
            Ok(Some(existing)) if existing.id != lock_id => {
                return Err(BackendError::LockMismatch {
                    expected: lock_id.to_string(),
                    actual: existing.id,
                });
            }
            // An unreadable lock file can still be forced away
            Ok(Some(_)) | Err(BackendError::InvalidState(_)) => {}
            Err(e) => return Err(e),
        }
        self.remove_lock_file().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ResourceState;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_backend_read_write() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        assert!(backend.read_state().await.unwrap().is_none());

        let mut state = StateFile::new();
        state.upsert_resource(
            ResourceState::new("greenplum_cluster", "analytics", "yandex").with_identifier("c9q1"),
        );
        state.increment_serial();
        backend.write_state(&state).await.unwrap();

        let read = backend.read_state().await.unwrap().unwrap();
        assert_eq!(read.serial, 1);
        assert_eq!(read.lineage, state.lineage);
        assert_eq!(read.resources, state.resources);
        assert!(!dir.path().join("test.state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_rejects_stale_and_foreign_state() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        let mut state = StateFile::new();
        state.increment_serial();
        backend.write_state(&state).await.unwrap();

        let stale = state.clone();
        assert!(matches!(
            backend.write_state(&stale).await,
            Err(BackendError::StaleSerial { .. })
        ));

        let mut foreign = StateFile::new();
        foreign.serial = 10;
        assert!(matches!(
            backend.write_state(&foreign).await,
            Err(BackendError::LineageMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_corrupt_state_file_is_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.state.json");
        std::fs::write(&path, "{ not json").unwrap();
        let backend = LocalBackend::with_path(path);
        assert!(matches!(
            backend.read_state().await,
            Err(BackendError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_local_backend_locking() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        assert_eq!(backend.lock_path(), dir.path().join("test.state.lock"));

        let lock = backend.acquire_lock("apply").await.unwrap();
        assert_eq!(lock.operation, "apply");

        match backend.acquire_lock("destroy").await {
            Err(BackendError::Locked { lock_id, .. }) => assert_eq!(lock_id, lock.id),
            other => panic!("Expected Locked error, got {other:?}"),
        }

        backend.release_lock(&lock).await.unwrap();
        let second = backend.acquire_lock("destroy").await.unwrap();
        assert_eq!(second.operation, "destroy");

        assert!(matches!(
            backend.release_lock(&lock).await,
            Err(BackendError::LockMismatch { .. })
        ));
        backend.release_lock(&second).await.unwrap();
        assert!(matches!(
            backend.release_lock(&second).await,
            Err(BackendError::LockNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_lock_is_taken_over() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        let stale = LockInfo::with_timeout("apply", chrono::Duration::seconds(-5));
        std::fs::write(backend.lock_path(), serde_json::to_string(&stale).unwrap()).unwrap();

        let lock = backend.acquire_lock("apply").await.unwrap();
        assert_ne!(lock.id, stale.id);
    }

    #[tokio::test]
    async fn test_force_unlock() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        assert!(matches!(
            backend.force_unlock("missing").await,
            Err(BackendError::LockNotFound(_))
        ));

        let lock = backend.acquire_lock("apply").await.unwrap();
        assert!(matches!(
            backend.force_unlock("other").await,
            Err(BackendError::LockMismatch { .. })
        ));
        backend.force_unlock(&lock.id).await.unwrap();
        assert!(!backend.lock_path().exists());
    }

    #[test]
    fn test_default_path() {
        let backend = LocalBackend::default();
        assert_eq!(backend.state_path(), Path::new("mdbform.state.json"));
        assert_eq!(backend.lock_path(), Path::new("mdbform.state.lock"));
    }
}
