//! mdbform State Management
//!
//! Applied resource state lives in a JSON state file next to the
//! configuration. A lock file guards the state while a command mutates it.
//!
//! - **StateFile**: every managed resource with its last applied attributes
//! - **StateBackend**: storage for state files and their locks
//! - **LockInfo**: who holds the lock, for what, and until when
//!
//! # Example
//!
//! ```ignore
//! use mdbform_state::{LocalBackend, StateBackend, StateFile};
//!
//! let backend = LocalBackend::new();
//! let lock = backend.acquire_lock("apply").await?;
//!
//! let mut state = backend.read_state().await?.unwrap_or_default();
//! // ... apply changes, upsert resources ...
//! state.increment_serial();
//! backend.write_state(&state).await?;
//!
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendError, BackendResult, StateBackend};
pub use backends::LocalBackend;
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
