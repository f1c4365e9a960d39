//! Backend implementations for state storage

mod local;

pub use local::LocalBackend;
