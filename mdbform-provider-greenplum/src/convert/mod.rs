//! Conversion between resource attributes and API messages
//!
//! `flatten_*` functions turn API messages into attribute values, `expand_*`
//! functions go the other way and report problems through [`Diagnostics`].
//! Each block of the cluster resource has its own pair.
//!
//! [`Diagnostics`]: mdbform_core::diagnostics::Diagnostics

mod blocks;
mod cluster;
mod cluster_config;
mod config;
mod values;

pub use blocks::RestoreSource;
pub use cluster::{expand_cluster, expand_restore_request, expand_update, flatten_cluster};
