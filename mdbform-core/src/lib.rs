//! mdbform Core
//!
//! Core library for managing cloud database clusters declaratively: tri-state
//! attribute values, resource schemas, diagnostics, planning and the provider
//! abstraction.

pub mod diagnostics;
pub mod differ;
pub mod effect;
pub mod json;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod validator;
