//! Effect - A side effect described as a value
//!
//! Effects are produced by planning and only executed when a plan is applied.

use crate::diagnostics::AttributePath;
use crate::resource::{Resource, ResourceId, State};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Create a resource from its planned attributes
    Create(Resource),
    /// Update a resource in place
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed: Vec<AttributePath>,
    },
    /// Delete and recreate a resource
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed: Vec<AttributePath>,
    },
    /// Delete a resource
    Delete(State),
}

impl Effect {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Create(resource) => &resource.id,
            Effect::Update { id, .. } | Effect::Replace { id, .. } => id,
            Effect::Delete(state) => &state.id,
        }
    }
}
