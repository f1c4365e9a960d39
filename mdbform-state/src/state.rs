//! State file structures for persisting applied resource state

use std::collections::HashMap;

use mdbform_core::diagnostics::Diagnostics;
use mdbform_core::json::{self, JsonError};
use mdbform_core::resource::{ResourceId, State};
use mdbform_core::schema::ResourceSchema;
use serde::{Deserialize, Serialize};

/// The state file: every resource mdbform has applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Incremented on every write
    pub serial: u64,
    /// Identifies this state across writes; a different lineage is a different state
    pub lineage: String,
    /// Version of mdbform that last wrote this state
    pub mdbform_version: String,
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self::with_lineage(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_lineage(lineage: impl Into<String>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage: lineage.into(),
            mdbform_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    /// Prepare for a write: bump the serial and stamp the writer's version
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.mdbform_version = env!("CARGO_PKG_VERSION").to_string();
    }

    pub fn find_resource(&self, id: &ResourceId) -> Option<&ResourceState> {
        self.resources.iter().find(|r| r.matches(id))
    }

    /// Add a resource or replace the entry with the same id
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        let id = resource.resource_id();
        match self.resources.iter_mut().find(|r| r.matches(&id)) {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }

    pub fn remove_resource(&mut self, id: &ResourceId) -> Option<ResourceState> {
        let pos = self.resources.iter().position(|r| r.matches(id))?;
        Some(self.resources.remove(pos))
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single managed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type (e.g., "greenplum_cluster")
    pub resource_type: String,
    pub name: String,
    /// Provider name (e.g., "yandex")
    pub provider: String,
    /// Cloud-side identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl ResourceState {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            provider: provider.into(),
            identifier: None,
            attributes: serde_json::Map::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Record a state read from or applied to the cloud
    ///
    /// Null attributes are left out of the file. Fails if any attribute is
    /// still unknown.
    pub fn from_state(state: &State, provider: impl Into<String>) -> Result<Self, JsonError> {
        let encoded: HashMap<String, serde_json::Value> = json::attributes_to_json(&state.attributes)?;
        let attributes = encoded.into_iter().filter(|(_, v)| !v.is_null()).collect();
        Ok(Self {
            resource_type: state.id.resource_type.clone(),
            name: state.id.name.clone(),
            provider: provider.into(),
            identifier: state.identifier.clone(),
            attributes,
        })
    }

    /// Decode back into a `State`, guided by the resource schema
    pub fn to_state(&self, schema: &ResourceSchema) -> Result<State, Diagnostics> {
        let mut diags = Diagnostics::new();
        let attributes = json::attributes_from_json(schema, &self.attributes, &mut diags);
        if diags.has_error() {
            return Err(diags.prefixed(&self.resource_id().to_string()));
        }
        let state = State::existing(self.resource_id(), attributes);
        Ok(match &self.identifier {
            Some(identifier) => state.with_identifier(identifier.clone()),
            None => state,
        })
    }

    pub fn resource_id(&self) -> ResourceId {
        ResourceId::new(self.resource_type.clone(), self.name.clone())
    }

    fn matches(&self, id: &ResourceId) -> bool {
        self.resource_type == id.resource_type && self.name == id.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdbform_core::resource::Value;
    use mdbform_core::schema::{AttributeSchema, AttributeType};
    use serde_json::json;

    fn schema() -> ResourceSchema {
        ResourceSchema::new("greenplum_cluster")
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("segment_host_count", AttributeType::Int).required())
            .attribute(AttributeSchema::new(
                "security_group_ids",
                AttributeType::set(AttributeType::String),
            ))
            .attribute(AttributeSchema::new("description", AttributeType::String).optional())
    }

    fn cluster_id() -> ResourceId {
        ResourceId::new("greenplum_cluster", "analytics")
    }

    #[test]
    fn test_new_state_file() {
        let state = StateFile::new();
        assert_eq!(state.version, StateFile::CURRENT_VERSION);
        assert_eq!(state.serial, 0);
        assert!(!state.lineage.is_empty());
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_increment_serial() {
        let mut state = StateFile::with_lineage("lineage-1");
        state.increment_serial();
        state.increment_serial();
        assert_eq!(state.serial, 2);
        assert_eq!(state.lineage, "lineage-1");
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut file = StateFile::new();
        file.upsert_resource(
            ResourceState::new("greenplum_cluster", "analytics", "yandex").with_identifier("c9q1"),
        );
        file.upsert_resource(
            ResourceState::new("greenplum_cluster", "analytics", "yandex").with_identifier("c9q2"),
        );
        assert_eq!(file.resources.len(), 1);
        assert_eq!(
            file.find_resource(&cluster_id()).and_then(|r| r.identifier.as_deref()),
            Some("c9q2")
        );

        assert!(file.remove_resource(&cluster_id()).is_some());
        assert!(file.remove_resource(&cluster_id()).is_none());
        assert!(file.find_resource(&cluster_id()).is_none());
    }

    #[test]
    fn test_state_round_trip_drops_nulls() {
        let state = State::existing(
            cluster_id(),
            HashMap::from([
                ("name".to_string(), Value::from("analytics")),
                ("segment_host_count".to_string(), Value::Int(2)),
                ("security_group_ids".to_string(), Value::string_set(["sg-2", "sg-1"])),
                ("description".to_string(), Value::Null),
            ]),
        )
        .with_identifier("c9q1");

        let recorded = ResourceState::from_state(&state, "yandex").unwrap();
        assert_eq!(recorded.identifier.as_deref(), Some("c9q1"));
        assert!(!recorded.attributes.contains_key("description"));
        assert_eq!(recorded.attributes["security_group_ids"], json!(["sg-1", "sg-2"]));

        let mut expected = state.clone();
        expected.attributes.remove("description");
        assert_eq!(recorded.to_state(&schema()).unwrap(), expected);
    }

    #[test]
    fn test_unknown_attribute_cannot_be_recorded() {
        let state = State::existing(
            cluster_id(),
            HashMap::from([("segment_host_count".to_string(), Value::Unknown)]),
        );
        let err = ResourceState::from_state(&state, "yandex").unwrap_err();
        assert!(err.to_string().contains("segment_host_count"));
    }

    #[test]
    fn test_to_state_reports_bad_attributes() {
        let recorded = ResourceState::new("greenplum_cluster", "analytics", "yandex")
            .with_attribute("segment_host_count", json!("two"))
            .with_attribute("zone", json!("ru-central1-a"));
        let diags = recorded.to_state(&schema()).unwrap_err();
        assert_eq!(diags.errors().count(), 2);
        assert!(diags.to_string().contains("greenplum_cluster.analytics"));
    }

    #[test]
    fn test_state_file_serialization() {
        let mut file = StateFile::with_lineage("lineage-1");
        file.upsert_resource(
            ResourceState::new("greenplum_cluster", "analytics", "yandex")
                .with_attribute("name", json!("analytics")),
        );
        let text = serde_json::to_string_pretty(&file).unwrap();
        assert!(text.contains("\"mdbform_version\""));
        assert!(!text.contains("\"identifier\""));

        let back: StateFile = serde_json::from_str(&text).unwrap();
        assert_eq!(back.lineage, "lineage-1");
        assert_eq!(back.resources, file.resources);
    }
}
