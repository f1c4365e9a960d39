use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Long-running operation returned by every mutating call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Operation {
    pub id: String,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub modified_at: Option<DateTime<Utc>>,
    pub done: bool,
    /// Per-call metadata, e.g. `{"clusterId": "..."}`
    pub metadata: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
}

impl Operation {
    /// Cluster the operation acts on, taken from its metadata
    pub fn cluster_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("clusterId"))
            .and_then(serde_json::Value::as_str)
            .filter(|id| !id.is_empty())
    }
}

/// `google.rpc.Status`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Status {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<serde_json::Value>,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cluster_id_from_metadata() {
        let op: Operation = serde_json::from_value(json!({
            "id": "op1",
            "done": false,
            "metadata": {"@type": "type.googleapis.com/yandex.cloud.mdb.greenplum.v1.CreateClusterMetadata", "clusterId": "c9q1"}
        }))
        .unwrap();
        assert_eq!(op.cluster_id(), Some("c9q1"));
        assert!(op.error.is_none());
    }

    #[test]
    fn failed_operation_carries_status() {
        let op: Operation = serde_json::from_value(json!({
            "id": "op2",
            "done": true,
            "error": {"code": 9, "message": "Quota exceeded"}
        }))
        .unwrap();
        assert_eq!(op.error.as_ref().unwrap().to_string(), "Quota exceeded (code 9)");
        assert_eq!(op.cluster_id(), None);
    }
}
