use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A resource read together with its version token. Every conditional write
/// must present the token the document was last fetched with.
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub document: T,
    pub etag: String,
}

/// One pipeline membership entry inside a group document. The platform
/// decorates entries with links and metadata on read; writes only ever carry
/// the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub name: String,
}

impl GroupMember {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A GoCD environment: a named partition of pipeline membership.
///
/// Everything besides `name` and `pipelines` (`agents`,
/// `environment_variables`, links) is held verbatim in `extra` and copied
/// through unchanged on every write, so the platform never sees a spurious
/// change to fields this tool does not own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDocument {
    pub name: String,
    #[serde(default)]
    pub pipelines: Vec<GroupMember>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GroupDocument {
    pub fn contains(&self, pipeline: &str) -> bool {
        self.pipelines.iter().any(|m| m.name == pipeline)
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.pipelines.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Index response from `GET /go/api/admin/environments`.
#[derive(Debug, Deserialize)]
pub struct GroupsIndex {
    #[serde(rename = "_embedded", default)]
    embedded: GroupsEmbedded,
}

#[derive(Debug, Default, Deserialize)]
struct GroupsEmbedded {
    #[serde(default)]
    environments: Vec<GroupDocument>,
}

impl GroupsIndex {
    pub fn into_groups(self) -> Vec<GroupDocument> {
        self.embedded.environments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_group_document_roundtrip_preserves_unknown_fields() {
        let raw = json!({
            "name": "staging",
            "pipelines": [{"name": "svc-build", "_links": {"self": {"href": "x"}}}],
            "agents": [{"uuid": "a-1"}],
            "environment_variables": [{"name": "ENV", "value": "qa"}]
        });

        let doc: GroupDocument = serde_json::from_value(raw).unwrap();
        assert_eq!(doc.name, "staging");
        assert_eq!(doc.member_names(), vec!["svc-build"]);
        assert!(doc.contains("svc-build"));
        assert!(!doc.contains("other"));

        let out = serde_json::to_value(&doc).unwrap();
        assert_eq!(out["agents"], json!([{"uuid": "a-1"}]));
        assert_eq!(
            out["environment_variables"],
            json!([{"name": "ENV", "value": "qa"}])
        );
        // member entries are re-emitted as bare names
        assert_eq!(out["pipelines"], json!([{"name": "svc-build"}]));
    }

    #[test]
    fn test_groups_index_unwraps_embedded() {
        let raw = json!({
            "_embedded": {
                "environments": [
                    {"name": "staging", "pipelines": []},
                    {"name": "prod", "pipelines": [{"name": "svc-build"}]}
                ]
            }
        });

        let index: GroupsIndex = serde_json::from_value(raw).unwrap();
        let groups = index.into_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].member_names(), vec!["svc-build"]);
    }

    #[test]
    fn test_groups_index_tolerates_empty_body() {
        let index: GroupsIndex = serde_json::from_value(json!({})).unwrap();
        assert!(index.into_groups().is_empty());
    }
}
