use serde_json::{json, Value};

use crate::error::{ReconcileError, Result};
use crate::manifest::Manifest;

/// An upstream pipeline reference that becomes a dependency material.
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub pipeline: String,
    /// Material name in the document; defaults to the pipeline name.
    pub material: String,
    pub stage: String,
}

/// Desired state for one pipeline, parsed once per run from a manifest
/// section and immutable afterwards.
///
/// `document` is the full body handed to the platform (`{group, pipeline}`),
/// with the dependency materials already synthesized into it.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub name: String,
    pub document: Value,
    pub dependencies: Vec<Dependency>,
    pub target_group: String,
    pub branch: String,
    pub branch_allow_list: Vec<String>,
    pub purge: bool,
}

const DEFAULT_STAGE: &str = "Build";

impl PipelineSpec {
    /// Build the spec from a `gocd.pipeline.create` manifest section.
    ///
    /// Besides plain field extraction this applies the document rewrites the
    /// platform expects: an optional `name-suffix` is appended to the
    /// pipeline name, an empty `template` key is dropped, `envs`/`params`
    /// maps are rewritten into the platform's array form, and each `depends`
    /// entry is appended to `pipeline.materials` as a dependency material.
    pub fn from_section(section: &Manifest) -> Result<Self> {
        let mut section = section.clone();

        if let Some(suffix) = section.get_str("name-suffix").map(str::to_string) {
            let name = section.get_str_or("pipeline.pipeline.name", "").to_string();
            section.set("pipeline.pipeline.name", json!(format!("{name}{suffix}")));
        }

        let name = section
            .get_str("pipeline.pipeline.name")
            .map(str::to_string)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                ReconcileError::Config("pipeline.pipeline.name is required".to_string())
            })?;

        let target_group = section
            .get_str("environment")
            .map(str::to_string)
            .filter(|g| !g.is_empty())
            .ok_or_else(|| ReconcileError::Config("environment is required".to_string()))?;

        if section.get_str_or("pipeline.pipeline.template", "").is_empty() {
            section.delete("pipeline.pipeline.template");
        }

        replace_map_with_array(
            &mut section,
            "pipeline.pipeline.envs",
            "pipeline.pipeline.environment_variables",
        );
        replace_map_with_array(
            &mut section,
            "pipeline.pipeline.params",
            "pipeline.pipeline.parameters",
        );

        let default_stage = section.get_str_or("stage", DEFAULT_STAGE).to_string();
        let mut dependencies = Vec::new();
        if !section.has("pipeline.pipeline.materials") {
            section.set("pipeline.pipeline.materials", json!([]));
        }
        for dep in section.array("depends") {
            let pipeline = dep
                .get_str("pipeline")
                .map(str::to_string)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    ReconcileError::Config("depends entries require a pipeline name".to_string())
                })?;
            let material = dep.get_str_or("name", &pipeline).to_string();
            let stage = dep.get_str_or("stage", &default_stage).to_string();

            section.append(
                "pipeline.pipeline.materials",
                json!({
                    "type": "dependency",
                    "attributes": {
                        "name": material,
                        "pipeline": pipeline,
                        "stage": stage,
                        "auto_update": true,
                    }
                }),
            );
            dependencies.push(Dependency {
                pipeline,
                material,
                stage,
            });
        }

        let branch = section.get_str_or("branch", "").to_string();
        let branch_allow_list = match section.tree("allowed-branches") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        let purge = section.get_bool("purge");

        let document = section
            .tree("pipeline")
            .cloned()
            .ok_or_else(|| ReconcileError::Config("pipeline section is required".to_string()))?;

        Ok(Self {
            name,
            document,
            dependencies,
            target_group,
            branch,
            branch_allow_list,
            purge,
        })
    }

    /// Names of required upstream pipelines, in manifest order.
    pub fn dependency_names(&self) -> Vec<String> {
        self.dependencies.iter().map(|d| d.pipeline.clone()).collect()
    }
}

/// Rewrite `{KEY: {..}}` at `map_path` into `[{name: KEY, ..}]` at
/// `array_path`, the list form the platform's document schema uses.
fn replace_map_with_array(section: &mut Manifest, map_path: &str, array_path: &str) {
    let Some(Value::Object(map)) = section.tree(map_path).cloned() else {
        return;
    };

    let mut entries = Vec::with_capacity(map.len());
    for (key, value) in map {
        let mut entry = match value {
            Value::Object(fields) => fields,
            other => {
                let mut fields = serde_json::Map::new();
                fields.insert("value".to_string(), other);
                fields
            }
        };
        entry.insert("name".to_string(), json!(key));
        entries.push(Value::Object(entry));
    }

    section.set(array_path, Value::Array(entries));
    section.delete(map_path);
}
