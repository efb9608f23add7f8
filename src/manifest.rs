use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;

/// A manifest document with dotted-path access.
///
/// Manifests describe the desired state of one or more platform sections
/// (for example `gocd.pipeline.create`). The tree is held as plain JSON so
/// section bodies can be passed through to the remote platform untouched;
/// callers read and mutate it by dotted path only.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    root: Value,
}

impl Manifest {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// Load a manifest from a file.
    ///
    /// YAML is the primary format; JSON and TOML manifests are accepted by
    /// extension, and an unknown extension falls back to trying each parser
    /// in turn.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let root = match extension {
            "yaml" | "yml" => serde_yaml::from_str::<Value>(&contents)
                .with_context(|| format!("Failed to parse YAML manifest: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON manifest: {}", path.display()))?,
            "toml" => toml_to_json(&contents)
                .with_context(|| format!("Failed to parse TOML manifest: {}", path.display()))?,
            _ => serde_yaml::from_str::<Value>(&contents)
                .ok()
                .or_else(|| serde_json::from_str(&contents).ok())
                .or_else(|| toml_to_json(&contents).ok())
                .with_context(|| format!("Failed to parse manifest file: {}", path.display()))?,
        };

        Ok(Self { root })
    }

    /// Overlay command-line arguments under `args.<name>`, so sections can
    /// reference invocation context (branch, environment) by path.
    pub fn overlay_args<'a>(&mut self, args: impl IntoIterator<Item = (&'a str, &'a str)>) {
        for (name, value) in args {
            self.set(&format!("args.{name}"), Value::String(value.to_string()));
        }
    }

    pub fn has(&self, path: &str) -> bool {
        self.value(path).is_some()
    }

    fn value(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.root, |node, key| match node {
            Value::Object(map) => map.get(key),
            _ => None,
        })
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.value(path).and_then(Value::as_str)
    }

    pub fn get_str_or<'a>(&'a self, path: &str, default: &'a str) -> &'a str {
        self.get_str(path).unwrap_or(default)
    }

    pub fn get_bool(&self, path: &str) -> bool {
        self.value(path).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_int_or(&self, path: &str, default: i64) -> i64 {
        self.value(path).and_then(Value::as_i64).unwrap_or(default)
    }

    /// Clone the subtree at `path` as a nested manifest.
    pub fn sub(&self, path: &str) -> Option<Manifest> {
        self.value(path).cloned().map(Manifest::new)
    }

    /// Clone a top-level section by its literal key. Section ids contain
    /// dots (`gocd.pipeline.create`), so this never splits the key.
    pub fn section(&self, id: &str) -> Option<Manifest> {
        match &self.root {
            Value::Object(map) => map.get(id).cloned().map(Manifest::new),
            _ => None,
        }
    }

    /// Clone each element of the list at `path` as a nested manifest.
    /// A missing or non-list path yields an empty vec.
    pub fn array(&self, path: &str) -> Vec<Manifest> {
        match self.value(path) {
            Some(Value::Array(items)) => items.iter().cloned().map(Manifest::new).collect(),
            _ => Vec::new(),
        }
    }

    /// Raw subtree at `path`, if present.
    pub fn tree(&self, path: &str) -> Option<&Value> {
        self.value(path)
    }

    /// Set the value at `path`, creating intermediate objects as needed.
    /// A non-object intermediate is replaced by an object.
    pub fn set(&mut self, path: &str, value: Value) {
        let (parent, key) = match path.rsplit_once('.') {
            Some((parent, key)) => (Some(parent), key),
            None => (None, path),
        };

        let mut node = &mut self.root;
        for step in parent.into_iter().flat_map(|p| p.split('.')) {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            node = node
                .as_object_mut()
                .unwrap()
                .entry(step.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node.as_object_mut().unwrap().insert(key.to_string(), value);
    }

    /// Delete the key at `path`. Missing paths are a no-op.
    pub fn delete(&mut self, path: &str) {
        let Some((parent, key)) = path.rsplit_once('.') else {
            if let Value::Object(map) = &mut self.root {
                map.remove(path);
            }
            return;
        };

        let mut node = &mut self.root;
        for step in parent.split('.') {
            match node {
                Value::Object(map) => match map.get_mut(step) {
                    Some(next) => node = next,
                    None => return,
                },
                _ => return,
            }
        }
        if let Value::Object(map) = node {
            map.remove(key);
        }
    }

    /// Append to the list at `path`, creating an empty list first when the
    /// path is missing or holds a non-list value.
    pub fn append(&mut self, path: &str, value: Value) {
        if !matches!(self.value(path), Some(Value::Array(_))) {
            self.set(path, Value::Array(Vec::new()));
        }
        let mut node = &mut self.root;
        for key in path.split('.') {
            node = node.as_object_mut().unwrap().get_mut(key).unwrap();
        }
        node.as_array_mut().unwrap().push(value);
    }

}

fn toml_to_json(contents: &str) -> Result<Value> {
    let parsed: toml::Value = toml::from_str(contents)?;
    Ok(serde_json::to_value(parsed)?)
}
