//! # Patch Builder
//!
//! Minimal RFC 6902 JSON patches against a single Kubernetes object.
//!
//! Every write this system makes is a JSON patch scoped to the keys it owns.
//! A [`PatchSet`] keeps map-creation operations ahead of everything else, so a
//! key can be added to an annotation map (or node selector) that does not exist
//! yet within the same atomic request.

use serde_json::{json, Value};

/// Pointer to an object's annotation map
pub const ANNOTATIONS_PATH: &str = "/metadata/annotations";

/// A single partial-update operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOp {
    /// Create an empty map at `path` (only emitted when the map is absent)
    CreateMap { path: String },
    /// Add `value` at `path`, overwriting an existing member
    Add { path: String, value: Value },
    /// Replace the existing member at `path`
    Replace { path: String, value: Value },
    /// Remove the existing member at `path`
    Remove { path: String },
}

impl PatchOp {
    /// Render the operation in RFC 6902 form
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            PatchOp::CreateMap { path } => json!({ "op": "add", "path": path, "value": {} }),
            PatchOp::Add { path, value } => json!({ "op": "add", "path": path, "value": value }),
            PatchOp::Replace { path, value } => {
                json!({ "op": "replace", "path": path, "value": value })
            }
            PatchOp::Remove { path } => json!({ "op": "remove", "path": path }),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            PatchOp::CreateMap { path }
            | PatchOp::Add { path, .. }
            | PatchOp::Replace { path, .. }
            | PatchOp::Remove { path } => path,
        }
    }
}

/// Ordered set of operations applied to one object in one request
///
/// The API server applies a JSON patch atomically: either every operation
/// succeeds or the object is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSet {
    map_creations: Vec<PatchOp>,
    operations: Vec<PatchOp>,
}

impl PatchSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch that writes annotations, creating the map first when the object has none
    #[must_use]
    pub fn for_annotations(annotations_present: bool) -> Self {
        let mut patch = Self::new();
        patch.ensure_map(ANNOTATIONS_PATH, annotations_present);
        patch
    }

    /// Queue creation of an empty map at `path` unless it already exists
    pub fn ensure_map(&mut self, path: &str, present: bool) -> &mut Self {
        if !present && !self.map_creations.iter().any(|op| op.path() == path) {
            self.map_creations.push(PatchOp::CreateMap {
                path: path.to_string(),
            });
        }
        self
    }

    pub fn add(&mut self, path: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.operations.push(PatchOp::Add {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    pub fn replace(&mut self, path: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.operations.push(PatchOp::Replace {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    pub fn remove(&mut self, path: impl Into<String>) -> &mut Self {
        self.operations.push(PatchOp::Remove { path: path.into() });
        self
    }

    /// Replace when the member exists, add when it does not
    pub fn upsert(
        &mut self,
        path: impl Into<String>,
        value: impl Into<Value>,
        present: bool,
    ) -> &mut Self {
        if present {
            self.replace(path, value)
        } else {
            self.add(path, value)
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map_creations.is_empty() && self.operations.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map_creations.len() + self.operations.len()
    }

    /// Operations in submission order (map creations first)
    pub fn iter(&self) -> impl Iterator<Item = &PatchOp> {
        self.map_creations.iter().chain(self.operations.iter())
    }

    /// RFC 6902 document for the whole set
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(self.iter().map(PatchOp::to_json).collect())
    }

    /// Typed patch accepted by `kube::api::Patch::Json`
    ///
    /// # Errors
    ///
    /// Returns an error if an operation path is not a valid JSON pointer.
    pub fn to_json_patch(&self) -> Result<json_patch::Patch, serde_json::Error> {
        serde_json::from_value(self.to_json())
    }
}

/// Escape one reference token per RFC 6901 (`~` then `/`)
#[must_use]
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Build a JSON pointer from unescaped segments
#[must_use]
pub fn pointer(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|segment| format!("/{}", escape_token(segment)))
        .collect()
}

/// Pointer to one annotation key
#[must_use]
pub fn annotation_path(key: &str) -> String {
    format!("{ANNOTATIONS_PATH}/{}", escape_token(key))
}
