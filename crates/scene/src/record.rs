//! Serializable scene and prefab records

use avbuild_errors::SceneError;
use avbuild_types::Platform;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::{NodeId, SceneGraph};
use crate::registry::BehaviorRegistry;

pub const SCENE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub roots: Vec<NodeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// Intermediate artifact written by the packager: one subject subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefabRecord {
    pub name: String,
    pub source_document: String,
    pub platform: Platform,
    pub root: NodeRecord,
}

fn default_version() -> u32 {
    SCENE_FORMAT_VERSION
}

fn default_true() -> bool {
    true
}

impl NodeRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
            locked: false,
            attachments: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attachment(mut self, type_name: impl Into<String>, data: Value) -> Self {
        self.attachments.push(AttachmentRecord {
            type_name: type_name.into(),
            data,
        });
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: NodeRecord) -> Self {
        self.children.push(child);
        self
    }
}

impl SceneGraph {
    /// Rebuild a graph, resolving attachments through `registry`
    ///
    /// # Errors
    ///
    /// Returns `SceneError::InvalidRecord` for records from a newer format.
    pub fn from_record(record: &SceneRecord, registry: &BehaviorRegistry) -> Result<Self, SceneError> {
        if record.version > SCENE_FORMAT_VERSION {
            return Err(SceneError::InvalidRecord {
                message: format!(
                    "scene format version {} is newer than supported {SCENE_FORMAT_VERSION}",
                    record.version
                ),
            });
        }
        let mut graph = SceneGraph::new();
        for root in &record.roots {
            let id = graph.add_root(root.name.clone());
            graph.fill_from_record(id, root, registry)?;
        }
        Ok(graph)
    }

    fn fill_from_record(
        &mut self,
        id: NodeId,
        record: &NodeRecord,
        registry: &BehaviorRegistry,
    ) -> Result<(), SceneError> {
        self.set_active(id, record.active)?;
        self.set_locked(id, record.locked)?;
        for attachment in &record.attachments {
            self.attach(id, registry.instantiate(&attachment.type_name, &attachment.data))?;
        }
        for child in &record.children {
            let child_id = self.add_child(id, child.name.clone())?;
            self.fill_from_record(child_id, child, registry)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn to_record(&self) -> SceneRecord {
        SceneRecord {
            version: SCENE_FORMAT_VERSION,
            roots: self
                .roots()
                .iter()
                .filter_map(|root| self.subtree_record(*root).ok())
                .collect(),
        }
    }

    /// Record of one node and everything below it
    ///
    /// # Errors
    ///
    /// Returns `SceneError::NodeNotFound` if `id` does not exist.
    pub fn subtree_record(&self, id: NodeId) -> Result<NodeRecord, SceneError> {
        let node = self
            .node(id)
            .ok_or(SceneError::NodeNotFound { id: id.index() })?;
        let mut children = Vec::with_capacity(node.children().len());
        for child in node.children() {
            children.push(self.subtree_record(*child)?);
        }
        Ok(NodeRecord {
            name: node.name().to_string(),
            active: node.is_active(),
            locked: node.is_locked(),
            attachments: node.attachments().iter().map(|a| a.to_record()).collect(),
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{Attachment, Behavior};
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Property(Value);

    impl Behavior for Property {
        fn type_name(&self) -> &str {
            "property"
        }

        fn save(&self) -> Value {
            self.0.clone()
        }
    }

    fn registry() -> BehaviorRegistry {
        let mut registry = BehaviorRegistry::new();
        registry.register("property", |data: &Value| {
            Ok(Arc::new(Property(data.clone())) as Arc<dyn Behavior>)
        });
        registry.register("broken", |_: &Value| Err("bad payload".to_string()));
        registry
    }

    #[test]
    fn unknown_types_load_as_tombstones_and_save_unchanged() {
        let record = SceneRecord {
            version: 1,
            roots: vec![NodeRecord::new("Root")
                .with_attachment("property", json!({"k": 1}))
                .with_attachment("vanished", json!({"keep": true}))
                .with_attachment("broken", Value::Null)],
        };
        let graph = SceneGraph::from_record(&record, &registry()).unwrap();
        let root = graph.roots()[0];
        let attachments = graph.node(root).unwrap().attachments();
        assert!(matches!(attachments[0], Attachment::Behavior(_)));
        assert!(attachments[1].is_missing());
        match &attachments[2] {
            Attachment::Missing(missing) => assert_eq!(missing.reason, "bad payload"),
            Attachment::Behavior(_) => panic!("factory failure should tombstone"),
        }
        assert_eq!(graph.to_record(), record);
    }

    #[test]
    fn json_defaults_fill_optional_fields() {
        let record: SceneRecord =
            serde_json::from_str(r#"{"roots":[{"name":"Root","children":[{"name":"A"}]}]}"#)
                .unwrap();
        assert_eq!(record.version, SCENE_FORMAT_VERSION);
        assert!(record.roots[0].active);
        assert_eq!(record.roots[0].children[0].name, "A");
    }

    #[test]
    fn newer_format_is_rejected() {
        let record = SceneRecord {
            version: SCENE_FORMAT_VERSION + 1,
            roots: Vec::new(),
        };
        assert!(matches!(
            SceneGraph::from_record(&record, &registry()),
            Err(SceneError::InvalidRecord { .. })
        ));
    }
}
