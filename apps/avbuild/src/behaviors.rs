//! Behaviour types this binary can load from scene files

use std::sync::Arc;

use avbuild_scene::{
    Attachment, Behavior, BehaviorRegistry, CompileStep, RemoveOnBuild, StepContext, StepError,
};
use serde_json::{json, Value};

pub const AVATAR_DESCRIPTOR: &str = "avatar_descriptor";
pub const EDITOR_ONLY: &str = "editor_only";
pub const PROPERTY: &str = "property";

/// Registry with every built-in behaviour
pub fn builtin_registry() -> BehaviorRegistry {
    let mut registry = BehaviorRegistry::new();
    registry
        .register(AVATAR_DESCRIPTOR, |data: &Value| {
            Ok(Arc::new(AvatarDescriptor { data: data.clone() }) as Arc<dyn Behavior>)
        })
        .register(EDITOR_ONLY, |_: &Value| {
            Ok(Arc::new(EditorOnly) as Arc<dyn Behavior>)
        })
        .register(PROPERTY, |data: &Value| {
            if data.is_object() || data.is_null() {
                Ok(Arc::new(Property { data: data.clone() }) as Arc<dyn Behavior>)
            } else {
                Err(format!("property payload must be an object, got {data}"))
            }
        });
    registry
}

/// Marks the subject root. Runs last and stamps the resolved platform onto
/// its node as a `property` attachment.
#[derive(Debug, Clone)]
pub struct AvatarDescriptor {
    data: Value,
}

impl AvatarDescriptor {
    pub const PRIORITY: i32 = 9999;
}

impl Behavior for AvatarDescriptor {
    fn type_name(&self) -> &str {
        AVATAR_DESCRIPTOR
    }

    fn save(&self) -> Value {
        self.data.clone()
    }

    fn compile_step(&self) -> Option<&dyn CompileStep> {
        Some(self)
    }
}

impl CompileStep for AvatarDescriptor {
    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn compile(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        let property = Property {
            data: json!({ "platform": ctx.platform.name() }),
        };
        ctx.graph
            .attach(ctx.node, Attachment::behavior(property))
            .map_err(|e| StepError::new(e.to_string()))?;
        Ok(())
    }
}

/// Scaffolding that only exists in the editor; its whole node goes away
/// before packaging.
#[derive(Debug, Clone, Copy)]
pub struct EditorOnly;

impl Behavior for EditorOnly {
    fn type_name(&self) -> &str {
        EDITOR_ONLY
    }

    fn removal_step(&self) -> Option<&dyn RemoveOnBuild> {
        Some(self)
    }
}

impl RemoveOnBuild for EditorOnly {
    fn on_remove_on_build(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        if !ctx.node_alive() {
            return Ok(());
        }
        ctx.graph
            .remove_node(ctx.node)
            .map_err(|e| StepError::new(e.to_string()))
    }
}

/// Plain key/value data
#[derive(Debug, Clone)]
pub struct Property {
    data: Value,
}

impl Behavior for Property {
    fn type_name(&self) -> &str {
        PROPERTY
    }

    fn save(&self) -> Value {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avbuild_scene::SceneGraph;
    use avbuild_types::Platform;
    use std::path::Path;

    fn context<'a>(graph: &'a mut SceneGraph, node: avbuild_scene::NodeId) -> StepContext<'a> {
        StepContext {
            graph,
            node,
            platform: Platform::Android,
            temp_dir: Path::new("/tmp"),
        }
    }

    #[test]
    fn registry_knows_every_builtin() {
        let registry = builtin_registry();
        assert_eq!(
            registry.type_names(),
            vec![AVATAR_DESCRIPTOR, EDITOR_ONLY, PROPERTY]
        );
        assert!(registry.instantiate(PROPERTY, &json!(3)).is_missing());
        assert!(!registry.instantiate(PROPERTY, &json!({"a": 1})).is_missing());
    }

    #[test]
    fn descriptor_records_platform() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("Avatar");
        let descriptor = AvatarDescriptor { data: Value::Null };
        descriptor.compile(&mut context(&mut graph, root)).unwrap();

        let attachments = graph.node(root).unwrap().attachments();
        assert_eq!(attachments.len(), 1);
        let saved = attachments[0].to_record();
        assert_eq!(saved.type_name, PROPERTY);
        assert_eq!(saved.data, json!({"platform": "android"}));
    }

    #[test]
    fn editor_only_deletes_its_subtree() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("Avatar");
        let tools = graph.add_child(root, "Tools").unwrap();
        graph.add_child(tools, "Gizmo").unwrap();

        EditorOnly.on_remove_on_build(&mut context(&mut graph, tools)).unwrap();
        assert_eq!(graph.descendants(root), vec![root]);
        EditorOnly.on_remove_on_build(&mut context(&mut graph, tools)).unwrap();
    }
}
