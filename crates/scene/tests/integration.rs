//! Integration tests for the scene graph and capability discovery

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use avbuild_scene::*;
    use avbuild_types::Platform;
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Ordered(i32);

    impl Behavior for Ordered {
        fn type_name(&self) -> &str {
            "ordered"
        }

        fn save(&self) -> Value {
            json!({ "priority": self.0 })
        }

        fn compile_step(&self) -> Option<&dyn CompileStep> {
            Some(self)
        }
    }

    #[async_trait]
    impl CompileStep for Ordered {
        fn priority(&self) -> i32 {
            self.0
        }

        fn compile(&self, _ctx: &mut StepContext<'_>) -> Result<(), StepError> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct SelfDeleting;

    impl Behavior for SelfDeleting {
        fn type_name(&self) -> &str {
            "self_deleting"
        }

        fn removal_step(&self) -> Option<&dyn RemoveOnBuild> {
            Some(self)
        }
    }

    impl RemoveOnBuild for SelfDeleting {
        fn on_remove_on_build(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError> {
            ctx.graph
                .remove_node(ctx.node)
                .map_err(|e| StepError::new(e.to_string()))
        }
    }

    fn registry() -> BehaviorRegistry {
        let mut registry = BehaviorRegistry::new();
        registry.register("ordered", |data: &Value| {
            let priority = data
                .get("priority")
                .and_then(Value::as_i64)
                .and_then(|p| i32::try_from(p).ok())
                .ok_or_else(|| "priority missing".to_string())?;
            Ok(Arc::new(Ordered(priority)) as Arc<dyn Behavior>)
        });
        registry
    }

    #[test]
    fn compile_steps_sort_by_priority() {
        let record = SceneRecord {
            version: SCENE_FORMAT_VERSION,
            roots: vec![NodeRecord::new("Avatar")
                .with_attachment("ordered", json!({"priority": 3}))
                .with_child(
                    NodeRecord::new("A").with_attachment("ordered", json!({"priority": 1})),
                )
                .with_child(
                    NodeRecord::new("B").with_attachment("ordered", json!({"priority": 2})),
                )],
        };
        let graph = SceneGraph::from_record(&record, &registry()).unwrap();
        let root = graph.roots()[0];
        let priorities: Vec<i32> = compile_steps(&graph, root)
            .iter()
            .filter_map(|d| d.behavior.compile_step().map(|s| s.priority()))
            .collect();
        assert_eq!(priorities, vec![1, 2, 3]);
    }

    #[test]
    fn shared_behaviour_is_discovered_once() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("Avatar");
        let child = graph.add_child(root, "Child").unwrap();
        let shared: Arc<dyn Behavior> = Arc::new(Ordered(5));
        graph.attach(root, Attachment::Behavior(Arc::clone(&shared))).unwrap();
        graph.attach(child, Attachment::Behavior(Arc::clone(&shared))).unwrap();

        let steps = compile_steps(&graph, root);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].node, root);
    }

    #[test]
    fn discovery_only_walks_the_subject_subtree() {
        let mut graph = SceneGraph::new();
        let subject = graph.add_root("Avatar");
        let other = graph.add_root("Other");
        graph.attach(other, Attachment::behavior(Ordered(1))).unwrap();
        graph.attach(other, Attachment::behavior(SelfDeleting)).unwrap();
        assert!(compile_steps(&graph, subject).is_empty());
        assert!(removal_steps(&graph, subject).is_empty());
    }

    #[test]
    fn removal_hook_may_delete_its_own_node() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("Avatar");
        let scaffold = graph.add_child(root, "EditorOnly").unwrap();
        graph.attach(scaffold, Attachment::behavior(SelfDeleting)).unwrap();

        let hooks = removal_steps(&graph, root);
        assert_eq!(hooks.len(), 1);
        let hook = &hooks[0];
        let mut ctx = StepContext {
            graph: &mut graph,
            node: hook.node,
            platform: Platform::Windows,
            temp_dir: Path::new("/tmp"),
        };
        hook.behavior
            .removal_step()
            .unwrap()
            .on_remove_on_build(&mut ctx)
            .unwrap();
        assert!(!ctx.node_alive());
        assert!(!graph.detach_behavior(hook.node, &hook.behavior));
    }

    #[tokio::test]
    async fn default_async_phase_is_a_no_op() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("Avatar");
        let step = Ordered(1);
        let mut ctx = StepContext {
            graph: &mut graph,
            node: root,
            platform: Platform::Linux,
            temp_dir: Path::new("/tmp"),
        };
        step.compile(&mut ctx).unwrap();
        step.compile_async(&mut ctx).await.unwrap();
    }

    #[test]
    fn subtree_record_round_trips_through_json() {
        let mut graph = SceneGraph::new();
        let root = graph.add_root("Avatar");
        let child = graph.add_child(root, "Hat").unwrap();
        graph.set_active(child, false).unwrap();
        graph.attach(child, Attachment::behavior(Ordered(7))).unwrap();

        let record = graph.subtree_record(root).unwrap();
        let text = serde_json::to_string(&record).unwrap();
        let back: NodeRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
        assert!(!back.children[0].active);
        assert_eq!(back.children[0].attachments[0].data, json!({"priority": 7}));
    }
}
