//! Arena backed scene graph

use std::fmt;
use std::sync::Arc;

use avbuild_errors::SceneError;
use serde::{Deserialize, Serialize};

use crate::behavior::{Attachment, Behavior};

/// Index of a node in its [`SceneGraph`]. Ids are never reused within a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    active: bool,
    /// Locked nodes belong to read-only content; routine cleanup skips them.
    locked: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attachments: Vec<Attachment>,
}

impl Node {
    fn new(name: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            active: true,
            locked: false,
            parent,
            children: Vec::new(),
            attachments: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }
}

/// Ownership tree of nodes, possibly with several roots
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<Option<Node>>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(Some(node));
        id
    }

    fn get(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.node(id)
            .ok_or(SceneError::NodeNotFound { id: id.index() })
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(SceneError::NodeNotFound { id: id.index() })
    }

    pub fn add_root(&mut self, name: impl Into<String>) -> NodeId {
        let id = self.push(Node::new(name, None));
        self.roots.push(id);
        id
    }

    /// # Errors
    ///
    /// Returns `SceneError::NodeNotFound` if `parent` does not exist.
    pub fn add_child(&mut self, parent: NodeId, name: impl Into<String>) -> Result<NodeId, SceneError> {
        self.get(parent)?;
        let id = self.push(Node::new(name, Some(parent)));
        self.get_mut(parent)?.children.push(id);
        Ok(id)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of live nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// # Errors
    ///
    /// Returns `SceneError::NodeNotFound` if the node does not exist.
    pub fn set_active(&mut self, id: NodeId, active: bool) -> Result<(), SceneError> {
        self.get_mut(id)?.active = active;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SceneError::NodeNotFound` if the node does not exist.
    pub fn set_locked(&mut self, id: NodeId, locked: bool) -> Result<(), SceneError> {
        self.get_mut(id)?.locked = locked;
        Ok(())
    }

    /// Active and every ancestor active
    #[must_use]
    pub fn is_active_in_hierarchy(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            match self.node(current) {
                Some(node) if node.active => cursor = node.parent,
                _ => return false,
            }
        }
        true
    }

    /// Delete a node and its whole subtree
    ///
    /// # Errors
    ///
    /// Returns `SceneError::NodeNotFound` if the node does not exist.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), SceneError> {
        let parent = self.get(id)?.parent;
        match parent {
            Some(parent) => {
                if let Ok(parent) = self.get_mut(parent) {
                    parent.children.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
        for doomed in self.descendants(id) {
            if let Some(slot) = self.nodes.get_mut(doomed.index()) {
                *slot = None;
            }
        }
        Ok(())
    }

    /// Append an attachment and return its index
    ///
    /// # Errors
    ///
    /// Returns `SceneError::NodeNotFound` if the node does not exist.
    pub fn attach(&mut self, id: NodeId, attachment: Attachment) -> Result<usize, SceneError> {
        let node = self.get_mut(id)?;
        node.attachments.push(attachment);
        Ok(node.attachments.len() - 1)
    }

    /// # Errors
    ///
    /// Returns an error if the node does not exist or the index is out of range.
    pub fn detach_at(&mut self, id: NodeId, index: usize) -> Result<Attachment, SceneError> {
        let name = self.get(id)?.name.clone();
        let node = self.get_mut(id)?;
        if index >= node.attachments.len() {
            return Err(SceneError::AttachmentOutOfRange { node: name, index });
        }
        Ok(node.attachments.remove(index))
    }

    /// Remove `behavior` from `id` if it is still attached there.
    /// Returns whether anything was removed.
    pub fn detach_behavior(&mut self, id: NodeId, behavior: &Arc<dyn Behavior>) -> bool {
        let Ok(node) = self.get_mut(id) else {
            return false;
        };
        let before = node.attachments.len();
        node.attachments.retain(|slot| !slot.is_same(behavior));
        before != node.attachments.len()
    }

    #[must_use]
    pub fn has_behavior(&self, id: NodeId, behavior: &Arc<dyn Behavior>) -> bool {
        self.node(id)
            .is_some_and(|node| node.attachments.iter().any(|slot| slot.is_same(behavior)))
    }

    /// Pre-order walk starting at (and including) `root`
    #[must_use]
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Indices of tombstone attachments on one node
    #[must_use]
    pub fn missing_indices(&self, id: NodeId) -> Vec<usize> {
        self.node(id)
            .map(|node| {
                node.attachments
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.is_missing())
                    .map(|(index, _)| index)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop every tombstone on one node, returning how many were removed
    pub fn remove_missing(&mut self, id: NodeId) -> usize {
        let Ok(node) = self.get_mut(id) else {
            return 0;
        };
        let before = node.attachments.len();
        node.attachments.retain(|slot| !slot.is_missing());
        before - node.attachments.len()
    }

    /// Slash separated names from the root down to `id`
    #[must_use]
    pub fn node_path(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.node(current) else {
                break;
            };
            parts.push(node.name.as_str());
            cursor = node.parent;
        }
        parts.reverse();
        parts.join("/")
    }

    /// Resolve a slash separated path such as `Root/Avatar/Armature`
    #[must_use]
    pub fn find_path(&self, path: &str) -> Option<NodeId> {
        let mut segments = path.split('/').filter(|segment| !segment.is_empty());
        let first = segments.next()?;
        let mut current = *self
            .roots
            .iter()
            .find(|root| self.node(**root).is_some_and(|node| node.name == first))?;
        for segment in segments {
            let node = self.node(current)?;
            current = *node
                .children
                .iter()
                .find(|child| self.node(**child).is_some_and(|node| node.name == segment))?;
        }
        Some(current)
    }

    /// Like [`SceneGraph::find_path`] but with an error for callers that need one
    ///
    /// # Errors
    ///
    /// Returns `SceneError::PathNotFound` when no node matches.
    pub fn resolve_path(&self, path: &str) -> Result<NodeId, SceneError> {
        self.find_path(path).ok_or_else(|| SceneError::PathNotFound {
            path: path.to_string(),
        })
    }
}
