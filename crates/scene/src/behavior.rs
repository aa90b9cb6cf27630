//! Behaviour capabilities attached to scene nodes

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use avbuild_types::Platform;
use serde_json::Value;
use thiserror::Error;

use crate::graph::{NodeId, SceneGraph};
use crate::record::AttachmentRecord;

/// Error raised by a compile or removal step
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct StepError {
    pub message: String,
}

impl StepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<avbuild_errors::Error> for StepError {
    fn from(err: avbuild_errors::Error) -> Self {
        use avbuild_errors::UserFacingError;
        Self::new(err.user_message())
    }
}

/// What a step may touch while it runs
pub struct StepContext<'a> {
    /// The whole graph the subject lives in
    pub graph: &'a mut SceneGraph,
    /// Node carrying the step
    pub node: NodeId,
    /// Resolved build target
    pub platform: Platform,
    /// Per-run scratch directory
    pub temp_dir: &'a Path,
}

impl StepContext<'_> {
    /// Whether the carrier node still exists
    #[must_use]
    pub fn node_alive(&self) -> bool {
        self.graph.contains(self.node)
    }
}

/// A user authored module attached to a node.
///
/// Capabilities are exposed through accessor methods instead of runtime
/// type inspection; a behaviour that is a compile step returns `Some(self)`
/// from [`Behavior::compile_step`].
pub trait Behavior: Send + Sync + fmt::Debug {
    /// Registered type name, used for persistence and diagnostics
    fn type_name(&self) -> &str;

    /// Data persisted alongside the type name
    fn save(&self) -> Value {
        Value::Null
    }

    fn compile_step(&self) -> Option<&dyn CompileStep> {
        None
    }

    fn removal_step(&self) -> Option<&dyn RemoveOnBuild> {
        None
    }
}

/// Pre-packaging transformation, run in ascending [`CompileStep::priority`].
#[async_trait]
pub trait CompileStep: Send + Sync {
    /// Compile order; lower runs first
    fn priority(&self) -> i32;

    /// Synchronous phase
    ///
    /// # Errors
    ///
    /// A returned error stops the pipeline; no later step runs.
    fn compile(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError>;

    /// Asynchronous phase, awaited right after [`CompileStep::compile`]
    ///
    /// # Errors
    ///
    /// A returned error stops the pipeline; no later step runs.
    async fn compile_async(&self, _ctx: &mut StepContext<'_>) -> Result<(), StepError> {
        Ok(())
    }
}

/// Build-only scaffolding that strips itself before packaging.
///
/// After the hook returns, the pipeline detaches the behaviour from its node
/// if it is still attached. A hook that already detached itself, or deleted
/// its node, is not an error.
pub trait RemoveOnBuild: Send + Sync {
    /// # Errors
    ///
    /// Errors are collected; the remaining hooks still run.
    fn on_remove_on_build(&self, ctx: &mut StepContext<'_>) -> Result<(), StepError>;
}

/// Tombstone for an attachment whose type could not be resolved
#[derive(Debug, Clone, PartialEq)]
pub struct MissingBehavior {
    pub type_name: String,
    /// Original payload, kept so saving does not lose data
    pub data: Value,
    /// Why resolution failed
    pub reason: String,
}

/// One slot in a node's attachment list
#[derive(Debug, Clone)]
pub enum Attachment {
    Behavior(Arc<dyn Behavior>),
    Missing(MissingBehavior),
}

impl Attachment {
    pub fn behavior<B: Behavior + 'static>(behavior: B) -> Self {
        Self::Behavior(Arc::new(behavior))
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Behavior(behavior) => behavior.type_name(),
            Self::Missing(missing) => &missing.type_name,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }

    #[must_use]
    pub fn as_behavior(&self) -> Option<&Arc<dyn Behavior>> {
        match self {
            Self::Behavior(behavior) => Some(behavior),
            Self::Missing(_) => None,
        }
    }

    /// Whether this slot holds exactly `behavior` (same allocation)
    #[must_use]
    pub fn is_same(&self, behavior: &Arc<dyn Behavior>) -> bool {
        self.as_behavior()
            .is_some_and(|own| same_behavior(own, behavior))
    }

    #[must_use]
    pub fn to_record(&self) -> AttachmentRecord {
        match self {
            Self::Behavior(behavior) => AttachmentRecord {
                type_name: behavior.type_name().to_string(),
                data: behavior.save(),
            },
            Self::Missing(missing) => AttachmentRecord {
                type_name: missing.type_name.clone(),
                data: missing.data.clone(),
            },
        }
    }
}

/// Identity comparison on the data pointer, ignoring vtables
#[must_use]
pub fn same_behavior(a: &Arc<dyn Behavior>, b: &Arc<dyn Behavior>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a).cast::<()>(),
        Arc::as_ptr(b).cast::<()>(),
    )
}
