//! Maps persisted type names to behaviour constructors

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::behavior::{Attachment, Behavior, MissingBehavior};

/// Builds a behaviour from its saved payload
pub type BehaviorFactory =
    Arc<dyn Fn(&Value) -> Result<Arc<dyn Behavior>, String> + Send + Sync>;

/// Registry of behaviour types known to this process
#[derive(Clone, Default)]
pub struct BehaviorRegistry {
    factories: HashMap<String, BehaviorFactory>,
}

impl BehaviorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a factory
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Value) -> Result<Arc<dyn Behavior>, String> + Send + Sync + 'static,
    {
        self.factories.insert(type_name.into(), Arc::new(factory));
        self
    }

    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a saved attachment. Unknown types and failing factories
    /// become tombstones instead of errors.
    #[must_use]
    pub fn instantiate(&self, type_name: &str, data: &Value) -> Attachment {
        let Some(factory) = self.factories.get(type_name) else {
            debug!(type_name, "behaviour type not registered");
            return Attachment::Missing(MissingBehavior {
                type_name: type_name.to_string(),
                data: data.clone(),
                reason: "type is not registered".to_string(),
            });
        };
        match factory(data) {
            Ok(behavior) => Attachment::Behavior(behavior),
            Err(reason) => {
                debug!(type_name, %reason, "behaviour factory failed");
                Attachment::Missing(MissingBehavior {
                    type_name: type_name.to_string(),
                    data: data.clone(),
                    reason,
                })
            }
        }
    }
}

impl fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
