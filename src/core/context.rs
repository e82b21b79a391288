//! Execution context - request-scoped entries plus process-wide defaults

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Context key under which dispatch records the backend's name, so a running
/// task's own submissions can be resolved back to the same backend.
pub const EXECUTOR_KEY: &str = "_executor";

static AMBIENT: OnceLock<ExecutionContext> = OnceLock::new();

/// Key/value entries carried into every dispatched stage
///
/// A dispatch receives a request-scoped context, merges in the process-wide
/// ambient defaults, and hands the merged copy to each stage. The ambient
/// defaults are resolved once at process start and read-only thereafter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    entries: HashMap<String, Value>,
}

impl ExecutionContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `defaults` into this context. Default entries take precedence
    /// over request entries; `defaults` itself is left untouched.
    pub fn merged(mut self, defaults: &ExecutionContext) -> Self {
        for (key, value) in &defaults.entries {
            self.entries.insert(key.clone(), value.clone());
        }
        self
    }

    /// Merge the process-wide ambient defaults into this context
    pub fn with_ambient(self) -> Self {
        self.merged(ambient())
    }

    /// Record the dispatching backend under [`EXECUTOR_KEY`]
    pub fn with_executor(mut self, name: &str) -> Self {
        self.entries
            .insert(EXECUTOR_KEY.to_string(), Value::String(name.to_string()));
        self
    }
}

/// Set the process-wide ambient defaults. May only succeed once; returns the
/// rejected context if the defaults were already resolved.
pub fn init_ambient(context: ExecutionContext) -> Result<(), ExecutionContext> {
    AMBIENT.set(context)
}

/// The process-wide ambient defaults, resolving to an empty context if
/// [`init_ambient`] was never called.
pub fn ambient() -> &'static ExecutionContext {
    AMBIENT.get_or_init(ExecutionContext::default)
}
