//! # Workflow Registry
//!
//! Maps `workflow_ref` strings to executable workflow handlers. The
//! registry is an explicit collaborator passed into the runner at
//! construction: no global mutable state, and tests swap in doubles without
//! any monkeypatching.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{FlowgateError, Result};

/// An executable workflow function.
///
/// Receives the task's fully merged params and returns its output mapping;
/// an `Err` propagates as a task failure (and is retried within the task's
/// budget).
#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    async fn execute(&self, params: &Map<String, Value>) -> Result<Map<String, Value>>;
}

/// Adapter for plain closures, mostly used by tests and built-in utilities
struct FnHandler<F> {
    func: F,
}

#[async_trait]
impl<F> WorkflowHandler for FnHandler<F>
where
    F: Fn(&Map<String, Value>) -> Result<Map<String, Value>> + Send + Sync,
{
    async fn execute(&self, params: &Map<String, Value>) -> Result<Map<String, Value>> {
        (self.func)(params)
    }
}

/// Thread-safe registry of workflow handlers
///
/// # Examples
///
/// ```rust
/// use flowgate_core::runner::WorkflowRegistry;
/// use serde_json::Map;
///
/// let registry = WorkflowRegistry::new();
/// registry.register_fn("notify.echo", |params| Ok(params.clone()));
///
/// # tokio_test::block_on(async {
/// let handler = registry.resolve("notify.echo").unwrap();
/// let output = handler.execute(&Map::new()).await.unwrap();
/// assert!(output.is_empty());
/// # });
/// ```
#[derive(Default)]
pub struct WorkflowRegistry {
    handlers: DashMap<String, Arc<dyn WorkflowHandler>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `workflow_ref`, replacing any previous one
    pub fn register(&self, workflow_ref: impl Into<String>, handler: Arc<dyn WorkflowHandler>) {
        let workflow_ref = workflow_ref.into();
        debug!(workflow_ref = %workflow_ref, "workflow registered");
        self.handlers.insert(workflow_ref, handler);
    }

    /// Register a synchronous closure as a handler
    pub fn register_fn<F>(&self, workflow_ref: impl Into<String>, func: F)
    where
        F: Fn(&Map<String, Value>) -> Result<Map<String, Value>> + Send + Sync + 'static,
    {
        self.register(workflow_ref, Arc::new(FnHandler { func }));
    }

    /// Resolve a `workflow_ref` to its handler
    pub fn resolve(&self, workflow_ref: &str) -> Result<Arc<dyn WorkflowHandler>> {
        self.handlers
            .get(workflow_ref)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| FlowgateError::unknown_workflow(workflow_ref))
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Registered refs, sorted for stable output
    pub fn registered_refs(&self) -> Vec<String> {
        let mut refs: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        refs.sort();
        refs
    }
}

impl std::fmt::Debug for dyn WorkflowHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WorkflowHandler")
    }
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}
