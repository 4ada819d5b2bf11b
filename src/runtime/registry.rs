/// Processor registry: node type tag -> processing capability
///
/// Adding a node type means registering another processor; the scheduler never
/// branches on type tags.

use crate::runtime::context::ProcessorContext;
use crate::workflow::types::{NodeInputBundle, NodeValues};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};

/// A type-specific processing capability
///
/// Return `Ok` with any value, including a structured error such as
/// `{"status": "error", "message": ...}`; that is recorded as the node's output
/// and flows downstream. Return `Err` only for faults that should abort the
/// whole run.
#[async_trait]
pub trait NodeProcessor: Send + Sync {
    async fn process(
        &self,
        ctx: &ProcessorContext,
        label: &str,
        bundle: &NodeInputBundle,
        values: &NodeValues,
    ) -> anyhow::Result<Value>;
}

/// Fallback for type tags with no registered processor
#[derive(Debug, Clone)]
pub struct UnsupportedProcessor {
    node_type: String,
}

impl UnsupportedProcessor {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
        }
    }
}

#[async_trait]
impl NodeProcessor for UnsupportedProcessor {
    async fn process(
        &self,
        _ctx: &ProcessorContext,
        label: &str,
        _bundle: &NodeInputBundle,
        _values: &NodeValues,
    ) -> anyhow::Result<Value> {
        tracing::warn!("⚠️ No processor registered for type '{}' (node '{}')", self.node_type, label);
        Ok(json!({
            "status": "error",
            "message": format!("Unsupported node type: {}", self.node_type),
        }))
    }
}

/// Table of processors keyed by node type tag
#[derive(Default, Clone)]
pub struct ProcessorRegistry {
    processors: HashMap<String, Arc<dyn NodeProcessor>>,
}

impl ProcessorRegistry {
    /// Empty registry; every lookup resolves to `UnsupportedProcessor`
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the processor for a type tag
    pub fn register(&mut self, node_type: impl Into<String>, processor: Arc<dyn NodeProcessor>) {
        let node_type = node_type.into();
        if self.processors.insert(node_type.clone(), processor).is_some() {
            tracing::debug!("🔁 Replaced processor for node type '{}'", node_type);
        }
    }

    /// Builder-style `register`
    pub fn with(mut self, node_type: impl Into<String>, processor: Arc<dyn NodeProcessor>) -> Self {
        self.register(node_type, processor);
        self
    }

    /// Processor for a tag, or the unsupported-type fallback
    pub fn resolve(&self, node_type: &str) -> Arc<dyn NodeProcessor> {
        match self.processors.get(node_type) {
            Some(processor) => Arc::clone(processor),
            None => Arc::new(UnsupportedProcessor::new(node_type)),
        }
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.processors.contains_key(node_type)
    }

    /// Registered type tags, sorted
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}
