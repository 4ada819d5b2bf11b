/// Workflow data model
///
/// - Type definitions crossing the engine boundary (Node, Edge, RawValue, bundles, results)
/// - The execution graph derived from a submitted node/edge set

// Core workflow type definitions
pub mod types;

// Adjacency / in-degree structure built once per run
pub mod graph;

// Re-export commonly used types
pub use graph::ExecutionGraph;
pub use types::{
    Edge, FilePayload, Node, NodeData, NodeInputBundle, NodeResult, NodeValues, RawValue,
    DEFAULT_NODE_LABEL,
};
