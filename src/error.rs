/// Engine error taxonomy
///
/// Graph problems are detected before any node runs. Everything else that ends a
/// run early is an engine failure. Node-local structured errors are NOT errors
/// here: they are ordinary output values and flow downstream like any other.

use thiserror::Error;

/// Problems found while building the execution graph from nodes and edges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Two nodes share the same identifier
    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    /// An edge endpoint does not name a node in the node list
    #[error("edge {source_id} -> {target_id} references unknown node '{missing}'")]
    DanglingEdge {
        source_id: String,
        target_id: String,
        missing: String,
    },
}

/// Errors that abort a whole workflow run.
///
/// There is no partial-success mode: a run either yields a complete
/// `WorkflowResult` or exactly one of these.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Graph construction failed; the run never started
    #[error("invalid workflow graph: {0}")]
    GraphValidation(#[from] GraphError),

    /// The readiness queue drained while nodes were still waiting on predecessors
    #[error("workflow contains a cycle (node '{cycle_node}' is on it); unscheduled nodes: {}", unscheduled.join(", "))]
    GraphCycle {
        cycle_node: String,
        unscheduled: Vec<String>,
    },

    /// A capability raised a fault instead of returning a structured result
    #[error("Error processing node {label}: {message}")]
    NodeFailed {
        node_id: String,
        label: String,
        message: String,
    },

    /// The caller cancelled the run before every node was dispatched
    #[error("workflow run cancelled after {completed} node(s)")]
    Cancelled { completed: usize },

    /// A bookkeeping invariant was violated (a node produced two results)
    #[error("internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable category used by the HTTP layer
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::GraphValidation(_) => "graph_validation",
            EngineError::GraphCycle { .. } => "graph_cycle",
            EngineError::NodeFailed { .. } | EngineError::Internal(_) => "engine_failure",
            EngineError::Cancelled { .. } => "cancelled",
        }
    }

    /// True when the run was rejected before any capability could be invoked
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            EngineError::GraphValidation(_) | EngineError::GraphCycle { .. }
        )
    }
}
