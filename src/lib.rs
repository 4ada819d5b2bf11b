/// Flowrunner: typed node-graph workflow runner
///
/// Accepts a graph of typed nodes plus raw per-node values, executes it with a
/// readiness-queue scheduler, and returns every node's input and output. Node
/// behaviour lives in pluggable processors looked up by type tag.

// Core configuration and setup
pub mod config;

// Engine and graph error types
pub mod error;

// Workflow model - nodes, edges, raw values and the validated execution graph
pub mod workflow;

// Runtime execution engine - readiness-queue scheduling and result bookkeeping
pub mod runtime;

// External services used by processors
pub mod llm;
pub mod mail;

// Built-in node processors (text, JSON, file, prompt, logic, email)
pub mod processors;

// HTTP API layer - run-workflow endpoint
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use error::{EngineError, GraphError};
pub use runtime::{
    EngineOptions, ExecutionMode, NodeProcessor, ProcessorContext, ProcessorRegistry, ResultMode, WorkflowEngine,
    WorkflowResult,
};
pub use server::{create_app, start_server};
pub use workflow::{Edge, Node, NodeInputBundle, NodeResult, NodeValues, RawValue};
