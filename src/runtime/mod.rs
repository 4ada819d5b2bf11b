/// Runtime Execution Engine
///
/// Readiness-queue execution of workflow graphs:
/// - Per-node input aggregation from upstream results
/// - Type-tag dispatch through the processor registry
/// - Append-only result bookkeeping and result-shape derivation
/// - Fail-fast error propagation and cancellation

// Input bundle composition for a node about to run
pub mod aggregator;

// Shared external services threaded through every processor call
pub mod context;

// Scheduler: run lifecycle and dispatch loop
pub mod engine;

// Node type tag -> processing capability table
pub mod registry;

// Per-run result store and WorkflowResult derivation
pub mod store;

// Re-export main types
pub use context::ProcessorContext;
pub use engine::{EngineOptions, ExecutionMode, RunState, WorkflowEngine, WorkflowRun};
pub use registry::{NodeProcessor, ProcessorRegistry, UnsupportedProcessor};
pub use store::{ResultMode, ResultStore, WorkflowResult};
