/// Readiness-queue DAG execution engine
///
/// Runs every node of a submitted workflow in dependency order:
/// 1. Seed a FIFO with zero in-degree nodes in node-list order
/// 2. Pop a node, compose its input bundle, invoke its processor, record the result
/// 3. Decrement successor in-degrees in adjacency order, enqueueing each at zero
/// 4. Cycles are rejected before the first dispatch; a drained queue with
///    unscheduled nodes left is reported the same way
///
/// The first processor fault fails the whole run; no partial results escape.

use crate::error::EngineError;
use crate::runtime::aggregator::compose;
use crate::runtime::context::ProcessorContext;
use crate::runtime::registry::ProcessorRegistry;
use crate::runtime::store::{ResultMode, ResultStore, WorkflowResult};
use crate::workflow::graph::ExecutionGraph;
use crate::workflow::types::{Edge, Node, NodeResult, NodeValues, RawValue};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::VecDeque, str::FromStr, sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How ready nodes are dispatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One node at a time, strict FIFO order
    #[default]
    Sequential,
    /// Every node in the readiness queue is dispatched concurrently; results are
    /// committed in queue order once the whole wave has finished
    Wavefront,
}

impl FromStr for ExecutionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" | "serial" => Ok(ExecutionMode::Sequential),
            "wavefront" | "parallel" => Ok(ExecutionMode::Wavefront),
            other => Err(anyhow::anyhow!("Unknown execution mode: {}", other)),
        }
    }
}

/// Engine-wide knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    pub result_mode: ResultMode,
    pub execution_mode: ExecutionMode,
}

/// Lifecycle of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Graph built, queue seeded
    Pending,
    /// Dispatch loop active
    Running,
    Completed,
    Failed,
}

/// Workflow execution engine
///
/// Holds the processor table and the shared context; each call to `prepare`
/// or `run` gets its own graph, queue and result store.
#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    registry: Arc<ProcessorRegistry>,
    context: ProcessorContext,
    options: EngineOptions,
}

impl WorkflowEngine {
    pub fn new(registry: Arc<ProcessorRegistry>, context: ProcessorContext) -> Self {
        Self {
            registry,
            context,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    /// Validate the graph and seed a run without executing anything
    pub fn prepare(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        values: NodeValues,
    ) -> Result<WorkflowRun<'_>, EngineError> {
        let graph = ExecutionGraph::build(nodes, edges).map_err(|e| {
            tracing::error!("❌ Workflow graph rejected: {}", e);
            EngineError::from(e)
        })?;

        // Cycles fail before any dispatch
        if let Some(cycle_node) = graph.cycle_member() {
            let err = EngineError::GraphCycle {
                cycle_node: cycle_node.to_string(),
                unscheduled: graph.unschedulable().into_iter().map(str::to_string).collect(),
            };
            tracing::error!("❌ Workflow graph rejected: {}", err);
            return Err(err);
        }

        Ok(WorkflowRun::new(self, graph, values))
    }

    /// Execute a workflow to completion
    pub async fn run(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        values: NodeValues,
    ) -> Result<WorkflowResult, EngineError> {
        self.run_with_cancel(nodes, edges, values, CancellationToken::new())
            .await
    }

    /// Execute a workflow, stopping before the next dispatch once `cancel` fires
    pub async fn run_with_cancel(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        values: NodeValues,
        cancel: CancellationToken,
    ) -> Result<WorkflowResult, EngineError> {
        let mut run = self.prepare(nodes, edges, values)?;
        run.execute(cancel).await
    }
}

/// One execution of a workflow graph
pub struct WorkflowRun<'e> {
    engine: &'e WorkflowEngine,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    graph: ExecutionGraph,
    values: NodeValues,
    store: ResultStore,
    /// Working copy of in-degrees, decremented as predecessors finish
    in_degree: Vec<usize>,
    queue: VecDeque<usize>,
    state: RunState,
    /// Node IDs in the order their processors were invoked
    invocations: Vec<String>,
}

impl<'e> WorkflowRun<'e> {
    fn new(engine: &'e WorkflowEngine, graph: ExecutionGraph, values: NodeValues) -> Self {
        let in_degree = graph.in_degrees();
        let queue: VecDeque<usize> = graph.roots().collect();
        Self {
            engine,
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            graph,
            values,
            store: ResultStore::new(),
            in_degree,
            queue,
            state: RunState::Pending,
            invocations: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Node IDs in the order their processors were invoked
    pub fn invocations(&self) -> &[String] {
        &self.invocations
    }

    /// Drive the run to `Completed` or `Failed`
    ///
    /// The result store is consumed on success and discarded on failure.
    pub async fn execute(&mut self, cancel: CancellationToken) -> Result<WorkflowResult, EngineError> {
        if self.state != RunState::Pending {
            return Err(EngineError::Internal(format!(
                "run {} already executed (state: {:?})",
                self.run_id, self.state
            )));
        }

        let run_start = Instant::now();
        self.state = RunState::Running;
        tracing::info!(
            "🚀 Starting workflow run {}: {} nodes, {} ready ({:?} mode)",
            self.run_id,
            self.graph.len(),
            self.queue.len(),
            self.engine.options.execution_mode
        );

        let outcome = match self.engine.options.execution_mode {
            ExecutionMode::Sequential => self.drive_sequential(&cancel).await,
            ExecutionMode::Wavefront => self.drive_wavefront(&cancel).await,
        }
        .and_then(|()| self.check_all_scheduled());

        match outcome {
            Ok(()) => {
                self.state = RunState::Completed;
                tracing::info!(
                    "🎉 Workflow run {} completed: {} nodes in {:?}",
                    self.run_id,
                    self.store.len(),
                    run_start.elapsed()
                );
                let store = std::mem::take(&mut self.store);
                Ok(store.into_result(self.engine.options.result_mode))
            }
            Err(e) => {
                self.state = RunState::Failed;
                self.store = ResultStore::new();
                tracing::error!(
                    "❌ Workflow run {} failed after {:?}: {}",
                    self.run_id,
                    run_start.elapsed(),
                    e
                );
                Err(e)
            }
        }
    }

    async fn drive_sequential(&mut self, cancel: &CancellationToken) -> Result<(), EngineError> {
        while let Some(slot) = self.queue.pop_front() {
            self.ensure_not_cancelled(cancel, self.queue.len() + 1)?;

            let step = self.invocations.len() + 1;
            let node = self.graph.node(slot);
            tracing::info!(
                "📍 Step {}/{}: Executing node '{}' (type: {})",
                step,
                self.graph.len(),
                node.id,
                node.node_type
            );
            self.invocations.push(node.id.clone());

            let (input, output) = self.dispatch(slot).await?;
            self.commit(slot, input, output)?;
        }
        Ok(())
    }

    async fn drive_wavefront(&mut self, cancel: &CancellationToken) -> Result<(), EngineError> {
        let mut wave_number = 0;
        while !self.queue.is_empty() {
            self.ensure_not_cancelled(cancel, self.queue.len())?;

            wave_number += 1;
            let wave: Vec<usize> = self.queue.drain(..).collect();
            tracing::info!("🌊 Wave {}: dispatching {} node(s)", wave_number, wave.len());
            for &slot in &wave {
                self.invocations.push(self.graph.node(slot).id.clone());
            }

            let this = &*self;
            let outcomes = join_all(wave.iter().map(|&slot| this.dispatch(slot))).await;

            // Siblings have all finished; the first fault in queue order wins
            let mut committed = Vec::with_capacity(wave.len());
            for (slot, outcome) in wave.into_iter().zip(outcomes) {
                committed.push((slot, outcome?));
            }
            for (slot, (input, output)) in committed {
                self.commit(slot, input, output)?;
            }
        }
        Ok(())
    }

    /// Compose the bundle and invoke the node's processor
    async fn dispatch(&self, slot: usize) -> Result<(RawValue, Value), EngineError> {
        let node = self.graph.node(slot);
        let bundle = compose(slot, &self.graph, &self.values, &self.store);
        let processor = self.engine.registry.resolve(&node.node_type);

        let node_start = Instant::now();
        match processor
            .process(&self.engine.context, node.label(), &bundle, &self.values)
            .await
        {
            Ok(output) => {
                if is_structured_error(&output) {
                    tracing::warn!(
                        "⚠️ Node '{}' returned a structured error in {:?}",
                        node.id,
                        node_start.elapsed()
                    );
                } else {
                    tracing::info!("✅ Node '{}' completed in {:?}", node.id, node_start.elapsed());
                }
                Ok((bundle.input, output))
            }
            Err(e) => {
                tracing::error!(
                    "❌ Node '{}' failed in {:?} - Error: {:#}",
                    node.id,
                    node_start.elapsed(),
                    e
                );
                Err(EngineError::NodeFailed {
                    node_id: node.id.clone(),
                    label: node.label().to_string(),
                    message: format!("{:#}", e),
                })
            }
        }
    }

    /// Record a result and release successors whose last dependency this was
    fn commit(&mut self, slot: usize, input: RawValue, output: Value) -> Result<(), EngineError> {
        let node_id = self.graph.node(slot).id.clone();
        if !self.store.record(&node_id, NodeResult { input, output }) {
            return Err(EngineError::Internal(format!(
                "node '{}' produced more than one result",
                node_id
            )));
        }

        for &succ in self.graph.successors(slot) {
            self.in_degree[succ] -= 1;
            if self.in_degree[succ] == 0 {
                tracing::debug!("🔓 '{}' is ready", self.graph.node(succ).id);
                self.queue.push_back(succ);
            }
        }
        Ok(())
    }

    /// `pending` counts ready nodes not yet dispatched, including any already popped
    fn ensure_not_cancelled(&self, cancel: &CancellationToken, pending: usize) -> Result<(), EngineError> {
        if cancel.is_cancelled() {
            tracing::warn!(
                "⏹️ Workflow run {} cancelled with {} node(s) still queued",
                self.run_id,
                pending
            );
            return Err(EngineError::Cancelled {
                completed: self.store.len(),
            });
        }
        Ok(())
    }

    fn check_all_scheduled(&self) -> Result<(), EngineError> {
        if self.store.len() == self.graph.len() {
            return Ok(());
        }

        let unscheduled: Vec<String> = self
            .graph
            .nodes()
            .iter()
            .filter(|node| !self.store.contains(&node.id))
            .map(|node| node.id.clone())
            .collect();
        let cycle_node = self
            .graph
            .cycle_member()
            .or_else(|| unscheduled.first().map(String::as_str))
            .unwrap_or_default()
            .to_string();

        Err(EngineError::GraphCycle {
            cycle_node,
            unscheduled,
        })
    }
}

/// `{"status": "error", ...}` or `{"error": ...}` shaped outputs
fn is_structured_error(output: &Value) -> bool {
    output.get("status").and_then(Value::as_str) == Some("error") || output.get("error").is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::registry::NodeProcessor;
    use crate::workflow::types::NodeInputBundle;
    use async_trait::async_trait;
    use serde_json::json;

    /// Returns its node label plus the keys it saw from predecessors
    struct Tracer;

    #[async_trait]
    impl NodeProcessor for Tracer {
        async fn process(
            &self,
            _ctx: &ProcessorContext,
            label: &str,
            bundle: &NodeInputBundle,
            _values: &NodeValues,
        ) -> anyhow::Result<Value> {
            let seen: Vec<&String> = bundle.previous_output.keys().collect();
            Ok(json!({ "label": label, "seen": seen }))
        }
    }

    struct Explode;

    #[async_trait]
    impl NodeProcessor for Explode {
        async fn process(
            &self,
            _ctx: &ProcessorContext,
            _label: &str,
            _bundle: &NodeInputBundle,
            _values: &NodeValues,
        ) -> anyhow::Result<Value> {
            Err(anyhow::anyhow!("boom"))
        }
    }

    fn engine(mode: ExecutionMode) -> WorkflowEngine {
        let registry = ProcessorRegistry::new()
            .with("trace", Arc::new(Tracer))
            .with("explode", Arc::new(Explode));
        WorkflowEngine::new(Arc::new(registry), ProcessorContext::offline()).with_options(
            EngineOptions {
                result_mode: ResultMode::Full,
                execution_mode: mode,
            },
        )
    }

    fn diamond() -> (Vec<Node>, Vec<Edge>) {
        let nodes = vec![
            Node::new("d", "trace"),
            Node::new("a", "trace"),
            Node::new("c", "trace"),
            Node::new("b", "trace"),
        ];
        let edges = vec![
            Edge::new("a", "c"),
            Edge::new("a", "b"),
            Edge::new("b", "d"),
            Edge::new("c", "d"),
        ];
        (nodes, edges)
    }

    #[tokio::test]
    async fn test_fifo_order_follows_adjacency() {
        let engine = engine(ExecutionMode::Sequential);
        let (nodes, edges) = diamond();
        let mut run = engine.prepare(&nodes, &edges, NodeValues::new()).unwrap();
        assert_eq!(run.state(), RunState::Pending);

        let result = run.execute(CancellationToken::new()).await.unwrap();
        assert_eq!(run.state(), RunState::Completed);
        assert_eq!(run.invocations(), &["a", "c", "b", "d"]);
        assert_eq!(result.node_ids(), vec!["a", "c", "b", "d"]);
        assert_eq!(result.get("d").unwrap().output["seen"], json!(["b", "c"]));
    }

    #[tokio::test]
    async fn test_wavefront_commits_in_queue_order() {
        let engine = engine(ExecutionMode::Wavefront);
        let (nodes, edges) = diamond();
        let mut run = engine.prepare(&nodes, &edges, NodeValues::new()).unwrap();
        let result = run.execute(CancellationToken::new()).await.unwrap();

        assert_eq!(run.invocations(), &["a", "c", "b", "d"]);
        assert_eq!(result.node_ids(), vec!["a", "c", "b", "d"]);
        assert_eq!(result.get("d").unwrap().output["seen"], json!(["b", "c"]));
    }

    #[tokio::test]
    async fn test_run_cannot_execute_twice() {
        let engine = engine(ExecutionMode::Sequential);
        let (nodes, edges) = diamond();
        let mut run = engine.prepare(&nodes, &edges, NodeValues::new()).unwrap();
        run.execute(CancellationToken::new()).await.unwrap();

        let err = run.execute(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::Internal(_)));
    }

    #[tokio::test]
    async fn test_fault_marks_run_failed() {
        let engine = engine(ExecutionMode::Sequential);
        let nodes = vec![Node::new("a", "explode").with_label("Exploder")];
        let mut run = engine.prepare(&nodes, &[], NodeValues::new()).unwrap();

        let err = run.execute(CancellationToken::new()).await.unwrap_err();
        assert_eq!(run.state(), RunState::Failed);
        assert_eq!(err.to_string(), "Error processing node Exploder: boom");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let engine = engine(ExecutionMode::Sequential);
        let (nodes, edges) = diamond();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = engine
            .run_with_cancel(&nodes, &edges, NodeValues::new(), cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled { completed: 0 }));
    }

    #[tokio::test]
    async fn test_empty_workflow_completes() {
        let engine = engine(ExecutionMode::Sequential);
        let result = engine.run(&[], &[], NodeValues::new()).await.unwrap();
        assert_eq!(result, WorkflowResult::Full(vec![]));
    }

    #[test]
    fn test_execution_mode_parsing() {
        assert_eq!("Wavefront".parse::<ExecutionMode>().unwrap(), ExecutionMode::Wavefront);
        assert_eq!("sequential".parse::<ExecutionMode>().unwrap(), ExecutionMode::Sequential);
        assert!("sideways".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn test_structured_error_detection() {
        assert!(is_structured_error(&json!({"status": "error", "message": "x"})));
        assert!(is_structured_error(&json!({"error": "No file provided"})));
        assert!(!is_structured_error(&json!({"status": "success"})));
        assert!(!is_structured_error(&json!("plain text")));
    }
}
