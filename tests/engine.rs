/// End-to-end behaviour of the workflow engine through its public API.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flowrunner::llm::{ChatMessage, LlmClient};
use flowrunner::mail::UnconfiguredMailer;
use flowrunner::runtime::RunState;
use flowrunner::{
    Edge, EngineError, EngineOptions, ExecutionMode, Node, NodeInputBundle, NodeProcessor, NodeValues,
    ProcessorContext, ProcessorRegistry, RawValue, ResultMode, WorkflowEngine, WorkflowResult,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// One observed processor call: node label and the predecessor ids it saw
type Call = (String, Vec<String>);

/// Records every call and echoes what it saw. Labels are set to node ids.
#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn order(&self) -> Vec<String> {
        self.calls().into_iter().map(|(label, _)| label).collect()
    }
}

#[async_trait]
impl NodeProcessor for Recorder {
    async fn process(
        &self,
        _ctx: &ProcessorContext,
        label: &str,
        bundle: &NodeInputBundle,
        _values: &NodeValues,
    ) -> anyhow::Result<Value> {
        let seen: Vec<String> = bundle.previous_output.keys().cloned().collect();
        self.calls.lock().unwrap().push((label.to_string(), seen));
        Ok(json!({
            "node": label,
            "input": bundle.input.to_json(),
            "previous_output": Value::Object(bundle.previous_output.clone()),
        }))
    }
}

/// Raises a fault for every call
struct Faulty;

#[async_trait]
impl NodeProcessor for Faulty {
    async fn process(
        &self,
        _ctx: &ProcessorContext,
        _label: &str,
        _bundle: &NodeInputBundle,
        _values: &NodeValues,
    ) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("disk on fire"))
    }
}

/// Cancels the shared token when invoked, then succeeds
struct CancelOnRun(CancellationToken);

#[async_trait]
impl NodeProcessor for CancelOnRun {
    async fn process(
        &self,
        _ctx: &ProcessorContext,
        _label: &str,
        _bundle: &NodeInputBundle,
        _values: &NodeValues,
    ) -> anyhow::Result<Value> {
        self.0.cancel();
        Ok(json!("done"))
    }
}

/// Fixed reply, remembers the user turn of each conversation
struct FixedLlm {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LlmClient for FixedLlm {
    async fn chat(&self, _model: &str, messages: Vec<ChatMessage>) -> anyhow::Result<String> {
        let user = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.prompts.lock().unwrap().push(user);
        Ok(self.reply.clone())
    }
}

fn node(id: &str, node_type: &str) -> Node {
    Node::new(id, node_type).with_label(id)
}

fn engine_with(recorder: &Recorder, mode: ExecutionMode) -> WorkflowEngine {
    let registry = ProcessorRegistry::with_builtins()
        .with("record", Arc::new(recorder.clone()))
        .with("faulty", Arc::new(Faulty));
    WorkflowEngine::new(Arc::new(registry), ProcessorContext::offline()).with_options(EngineOptions {
        result_mode: ResultMode::Full,
        execution_mode: mode,
    })
}

/// a → b, a → c, b → d, c → d, d → e, plus a lone root f
fn wide_dag() -> (Vec<Node>, Vec<Edge>) {
    let nodes = ["a", "b", "c", "d", "e", "f"].iter().map(|id| node(id, "record")).collect();
    let edges = vec![
        Edge::new("a", "b"),
        Edge::new("a", "c"),
        Edge::new("b", "d"),
        Edge::new("c", "d"),
        Edge::new("d", "e"),
    ];
    (nodes, edges)
}

#[tokio::test]
async fn test_cycle_is_rejected_before_any_invocation() {
    let recorder = Recorder::default();
    let engine = engine_with(&recorder, ExecutionMode::Sequential);

    let nodes = vec![node("a", "record"), node("b", "record")];
    let edges = vec![Edge::new("a", "b"), Edge::new("b", "a")];
    let err = engine.run(&nodes, &edges, NodeValues::new()).await.unwrap_err();

    match err {
        EngineError::GraphCycle { unscheduled, .. } => assert_eq!(unscheduled, vec!["a", "b"]),
        other => panic!("expected a cycle error, got {other:?}"),
    }
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_cycle_behind_a_root_still_invokes_nothing() {
    let recorder = Recorder::default();
    let engine = engine_with(&recorder, ExecutionMode::Sequential);

    let nodes = vec![node("root", "record"), node("a", "record"), node("b", "record")];
    let edges = vec![Edge::new("root", "a"), Edge::new("a", "b"), Edge::new("b", "a")];
    let err = engine.run(&nodes, &edges, NodeValues::new()).await.unwrap_err();

    assert_eq!(err.kind(), "graph_cycle");
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_dangling_edge_is_a_validation_error() {
    let recorder = Recorder::default();
    let engine = engine_with(&recorder, ExecutionMode::Sequential);

    let err = engine
        .run(&[node("a", "record")], &[Edge::new("a", "missing")], NodeValues::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::GraphValidation(_)));
    assert!(err.is_graph_error());
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_predecessors_always_finish_first() {
    for mode in [ExecutionMode::Sequential, ExecutionMode::Wavefront] {
        let recorder = Recorder::default();
        let engine = engine_with(&recorder, mode);
        let (nodes, edges) = wide_dag();

        let result = engine.run(&nodes, &edges, NodeValues::new()).await.unwrap();
        assert_eq!(result.node_ids().len(), nodes.len());

        let mut finished = HashSet::new();
        for (label, seen) in recorder.calls() {
            let expected: Vec<String> = edges
                .iter()
                .filter(|edge| edge.target == label)
                .map(|edge| edge.source.clone())
                .collect();
            assert_eq!(seen, expected, "{label} saw the wrong predecessors in {mode:?} mode");
            assert!(seen.iter().all(|pred| finished.contains(pred)));
            finished.insert(label);
        }
    }
}

#[tokio::test]
async fn test_fan_in_sees_every_predecessor_output() {
    let recorder = Recorder::default();
    let engine = engine_with(&recorder, ExecutionMode::Wavefront);

    let nodes = vec![node("c", "record"), node("b", "record"), node("a", "record")];
    let edges = vec![Edge::new("a", "c"), Edge::new("b", "c")];
    let result = engine.run(&nodes, &edges, NodeValues::new()).await.unwrap();

    let c = result.get("c").unwrap();
    let previous = c.output["previous_output"].as_object().unwrap();
    assert_eq!(previous.len(), 2);
    assert_eq!(previous["a"], result.get("a").unwrap().output);
    assert_eq!(previous["b"], result.get("b").unwrap().output);
}

#[tokio::test]
async fn test_fault_stops_the_run() {
    let recorder = Recorder::default();
    let engine = engine_with(&recorder, ExecutionMode::Sequential);

    let nodes = vec![node("a", "record"), node("b", "faulty"), node("c", "record")];
    let edges = vec![Edge::new("a", "b"), Edge::new("b", "c")];
    let err = engine.run(&nodes, &edges, NodeValues::new()).await.unwrap_err();

    match &err {
        EngineError::NodeFailed { node_id, message, .. } => {
            assert_eq!(node_id, "b");
            assert_eq!(message, "disk on fire");
        }
        other => panic!("expected a node failure, got {other:?}"),
    }
    assert_eq!(err.to_string(), "Error processing node b: disk on fire");
    assert_eq!(recorder.order(), vec!["a"]);
}

#[tokio::test]
async fn test_fault_in_a_wave_stops_the_next_wave() {
    let recorder = Recorder::default();
    let engine = engine_with(&recorder, ExecutionMode::Wavefront);

    let nodes = vec![node("ok", "record"), node("bad", "faulty"), node("after", "record")];
    let edges = vec![Edge::new("ok", "after"), Edge::new("bad", "after")];
    let err = engine.run(&nodes, &edges, NodeValues::new()).await.unwrap_err();

    assert_eq!(err.kind(), "engine_failure");
    assert_eq!(recorder.order(), vec!["ok"]);
}

#[tokio::test]
async fn test_unknown_type_flows_downstream() {
    let recorder = Recorder::default();
    let engine = engine_with(&recorder, ExecutionMode::Sequential);

    let nodes = vec![node("w", "weatherNode"), node("next", "record")];
    let edges = vec![Edge::new("w", "next")];
    let result = engine.run(&nodes, &edges, NodeValues::new()).await.unwrap();

    let unsupported = json!({"status": "error", "message": "Unsupported node type: weatherNode"});
    assert_eq!(result.get("w").unwrap().output, unsupported);
    assert_eq!(result.get("next").unwrap().output["previous_output"]["w"], unsupported);
}

#[tokio::test]
async fn test_sequential_runs_are_deterministic() {
    let (nodes, edges) = wide_dag();
    let mut values = NodeValues::new();
    values.insert("a".to_string(), RawValue::text("seed"));

    let first = Recorder::default();
    let first_result = engine_with(&first, ExecutionMode::Sequential)
        .run(&nodes, &edges, values.clone())
        .await
        .unwrap();

    let second = Recorder::default();
    let second_result = engine_with(&second, ExecutionMode::Sequential)
        .run(&nodes, &edges, values)
        .await
        .unwrap();

    assert_eq!(first_result, second_result);
    assert_eq!(first.order(), second.order());
    assert_eq!(first.order(), vec!["a", "f", "b", "c", "d", "e"]);
}

#[tokio::test]
async fn test_text_then_prompt_scenario() {
    let llm = Arc::new(FixedLlm {
        reply: r#"{"status": "success", "extracted_data": {"greeting": "hello"}}"#.to_string(),
        prompts: Mutex::new(Vec::new()),
    });
    let context = ProcessorContext::new(llm.clone(), Arc::new(UnconfiguredMailer));
    let engine = WorkflowEngine::new(Arc::new(ProcessorRegistry::with_builtins()), context);

    let nodes = vec![Node::new("n1", "textInput"), Node::new("n2", "promptNode")];
    let edges = vec![Edge::new("n1", "n2")];
    let mut values = NodeValues::new();
    values.insert("n1".to_string(), RawValue::Json(json!({"text": "hello"})));

    let result = engine.run(&nodes, &edges, values).await.unwrap();
    assert_eq!(result.node_ids(), vec!["n1", "n2"]);

    let n1 = result.get("n1").unwrap();
    assert_eq!(n1.output, json!("hello"));

    let n2 = result.get("n2").unwrap();
    assert_eq!(n2.input, RawValue::empty());
    assert_eq!(n2.output["extracted_data"]["greeting"], "hello");

    let prompts = llm.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("Input Data: {\"n1\":\"hello\"}"));
}

#[tokio::test]
async fn test_last_mode_returns_final_node_only() {
    let recorder = Recorder::default();
    let registry = ProcessorRegistry::new().with("record", Arc::new(recorder.clone()));
    let engine = WorkflowEngine::new(Arc::new(registry), ProcessorContext::offline()).with_options(EngineOptions {
        result_mode: ResultMode::Last,
        execution_mode: ExecutionMode::Sequential,
    });

    let (nodes, edges) = wide_dag();
    let result = engine.run(&nodes, &edges, NodeValues::new()).await.unwrap();

    match &result {
        WorkflowResult::Last(Some((id, node_result))) => {
            assert_eq!(id, "e");
            assert_eq!(node_result.output["node"], "e");
        }
        other => panic!("expected the last node's result, got {other:?}"),
    }
    assert_eq!(serde_json::to_value(&result).unwrap()["output"]["node"], "e");
}

#[tokio::test]
async fn test_cancellation_stops_before_next_dispatch() {
    let recorder = Recorder::default();
    let cancel = CancellationToken::new();
    let registry = ProcessorRegistry::new()
        .with("record", Arc::new(recorder.clone()))
        .with("stopper", Arc::new(CancelOnRun(cancel.clone())));
    let engine = WorkflowEngine::new(Arc::new(registry), ProcessorContext::offline());

    let nodes = vec![node("first", "stopper"), node("second", "record")];
    let edges = vec![Edge::new("first", "second")];
    let mut run = engine.prepare(&nodes, &edges, NodeValues::new()).unwrap();

    let err = run.execute(cancel).await.unwrap_err();
    assert!(matches!(err, EngineError::Cancelled { completed: 1 }));
    assert_eq!(run.state(), RunState::Failed);
    assert_eq!(run.invocations(), &["first"]);
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_cancellation_between_waves() {
    let recorder = Recorder::default();
    let cancel = CancellationToken::new();
    let registry = ProcessorRegistry::new()
        .with("record", Arc::new(recorder.clone()))
        .with("stopper", Arc::new(CancelOnRun(cancel.clone())));
    let engine = WorkflowEngine::new(Arc::new(registry), ProcessorContext::offline()).with_options(EngineOptions {
        result_mode: ResultMode::Full,
        execution_mode: ExecutionMode::Wavefront,
    });

    // Both roots share the first wave; their successors never start
    let nodes = vec![
        node("stop", "stopper"),
        node("peer", "record"),
        node("after_stop", "record"),
        node("after_peer", "record"),
    ];
    let edges = vec![Edge::new("stop", "after_stop"), Edge::new("peer", "after_peer")];
    let mut run = engine.prepare(&nodes, &edges, NodeValues::new()).unwrap();

    let err = run.execute(cancel).await.unwrap_err();
    assert!(matches!(err, EngineError::Cancelled { completed: 2 }));
    assert_eq!(run.invocations(), &["stop", "peer"]);
    assert_eq!(recorder.order(), vec!["peer"]);
}

#[tokio::test]
async fn test_email_without_transport_reports_configuration_error() {
    let llm = Arc::new(FixedLlm {
        reply: "Onward.".to_string(),
        prompts: Mutex::new(Vec::new()),
    });
    let context = ProcessorContext::new(llm.clone(), Arc::new(UnconfiguredMailer));
    let engine = WorkflowEngine::new(Arc::new(ProcessorRegistry::with_builtins()), context);

    let nodes = vec![Node::new("contacts", "jsonInput"), Node::new("notify", "apiNode")];
    let edges = vec![Edge::new("contacts", "notify")];
    let mut values = NodeValues::new();
    values.insert(
        "contacts".to_string(),
        RawValue::Json(json!({"extracted_data": {"email": ["a@example.com"]}})),
    );
    values.insert("notify".to_string(), RawValue::text("email"));

    let result = engine.run(&nodes, &edges, values).await.unwrap();
    assert_eq!(
        result.get("notify").unwrap().output,
        json!({"status": "error", "message": "Configuration Error: Missing mail transport configuration"})
    );
    assert!(llm.prompts.lock().unwrap().is_empty());
}
