/// Per-run result bookkeeping
///
/// Append-only: one entry per executed node, keyed by node ID, with the
/// execution order kept separately so "the last node to finish" can be derived
/// without relying on ID ordering.

use crate::workflow::types::NodeResult;
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

/// How a completed run is summarised for the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultMode {
    /// Every node's `{input, output}` keyed by node ID, in execution order
    #[default]
    Full,
    /// Only the `{input, output}` of the last node to finish
    Last,
}

impl FromStr for ResultMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" | "all" => Ok(ResultMode::Full),
            "last" | "last_node" => Ok(ResultMode::Last),
            other => Err(anyhow::anyhow!("Unknown result mode: {}", other)),
        }
    }
}

/// Append-only store of node results for one run
#[derive(Debug, Default)]
pub struct ResultStore {
    results: HashMap<String, NodeResult>,
    order: Vec<String>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a node's result. Returns false (and changes nothing) if the node
    /// already has one.
    pub fn record(&mut self, node_id: &str, result: NodeResult) -> bool {
        if self.results.contains_key(node_id) {
            return false;
        }
        self.results.insert(node_id.to_string(), result);
        self.order.push(node_id.to_string());
        true
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeResult> {
        self.results.get(node_id)
    }

    pub fn output(&self, node_id: &str) -> Option<&Value> {
        self.results.get(node_id).map(|result| &result.output)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.results.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Node IDs in the order their results were recorded
    pub fn execution_order(&self) -> &[String] {
        &self.order
    }

    /// Consume the store into the caller-facing result
    pub fn into_result(mut self, mode: ResultMode) -> WorkflowResult {
        match mode {
            ResultMode::Full => {
                let entries = self
                    .order
                    .iter()
                    .filter_map(|id| self.results.remove(id).map(|result| (id.clone(), result)))
                    .collect();
                WorkflowResult::Full(entries)
            }
            ResultMode::Last => {
                let last = self
                    .order
                    .last()
                    .and_then(|id| self.results.remove(id).map(|result| (id.clone(), result)));
                WorkflowResult::Last(last)
            }
        }
    }
}

/// Success value of a workflow run
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowResult {
    /// `(node_id, result)` pairs in execution order
    Full(Vec<(String, NodeResult)>),
    /// The last node to finish, or None for an empty workflow
    Last(Option<(String, NodeResult)>),
}

impl WorkflowResult {
    /// Result for a specific node, if this summary contains it
    pub fn get(&self, node_id: &str) -> Option<&NodeResult> {
        match self {
            WorkflowResult::Full(entries) => entries
                .iter()
                .find(|(id, _)| id == node_id)
                .map(|(_, result)| result),
            WorkflowResult::Last(last) => last
                .as_ref()
                .filter(|(id, _)| id == node_id)
                .map(|(_, result)| result),
        }
    }

    /// ID and result of the last node to finish
    pub fn last(&self) -> Option<(&str, &NodeResult)> {
        match self {
            WorkflowResult::Full(entries) => entries.last(),
            WorkflowResult::Last(last) => last.as_ref(),
        }
        .map(|(id, result)| (id.as_str(), result))
    }

    /// Node IDs present in this summary, in execution order
    pub fn node_ids(&self) -> Vec<&str> {
        match self {
            WorkflowResult::Full(entries) => entries.iter().map(|(id, _)| id.as_str()).collect(),
            WorkflowResult::Last(last) => last.iter().map(|(id, _)| id.as_str()).collect(),
        }
    }
}

impl Serialize for WorkflowResult {
    /// Full → `{node_id: {input, output}, ...}`; Last → `{input, output}` or null
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WorkflowResult::Full(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (id, result) in entries {
                    map.serialize_entry(id, result)?;
                }
                map.end()
            }
            WorkflowResult::Last(Some((_, result))) => result.serialize(serializer),
            WorkflowResult::Last(None) => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::RawValue;
    use serde_json::json;

    fn result(output: Value) -> NodeResult {
        NodeResult {
            input: RawValue::empty(),
            output,
        }
    }

    fn filled_store() -> ResultStore {
        let mut store = ResultStore::new();
        assert!(store.record("zeta", result(json!(1))));
        assert!(store.record("alpha", result(json!(2))));
        store
    }

    #[test]
    fn test_record_is_append_only() {
        let mut store = filled_store();
        assert!(!store.record("zeta", result(json!("again"))));
        assert_eq!(store.output("zeta"), Some(&json!(1)));
        assert_eq!(store.execution_order(), &["zeta".to_string(), "alpha".to_string()]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_full_result_keeps_execution_order() {
        let summary = filled_store().into_result(ResultMode::Full);
        assert_eq!(summary.node_ids(), vec!["zeta", "alpha"]);

        let rendered = serde_json::to_string(&summary).unwrap();
        assert_eq!(
            rendered,
            r#"{"zeta":{"input":{},"output":1},"alpha":{"input":{},"output":2}}"#
        );
    }

    #[test]
    fn test_last_result_is_last_recorded_not_last_id() {
        let summary = filled_store().into_result(ResultMode::Last);
        let (id, last) = summary.last().unwrap();
        assert_eq!(id, "alpha");
        assert_eq!(last.output, json!(2));
        assert!(summary.get("zeta").is_none());
        assert_eq!(serde_json::to_value(&summary).unwrap(), json!({"input": {}, "output": 2}));
    }

    #[test]
    fn test_empty_store_summaries() {
        assert_eq!(ResultStore::new().into_result(ResultMode::Full), WorkflowResult::Full(vec![]));
        let last = ResultStore::new().into_result(ResultMode::Last);
        assert_eq!(serde_json::to_value(&last).unwrap(), Value::Null);
    }

    #[test]
    fn test_result_mode_parsing() {
        assert_eq!("FULL".parse::<ResultMode>().unwrap(), ResultMode::Full);
        assert_eq!("last".parse::<ResultMode>().unwrap(), ResultMode::Last);
        assert!("sometimes".parse::<ResultMode>().is_err());
    }
}
