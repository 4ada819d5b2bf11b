/// Execution graph built once per run
///
/// Nodes live in an arena indexed by their position in the submitted node list.
/// Adjacency keeps edge insertion order because the scheduler's FIFO
/// tie-breaking depends on it. A petgraph mirror of the same structure is kept
/// for cycle diagnostics.

use crate::error::GraphError;
use crate::workflow::types::{Edge, Node};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Derived, engine-owned view of a submitted workflow
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    /// Nodes in original node-list order; the index is the arena slot
    nodes: Vec<Node>,
    /// Node ID -> arena slot
    index: HashMap<String, usize>,
    /// Successor slots per node, one entry per edge, in edge order
    successors: Vec<Vec<usize>>,
    /// Distinct predecessor slots per node, in order of first encounter
    predecessors: Vec<Vec<usize>>,
    /// Number of incoming edges per node
    in_degree: Vec<usize>,
    /// Same structure as a petgraph DiGraph (weights are arena slots)
    dag: DiGraph<usize, ()>,
}

impl ExecutionGraph {
    /// Validate nodes and edges and derive adjacency, predecessors and in-degrees
    ///
    /// Fails closed on duplicate node IDs and on edges whose endpoints are not in
    /// the node list. Acyclicity is checked separately (`cycle_member`).
    pub fn build(nodes: &[Node], edges: &[Edge]) -> Result<Self, GraphError> {
        tracing::debug!("🏗️ Building execution graph: {} nodes, {} edges", nodes.len(), edges.len());

        let mut index = HashMap::with_capacity(nodes.len());
        let mut dag = DiGraph::with_capacity(nodes.len(), edges.len());

        for (slot, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), slot).is_some() {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
            dag.add_node(slot);
        }

        let mut successors = vec![Vec::new(); nodes.len()];
        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        let mut in_degree = vec![0usize; nodes.len()];

        for edge in edges {
            let lookup = |id: &str| {
                index.get(id).copied().ok_or_else(|| GraphError::DanglingEdge {
                    source_id: edge.source.clone(),
                    target_id: edge.target.clone(),
                    missing: id.to_string(),
                })
            };
            let from = lookup(&edge.source)?;
            let to = lookup(&edge.target)?;

            successors[from].push(to);
            in_degree[to] += 1;
            if !predecessors[to].contains(&from) {
                predecessors[to].push(from);
            }
            dag.add_edge(NodeIndex::new(from), NodeIndex::new(to), ());
            tracing::debug!("  🔗 {} → {}", edge.source, edge.target);
        }

        Ok(Self {
            nodes: nodes.to_vec(),
            index,
            successors,
            predecessors,
            in_degree,
            dag,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, slot: usize) -> &Node {
        &self.nodes[slot]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn slot_of(&self, node_id: &str) -> Option<usize> {
        self.index.get(node_id).copied()
    }

    pub fn successors(&self, slot: usize) -> &[usize] {
        &self.successors[slot]
    }

    pub fn predecessors(&self, slot: usize) -> &[usize] {
        &self.predecessors[slot]
    }

    /// Fresh copy of the in-degree counts for a scheduler to decrement
    pub fn in_degrees(&self) -> Vec<usize> {
        self.in_degree.clone()
    }

    /// Slots with no incoming edges, in node-list order
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(slot, _)| slot)
    }

    /// Nodes a readiness queue would never reach, in node-list order
    ///
    /// Dry run of the scheduler over in-degrees only; empty for any DAG.
    pub fn unschedulable(&self) -> Vec<&str> {
        let mut in_degree = self.in_degrees();
        let mut ready: Vec<usize> = self.roots().collect();
        let mut scheduled = vec![false; self.nodes.len()];

        while let Some(slot) = ready.pop() {
            scheduled[slot] = true;
            for &succ in &self.successors[slot] {
                in_degree[succ] -= 1;
                if in_degree[succ] == 0 {
                    ready.push(succ);
                }
            }
        }

        self.nodes
            .iter()
            .zip(scheduled)
            .filter(|(_, done)| !done)
            .map(|(node, _)| node.id.as_str())
            .collect()
    }

    /// ID of some node lying on a cycle, if the graph has one
    pub fn cycle_member(&self) -> Option<&str> {
        match toposort(&self.dag, None) {
            Ok(_) => None,
            Err(cycle) => {
                let slot = self.dag[cycle.node_id()];
                Some(self.nodes[slot].id.as_str())
            }
        }
    }
}
