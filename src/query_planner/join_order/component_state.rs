use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use crate::gsql_parser::ast::TableReference;
use crate::query_planner::match_graph::{EdgeId, NodeId};

/// Which endpoint a pattern edge's table was entered from when it was
/// materialized: from its source node (outgoing) or from its sink
/// (incoming, e.g. a cycle-closing edge reached sink-first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    Outgoing,
    Incoming,
}

/// A join boundary that needs the cardinality guard: the guard predicate
/// lands on the join whose right side exposes `join_alias` and references
/// `node_alias`'s local node id.
#[derive(Debug, Clone, PartialEq)]
pub struct DownSizeTarget {
    pub join_alias: String,
    pub node_alias: String,
}

/// One join-order search state: a partial join tree over the component.
#[derive(Debug, Clone, Default)]
pub struct MatchComponent {
    pub materialized_nodes: IndexSet<NodeId>,
    pub materialized_edges: IndexMap<EdgeId, EdgeDirection>,
    /// Far-side nodes of materialized edges not yet joined, with the
    /// edges waiting on them.
    pub unmaterialized_nodes: IndexMap<NodeId, Vec<EdgeId>>,
    /// Estimated rows of the partial join.
    pub size: f64,
    /// Accumulated intermediate-size cost.
    pub cost: f64,
    /// The AST join tree built so far.
    pub table_ref: Option<TableReference>,
    /// Extra copies of a node materialized by split extensions.
    pub materialized_node_split_count: HashMap<NodeId, usize>,
    pub downsize_targets: Vec<DownSizeTarget>,
}

impl MatchComponent {
    pub fn empty() -> Self {
        MatchComponent {
            size: 1.0,
            ..MatchComponent::default()
        }
    }

    pub fn edge_count(&self) -> usize {
        self.materialized_edges.len()
    }

    pub fn cost_per_edge(&self) -> f64 {
        self.cost / self.edge_count().max(1) as f64
    }

    /// Complete when every pattern edge is materialized and nothing is
    /// left pending (elided tails never enter the pending map).
    pub fn is_complete(&self, total_edges: usize) -> bool {
        self.materialized_edges.len() == total_edges && self.unmaterialized_nodes.is_empty()
    }
}

/// Bounded state set. At capacity, a newcomer replaces the state with the
/// worst cost-per-edge ratio only if it is strictly better on that ratio.
#[derive(Debug)]
pub struct Beam {
    states: Vec<MatchComponent>,
    max_states: usize,
    worst_index: Option<usize>,
}

impl Beam {
    pub fn new(max_states: usize) -> Self {
        Beam {
            states: Vec::new(),
            max_states,
            worst_index: None,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn push(&mut self, candidate: MatchComponent) {
        if self.states.len() < self.max_states {
            self.states.push(candidate);
            return;
        }
        // TODO: keep the worst slot in a heap instead of rescanning the
        // beam after every eviction.
        match self.worst_index {
            None => {
                // the first candidate past capacity only seeds the worst
                // slot and is itself dropped without a comparison
                // TODO: compare that first overflowing candidate as well
                self.worst_index = Some(self.find_worst());
            }
            Some(worst) => {
                if candidate.cost_per_edge() < self.states[worst].cost_per_edge() {
                    self.states[worst] = candidate;
                    self.worst_index = Some(self.find_worst());
                }
            }
        }
    }

    fn find_worst(&self) -> usize {
        let mut worst = 0;
        for (index, state) in self.states.iter().enumerate() {
            if state.cost_per_edge() > self.states[worst].cost_per_edge() {
                worst = index;
            }
        }
        worst
    }

    pub fn into_states(self) -> Vec<MatchComponent> {
        self.states
    }
}
