pub mod pattern_builder;
pub mod union_find;

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::graph_catalog::ident::IdentKey;
use crate::gsql_parser::ast::{Expression, Literal, ObjectName};

/// Arena index of a pattern node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Arena index of a pattern edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct MatchNode {
    pub alias: String,
    pub table: ObjectName,
    /// Edges this node is the source of, in pattern order.
    pub neighbors: Vec<EdgeId>,
    /// True when the alias is inherited from an enclosing scope and the
    /// node was rematerialized under an inner alias.
    pub external: bool,
    pub predicates: Vec<Expression>,
    pub estimated_rows: f64,
    pub table_row_count: f64,
    pub node_id_density: f64,
}

impl MatchNode {
    fn new(alias: String, table: ObjectName) -> Self {
        MatchNode {
            alias,
            table,
            neighbors: Vec::new(),
            external: false,
            predicates: Vec::new(),
            estimated_rows: 1.0,
            table_row_count: 1.0,
            node_id_density: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBucket {
    pub height: f64,
    pub is_range: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStatistics {
    /// `1 / distinct sink ids` of the sample.
    pub density: f64,
    pub histogram: IndexMap<i64, HistogramBucket>,
    pub row_count: f64,
    pub max_value: i64,
    pub selectivity: f64,
    pub average_degree: f64,
}

impl Default for EdgeStatistics {
    fn default() -> Self {
        EdgeStatistics {
            density: 1.0,
            histogram: IndexMap::new(),
            row_count: 0.0,
            max_value: 0,
            selectivity: 1.0,
            average_degree: 1.0,
        }
    }
}

/// Length bounds and projection info of a variable-length edge.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSpec {
    pub min_length: u32,
    /// `None` means unbounded.
    pub max_length: Option<u32>,
    /// True when the query projects the path value itself.
    pub reference_path_info: bool,
    pub attributes: Vec<(String, Literal)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchEdge {
    pub alias: String,
    pub edge_column: String,
    pub source_node: NodeId,
    /// Assigned when the walk reaches the far end of the hop.
    pub sink_node: Option<NodeId>,
    /// The concrete table declaring the column, view indirection resolved.
    pub bound_table: ObjectName,
    pub predicates: Vec<Expression>,
    pub statistics: EdgeStatistics,
    /// Present iff this edge is a variable-length path.
    pub path: Option<PathSpec>,
}

impl MatchEdge {
    pub fn is_path(&self) -> bool {
        self.path.is_some()
    }

    /// Estimated fan-out of one traversal of this edge; for a path, the
    /// fan-out of the whole hop range.
    pub fn degree(&self) -> f64 {
        let degree = self.statistics.average_degree;
        match &self.path {
            None => degree,
            Some(spec) => path_degree(degree, spec.min_length, spec.max_length),
        }
    }
}

/// Fan-out of a variable-length hop with per-hop degree `d` over
/// `min..max` hops. Contracting fan-out (`d <= 1`) keeps the single-hop
/// degree.
pub fn path_degree(d: f64, min_length: u32, max_length: Option<u32>) -> f64 {
    let Some(max_length) = max_length else {
        return f64::INFINITY;
    };
    if d <= 1.0 {
        return d;
    }
    let upper = d.powi(max_length as i32);
    let lower = if min_length > 0 {
        d.powi(min_length as i32 - 1)
    } else {
        0.0
    };
    upper - lower
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectedComponent {
    pub nodes: IndexMap<String, NodeId>,
    pub edges: IndexMap<String, EdgeId>,
    /// Nodes that only terminate an edge and may be elided from the join
    /// tree.
    pub is_tail: HashMap<NodeId, bool>,
}

impl ConnectedComponent {
    pub fn is_tail_node(&self, node: NodeId) -> bool {
        self.is_tail.get(&node).copied().unwrap_or(false)
    }
}

/// Per-query pattern graph. Nodes and edges live in arenas and reference
/// each other by index; the maps key exposed aliases case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct MatchGraph {
    pub nodes: Vec<MatchNode>,
    pub edges: Vec<MatchEdge>,
    pub alias_to_node: IndexMap<IdentKey, NodeId>,
    pub alias_to_edge: IndexMap<IdentKey, EdgeId>,
    pub components: Vec<ConnectedComponent>,
}

impl MatchGraph {
    pub fn node(&self, id: NodeId) -> &MatchNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut MatchNode {
        &mut self.nodes[id.0]
    }

    pub fn edge(&self, id: EdgeId) -> &MatchEdge {
        &self.edges[id.0]
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut MatchEdge {
        &mut self.edges[id.0]
    }

    pub fn node_by_alias(&self, alias: &str) -> Option<NodeId> {
        self.alias_to_node.get(&IdentKey::new(alias)).copied()
    }

    pub fn edge_by_alias(&self, alias: &str) -> Option<EdgeId> {
        self.alias_to_edge.get(&IdentKey::new(alias)).copied()
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        let key = IdentKey::new(alias);
        self.alias_to_node.contains_key(&key) || self.alias_to_edge.contains_key(&key)
    }

    pub(crate) fn push_node(&mut self, alias: String, table: ObjectName) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.alias_to_node.insert(IdentKey::new(&alias), id);
        self.nodes.push(MatchNode::new(alias, table));
        id
    }

    pub(crate) fn rename_node_alias(&mut self, id: NodeId, new_alias: String) {
        let old_key = IdentKey::new(&self.nodes[id.0].alias);
        self.alias_to_node.shift_remove(&old_key);
        self.alias_to_node.insert(IdentKey::new(&new_alias), id);
        self.nodes[id.0].alias = new_alias;
    }

    /// Edges incident to `node` from the source side.
    pub fn outgoing_edges(&self, node: NodeId) -> &[EdgeId] {
        &self.node(node).neighbors
    }
}
