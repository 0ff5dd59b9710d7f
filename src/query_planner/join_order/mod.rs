pub mod component_state;
pub mod selectivity;

use tracing::debug;

use crate::graph_catalog::graph_metadata::GLOBAL_NODE_ID;
use crate::gsql_parser::ast::{
    ColumnRef, Expression, FunctionCall, FunctionTableRef, JoinKind, Literal, NamedTableRef,
    ObjectName, QualifiedJoin, TableReference,
};
use crate::query_planner::config::PlannerConfig;
use crate::query_planner::errors::JoinOrderError;
use crate::query_planner::match_graph::{
    ConnectedComponent, EdgeId, MatchEdge, MatchGraph, NodeId,
};

pub use component_state::{Beam, DownSizeTarget, EdgeDirection, MatchComponent};
use selectivity::SelectivityCalculator;

/// Above this many candidate edges at one root, subset enumeration gives
/// way to taking them all at once.
const MAX_ENUMERATED_EDGES: usize = 12;

/// One extension step: a root node plus a partition of its chosen edges
/// into cycle-closing (joint) edges and edges to new nodes.
#[derive(Debug, Clone)]
struct OneHeightTree {
    root: NodeId,
    joint_edges: Vec<EdgeId>,
    unmaterialized_edges: Vec<EdgeId>,
    is_split: bool,
}

pub struct JoinOrderPlanner<'a> {
    graph: &'a MatchGraph,
    config: &'a PlannerConfig,
    selectivity: SelectivityCalculator<'a>,
}

impl<'a> JoinOrderPlanner<'a> {
    pub fn new(graph: &'a MatchGraph, config: &'a PlannerConfig) -> Self {
        JoinOrderPlanner {
            graph,
            config,
            selectivity: SelectivityCalculator::new(graph),
        }
    }

    /// Plans every connected component independently, in pattern order.
    pub fn plan(&self) -> Result<Vec<MatchComponent>, JoinOrderError> {
        self.graph
            .components
            .iter()
            .enumerate()
            .map(|(index, component)| self.plan_component(index, component))
            .collect()
    }

    pub fn plan_component(
        &self,
        index: usize,
        component: &ConnectedComponent,
    ) -> Result<MatchComponent, JoinOrderError> {
        let total_edges = component.edges.len();
        let initial = self.initial_states(component);
        if initial.is_empty() {
            return Err(JoinOrderError::NoInitialState { component: index });
        }
        let mut seed_beam = Beam::new(self.config.max_states);
        for state in initial {
            seed_beam.push(state);
        }
        let mut states = seed_beam.into_states();

        let mut best: Option<MatchComponent> = None;
        let mut round = 0usize;
        while !states.is_empty() {
            round += 1;
            let mut beam = Beam::new(self.config.max_states);
            for state in &states {
                let trees = self.candidate_trees(state, component);
                if trees.is_empty() {
                    // a state that cannot extend is a complete plan
                    if state.is_complete(total_edges)
                        && best.as_ref().map_or(true, |current| state.cost < current.cost)
                    {
                        best = Some(state.clone());
                    }
                    continue;
                }
                for tree in trees {
                    let candidate_size = self.candidate_size(&tree);
                    if self.config.lower_bound_pruning {
                        if let Some(current_best) = &best {
                            let bound_term = if tree.joint_edges.is_empty() {
                                candidate_size.max(1.0).ln().max(1.0)
                            } else {
                                candidate_size
                            };
                            if state.cost + state.size + bound_term > current_best.cost {
                                continue;
                            }
                        }
                    }
                    beam.push(self.apply_tree(state, &tree, component));
                }
            }
            debug!(
                component = index,
                round,
                states = beam.len(),
                best_cost = best.as_ref().map(|state| state.cost),
                "join order round finished"
            );
            states = beam.into_states();
        }

        best.ok_or(JoinOrderError::NoCompletePlan { component: index })
    }

    /// One state per non-empty subset of each non-tail node's edges.
    fn initial_states(&self, component: &ConnectedComponent) -> Vec<MatchComponent> {
        let empty = MatchComponent::empty();
        let mut states = Vec::new();
        for &root in component.nodes.values() {
            if component.is_tail_node(root) {
                continue;
            }
            let available = self.graph.outgoing_edges(root).to_vec();
            if available.is_empty() {
                continue;
            }
            for subset in nonempty_subsets(&available) {
                let tree = OneHeightTree {
                    root,
                    joint_edges: Vec::new(),
                    unmaterialized_edges: subset,
                    is_split: false,
                };
                states.push(self.apply_tree(&empty, &tree, component));
            }
        }
        states
    }

    /// Admissible one-height trees for `state`: a fresh root entering
    /// through a joint edge or through pending edges into it, or a split
    /// copy of a materialized root growing new branches.
    fn candidate_trees(
        &self,
        state: &MatchComponent,
        component: &ConnectedComponent,
    ) -> Vec<OneHeightTree> {
        let mut trees = Vec::new();
        for &root in component.nodes.values() {
            if component.is_tail_node(root) {
                continue;
            }
            let root_materialized = state.materialized_nodes.contains(&root);
            let root_pending = state.unmaterialized_nodes.contains_key(&root);

            let mut joint_available = Vec::new();
            let mut unmaterialized_available = Vec::new();
            for &edge_id in self.graph.outgoing_edges(root) {
                if state.materialized_edges.contains_key(&edge_id) {
                    continue;
                }
                let sink = self
                    .graph
                    .edge(edge_id)
                    .sink_node
                    .expect("pattern edges have sinks");
                if state.materialized_nodes.contains(&sink) {
                    joint_available.push(edge_id);
                } else {
                    unmaterialized_available.push(edge_id);
                }
            }

            if !root_materialized {
                if !joint_available.is_empty() {
                    for joint in prune_joint_subsets(&joint_available) {
                        for unmaterialized in subsets_with_empty(&unmaterialized_available) {
                            trees.push(OneHeightTree {
                                root,
                                joint_edges: joint.clone(),
                                unmaterialized_edges: unmaterialized,
                                is_split: false,
                            });
                        }
                    }
                }
                if root_pending {
                    for unmaterialized in subsets_with_empty(&unmaterialized_available) {
                        trees.push(OneHeightTree {
                            root,
                            joint_edges: Vec::new(),
                            unmaterialized_edges: unmaterialized,
                            is_split: false,
                        });
                    }
                }
            } else {
                if !joint_available.is_empty() {
                    for joint in prune_joint_subsets(&joint_available) {
                        trees.push(OneHeightTree {
                            root,
                            joint_edges: joint,
                            unmaterialized_edges: Vec::new(),
                            is_split: false,
                        });
                    }
                }
                if !unmaterialized_available.is_empty() {
                    for unmaterialized in nonempty_subsets(&unmaterialized_available) {
                        trees.push(OneHeightTree {
                            root,
                            joint_edges: Vec::new(),
                            unmaterialized_edges: unmaterialized,
                            is_split: true,
                        });
                    }
                }
            }
        }
        trees
    }

    fn candidate_size(&self, tree: &OneHeightTree) -> f64 {
        let mut size = self.graph.node(tree.root).estimated_rows;
        for &edge_id in tree.joint_edges.iter().chain(&tree.unmaterialized_edges) {
            size *= self.graph.edge(edge_id).degree();
        }
        size
    }

    fn apply_tree(
        &self,
        state: &MatchComponent,
        tree: &OneHeightTree,
        component: &ConnectedComponent,
    ) -> MatchComponent {
        let mut next = state.clone();
        let root_node = self.graph.node(tree.root);
        let root_fresh = !state.materialized_nodes.contains(&tree.root);
        let mut selectivity_product = 1.0;
        let mut last_joined_alias: Option<String> = None;

        let root_alias = if tree.is_split {
            let count = next
                .materialized_node_split_count
                .entry(tree.root)
                .or_insert(0);
            *count += 1;
            format!("{}_{}", root_node.alias, count)
        } else {
            root_node.alias.clone()
        };

        let mut remaining_joint = tree.joint_edges.as_slice();
        if root_fresh {
            // enter sink-first through the first joint edge when present
            if let Some((&first_joint, rest)) = tree.joint_edges.split_first() {
                remaining_joint = rest;
                let edge = self.graph.edge(first_joint);
                let sink = edge.sink_node.expect("pattern edges have sinks");
                let sink_alias = self.graph.node(sink).alias.clone();
                let condition = Expression::equals(
                    column(&edge.alias, "Sink"),
                    column(&sink_alias, GLOBAL_NODE_ID),
                );
                next.table_ref = Some(join_onto(
                    next.table_ref.take(),
                    self.edge_table_ref(edge),
                    Some(condition),
                ));
                next.materialized_edges
                    .insert(first_joint, EdgeDirection::Incoming);
                let other = self.other_edge_into(state, sink, first_joint);
                selectivity_product *=
                    self.selectivity.joint_edge_selectivity(first_joint, sink, other);
                last_joined_alias = Some(edge.alias.clone());
            }

            // the root's table, tied in by pending edges and the entering
            // joint edge
            let mut conditions = Vec::new();
            if let Some(pending) = next.unmaterialized_nodes.shift_remove(&tree.root) {
                for edge_id in pending {
                    let edge = self.graph.edge(edge_id);
                    conditions.push(Expression::equals(
                        column(&edge.alias, "Sink"),
                        column(&root_alias, GLOBAL_NODE_ID),
                    ));
                    selectivity_product *= self.selectivity.node_join_selectivity(tree.root);
                }
            }
            if let Some(&first_joint) = tree.joint_edges.first() {
                let edge = self.graph.edge(first_joint);
                conditions.push(Expression::equals(
                    column(&edge.alias, "Source"),
                    column(&root_alias, GLOBAL_NODE_ID),
                ));
            }
            next.table_ref = Some(join_onto(
                next.table_ref.take(),
                named_ref(root_node.table.clone(), &root_alias),
                Expression::from_conjuncts(conditions),
            ));
            next.materialized_nodes.insert(tree.root);
            last_joined_alias = Some(root_alias.clone());
        } else if tree.is_split {
            // a replica re-enters the same pattern node
            let condition = Expression::equals(
                column(&root_alias, GLOBAL_NODE_ID),
                column(&root_node.alias, GLOBAL_NODE_ID),
            );
            selectivity_product *= self.selectivity.node_join_selectivity(tree.root);
            next.table_ref = Some(join_onto(
                next.table_ref.take(),
                named_ref(root_node.table.clone(), &root_alias),
                Some(condition),
            ));
            last_joined_alias = Some(root_alias.clone());
        }

        // cycle-closing edges from the source side
        for &edge_id in remaining_joint {
            let edge = self.graph.edge(edge_id);
            let sink = edge.sink_node.expect("pattern edges have sinks");
            let sink_alias = self.graph.node(sink).alias.clone();
            let condition = Expression::and(
                Expression::equals(
                    column(&edge.alias, "Source"),
                    column(&root_alias, GLOBAL_NODE_ID),
                ),
                Expression::equals(
                    column(&edge.alias, "Sink"),
                    column(&sink_alias, GLOBAL_NODE_ID),
                ),
            );
            next.table_ref = Some(join_onto(
                next.table_ref.take(),
                self.edge_table_ref(edge),
                Some(condition),
            ));
            next.materialized_edges
                .insert(edge_id, EdgeDirection::Outgoing);
            let other = self.other_edge_into(state, sink, edge_id);
            selectivity_product *= self.selectivity.joint_edge_selectivity(edge_id, sink, other);
            last_joined_alias = Some(edge.alias.clone());
        }

        // branches to new nodes
        for &edge_id in &tree.unmaterialized_edges {
            let edge = self.graph.edge(edge_id);
            let sink = edge.sink_node.expect("pattern edges have sinks");
            let mut condition = Expression::equals(
                column(&edge.alias, "Source"),
                column(&root_alias, GLOBAL_NODE_ID),
            );
            if next.materialized_nodes.contains(&sink) {
                // self loop: both endpoints are this root
                let sink_alias = self.graph.node(sink).alias.clone();
                condition = Expression::and(
                    condition,
                    Expression::equals(
                        column(&edge.alias, "Sink"),
                        column(&sink_alias, GLOBAL_NODE_ID),
                    ),
                );
            }
            next.table_ref = Some(join_onto(
                next.table_ref.take(),
                self.edge_table_ref(edge),
                Some(condition),
            ));
            next.materialized_edges
                .insert(edge_id, EdgeDirection::Outgoing);
            last_joined_alias = Some(edge.alias.clone());

            if component.is_tail_node(sink) {
                // the tail table is elided; the edge ends the branch
            } else if !next.materialized_nodes.contains(&sink) {
                next.unmaterialized_nodes
                    .entry(sink)
                    .or_default()
                    .push(edge_id);
            }
        }

        let candidate_size = self.candidate_size(tree);
        next.size = state.size * candidate_size * selectivity_product;
        if next.size >= self.config.downsize_threshold {
            next.size /= self.config.downsize_weight;
            if let Some(join_alias) = last_joined_alias {
                next.downsize_targets.push(DownSizeTarget {
                    join_alias,
                    node_alias: root_alias.clone(),
                });
            }
        }
        next.cost = state.cost + next.size;
        next
    }

    fn other_edge_into(
        &self,
        state: &MatchComponent,
        sink: NodeId,
        excluding: EdgeId,
    ) -> Option<EdgeId> {
        state
            .materialized_edges
            .keys()
            .copied()
            .find(|&edge_id| edge_id != excluding && self.graph.edge(edge_id).sink_node == Some(sink))
    }

    /// A single-hop edge materializes as its adjacency table; a
    /// variable-length edge as the path-expansion table function.
    fn edge_table_ref(&self, edge: &MatchEdge) -> TableReference {
        let schema = edge.bound_table.schema_or_default();
        match &edge.path {
            None => TableReference::Named(NamedTableRef {
                object: ObjectName::qualified(
                    schema,
                    format!("{}_{}", edge.bound_table.base, edge.edge_column),
                ),
                alias: Some(edge.alias.clone()),
            }),
            Some(spec) => TableReference::FunctionTable(FunctionTableRef {
                call: FunctionCall {
                    name: ObjectName::qualified(
                        "dbo",
                        format!(
                            "{}_{}_{}_bfsPath",
                            schema, edge.bound_table.base, edge.edge_column
                        ),
                    ),
                    args: vec![
                        Expression::Literal(Literal::Integer(spec.min_length as i64)),
                        Expression::Literal(Literal::Integer(
                            spec.max_length.map(|max| max as i64).unwrap_or(-1),
                        )),
                    ],
                },
                alias: edge.alias.clone(),
            }),
        }
    }
}

fn column(alias: &str, name: &str) -> Expression {
    Expression::ColumnRef(ColumnRef::two_part(alias, name))
}

fn named_ref(object: ObjectName, alias: &str) -> TableReference {
    TableReference::Named(NamedTableRef {
        object,
        alias: Some(alias.to_string()),
    })
}

fn join_onto(
    left: Option<TableReference>,
    right: TableReference,
    condition: Option<Expression>,
) -> TableReference {
    match left {
        None => right,
        Some(left) => TableReference::QualifiedJoin(Box::new(QualifiedJoin {
            left,
            right,
            kind: JoinKind::Inner,
            condition: condition.unwrap_or_else(|| {
                Expression::equals(
                    Expression::Literal(Literal::Integer(1)),
                    Expression::Literal(Literal::Integer(1)),
                )
            }),
        })),
    }
}

fn nonempty_subsets(items: &[EdgeId]) -> Vec<Vec<EdgeId>> {
    if items.len() > MAX_ENUMERATED_EDGES {
        debug!(
            edges = items.len(),
            "too many incident edges to enumerate; taking all at once"
        );
        return vec![items.to_vec()];
    }
    let mut subsets = Vec::with_capacity((1usize << items.len()) - 1);
    for mask in 1u32..(1u32 << items.len()) {
        subsets.push(pick(items, mask));
    }
    subsets
}

fn subsets_with_empty(items: &[EdgeId]) -> Vec<Vec<EdgeId>> {
    let mut subsets = vec![Vec::new()];
    subsets.extend(nonempty_subsets(items));
    subsets
}

/// Joint-edge candidates are pruned rather than enumerated: each single
/// edge, plus all of them at once.
fn prune_joint_subsets(items: &[EdgeId]) -> Vec<Vec<EdgeId>> {
    let mut subsets: Vec<Vec<EdgeId>> = items.iter().map(|&edge| vec![edge]).collect();
    if items.len() > 1 {
        subsets.push(items.to_vec());
    }
    subsets
}

fn pick(items: &[EdgeId], mask: u32) -> Vec<EdgeId> {
    items
        .iter()
        .enumerate()
        .filter(|(index, _)| mask & (1 << index) != 0)
        .map(|(_, &edge)| edge)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_catalog::testing::mock_catalog::{employee_metadata, MockCatalog};
    use crate::gsql_parser::parse_query;
    use crate::query_planner::estimator::CardinalityEstimator;
    use crate::query_planner::match_graph::pattern_builder::build_match_graph;
    use crate::query_planner::scope::ScopeChain;

    fn annotated_graph(query_text: &str, catalog: &MockCatalog) -> MatchGraph {
        let metadata = employee_metadata();
        let mut query = parse_query(query_text).expect("query should parse");
        let match_clause = query.match_clause.clone().expect("query should have MATCH");
        let mut graph =
            build_match_graph(&mut query, &match_clause, &metadata, &ScopeChain::new())
                .expect("pattern should build");
        let config = PlannerConfig::default();
        CardinalityEstimator::new(catalog, &metadata, &config)
            .annotate(&mut graph)
            .expect("estimation should succeed");
        graph
    }

    fn collect_aliases(table_ref: &TableReference, out: &mut Vec<String>) {
        match table_ref {
            TableReference::Named(named) => out.push(named.exposed_alias().to_string()),
            TableReference::FunctionTable(ft) => out.push(ft.alias.clone()),
            TableReference::QualifiedJoin(join) => {
                collect_aliases(&join.left, out);
                collect_aliases(&join.right, out);
            }
        }
    }

    #[test]
    fn test_two_hop_chain_produces_complete_plan() {
        let mut catalog = MockCatalog::with_employee_graph();
        catalog.set_node_estimate("a", 100.0);
        catalog.set_node_estimate("b", 100.0);
        catalog.set_node_estimate("c", 100.0);
        catalog.set_edge_degree("e", &[1], 1.0);
        catalog.set_edge_degree("f", &[1], 1.0);
        let graph = annotated_graph(
            "SELECT a.age, b.age, c.age \
             FROM Employee AS a, Employee AS b, Employee AS c \
             MATCH a-[Colleagues AS e]->b-[Colleagues AS f]->c",
            &catalog,
        );

        let config = PlannerConfig::default();
        let planner = JoinOrderPlanner::new(&graph, &config);
        let chosen = planner.plan().expect("plan should complete");
        assert_eq!(chosen.len(), 1);
        let plan = &chosen[0];
        assert_eq!(plan.materialized_edges.len(), 2);
        assert!(plan.unmaterialized_nodes.is_empty());
        assert!(plan.cost.is_finite() && plan.cost > 0.0);

        let mut aliases = Vec::new();
        collect_aliases(plan.table_ref.as_ref().unwrap(), &mut aliases);
        for alias in ["a", "b", "c", "e", "f"] {
            assert!(aliases.contains(&alias.to_string()), "missing {alias}");
        }
    }

    #[test]
    fn test_tail_table_is_elided_from_join_tree() {
        let mut catalog = MockCatalog::with_employee_graph();
        catalog.set_node_estimate("a", 100.0);
        catalog.set_node_estimate("b", 100.0);
        catalog.set_edge_degree("e", &[1], 1.0);
        // b is never referenced, so it is a tail
        let graph = annotated_graph(
            "SELECT a.age FROM Employee AS a, Employee AS b MATCH a-[Colleagues AS e]->b",
            &catalog,
        );

        let config = PlannerConfig::default();
        let planner = JoinOrderPlanner::new(&graph, &config);
        let plan = planner
            .plan_component(0, &graph.components[0])
            .expect("plan should complete");
        let mut aliases = Vec::new();
        collect_aliases(plan.table_ref.as_ref().unwrap(), &mut aliases);
        assert!(aliases.contains(&"a".to_string()));
        assert!(aliases.contains(&"e".to_string()));
        assert!(!aliases.contains(&"b".to_string()));
    }

    #[test]
    fn test_triangle_closes_cycle_with_joint_edge() {
        let mut catalog = MockCatalog::with_employee_graph();
        for alias in ["a", "b", "c"] {
            catalog.set_node_estimate(alias, 50.0);
        }
        for edge in ["e1", "e2", "e3"] {
            catalog.set_edge_degree(edge, &[1, 2, 3], 1.5);
        }
        let graph = annotated_graph(
            "SELECT a.age, b.age, c.age \
             FROM Employee AS a, Employee AS b, Employee AS c \
             MATCH a-[Colleagues AS e1]->b-[Colleagues AS e2]->c-[Colleagues AS e3]->a",
            &catalog,
        );

        let config = PlannerConfig::default();
        let planner = JoinOrderPlanner::new(&graph, &config);
        let plan = planner
            .plan_component(0, &graph.components[0])
            .expect("plan should complete");
        assert_eq!(plan.materialized_edges.len(), 3);
        assert!(plan.unmaterialized_nodes.is_empty());
        // with this small a pattern no boundary crosses the guard threshold
        assert!(plan.downsize_targets.is_empty());
    }

    #[test]
    fn test_narrow_beam_still_completes() {
        let mut catalog = MockCatalog::with_employee_graph();
        for alias in ["a", "b", "c"] {
            catalog.set_node_estimate(alias, 50.0);
        }
        for edge in ["e1", "e2", "e3"] {
            catalog.set_edge_degree(edge, &[1, 2], 2.0);
        }
        let graph = annotated_graph(
            "SELECT a.age, b.age, c.age \
             FROM Employee AS a, Employee AS b, Employee AS c \
             MATCH a-[Colleagues AS e1]->b-[Colleagues AS e2]->c-[Colleagues AS e3]->a",
            &catalog,
        );

        let config = PlannerConfig {
            max_states: 2,
            ..PlannerConfig::default()
        };
        let planner = JoinOrderPlanner::new(&graph, &config);
        let plan = planner
            .plan_component(0, &graph.components[0])
            .expect("a narrow beam should still find a plan");
        assert_eq!(plan.materialized_edges.len(), 3);
    }

    #[test]
    fn test_large_estimates_record_downsize_targets() {
        let mut catalog = MockCatalog::with_employee_graph();
        catalog.set_node_estimate("a", 1e5);
        catalog.set_node_estimate("b", 1e5);
        catalog.set_edge_degree("e", &[1, 2, 3, 4], 5e3);
        let graph = annotated_graph(
            "SELECT a.age, b.age FROM Employee AS a, Employee AS b \
             MATCH a-[Colleagues AS e]->b",
            &catalog,
        );

        let config = PlannerConfig::default();
        let planner = JoinOrderPlanner::new(&graph, &config);
        let plan = planner
            .plan_component(0, &graph.components[0])
            .expect("plan should complete");
        assert!(!plan.downsize_targets.is_empty());
    }

    #[test]
    fn test_unbounded_path_still_plans() {
        let mut catalog = MockCatalog::with_employee_graph();
        catalog.set_node_estimate("a", 10.0);
        catalog.set_node_estimate("b", 10.0);
        catalog.set_edge_degree("p", &[1, 2], 2.0);
        let graph = annotated_graph(
            "SELECT a.age, b.age FROM Employee AS a, Employee AS b \
             MATCH a-[Colleagues AS p *1..]->b",
            &catalog,
        );
        assert!(graph.edge(graph.edge_by_alias("p").unwrap()).degree().is_infinite());

        let config = PlannerConfig::default();
        let planner = JoinOrderPlanner::new(&graph, &config);
        let plan = planner
            .plan_component(0, &graph.components[0])
            .expect("plan should complete even with an unbounded path");
        assert_eq!(plan.materialized_edges.len(), 1);
    }
}
