use indexmap::IndexMap;

use crate::graph_catalog::graph_metadata::{ColumnRole, GraphMetaData};
use crate::graph_catalog::ident::{IdentKey, TableKey};
use crate::gsql_parser::ast::{ColumnRef, Expression, SelectQueryBlock};
use crate::query_planner::expr_visitor::{visit_column_refs, visit_column_refs_mut};
use crate::query_planner::match_graph::{EdgeId, MatchGraph, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttachTarget {
    Node(NodeId),
    Edge(EdgeId),
}

/// Moves WHERE conjuncts that touch exactly one pattern node or edge onto
/// that construct; everything else stays residual. Unqualified columns
/// resolve through the visible-column map and are qualified on the way
/// down so probe SQL can use them verbatim.
pub fn attach_predicates(
    query: &mut SelectQueryBlock,
    graph: &mut MatchGraph,
    metadata: &GraphMetaData,
) {
    let Some(where_clause) = query.where_clause.take() else {
        return;
    };
    let column_owners = build_column_owner_map(graph, metadata);

    let mut residual: Vec<Expression> = Vec::new();
    for mut conjunct in where_clause.into_conjuncts() {
        match single_target_of(&conjunct, graph, &column_owners) {
            Some(target) => {
                qualify_columns(&mut conjunct, graph, target, &column_owners);
                match target {
                    AttachTarget::Node(id) => graph.node_mut(id).predicates.push(conjunct),
                    AttachTarget::Edge(id) => graph.edge_mut(id).predicates.push(conjunct),
                }
            }
            None => residual.push(conjunct),
        }
    }
    query.where_clause = Expression::from_conjuncts(residual);
}

/// Which aliases can own each bare column name: node property and id
/// columns by node alias, edge attributes by edge alias.
fn build_column_owner_map(
    graph: &MatchGraph,
    metadata: &GraphMetaData,
) -> IndexMap<IdentKey, Vec<AttachTarget>> {
    let mut owners: IndexMap<IdentKey, Vec<AttachTarget>> = IndexMap::new();

    for (index, node) in graph.nodes.iter().enumerate() {
        let node_key = TableKey::from_object(&node.table);
        for concrete in metadata.concrete_tables(&node_key) {
            let Some(columns) = metadata.node_table_columns(&concrete) else {
                continue;
            };
            for (column, info) in columns {
                if matches!(info.role, ColumnRole::Property | ColumnRole::NodeId) {
                    owners
                        .entry(column.clone())
                        .or_default()
                        .push(AttachTarget::Node(NodeId(index)));
                }
            }
        }
    }

    for (index, edge) in graph.edges.iter().enumerate() {
        let bound_key = TableKey::from_object(&edge.bound_table);
        let edge_key = IdentKey::new(&edge.edge_column);
        if let Some(info) = metadata.edge_info(&bound_key, &edge_key) {
            for attribute in &info.column_attributes {
                owners
                    .entry(IdentKey::new(attribute))
                    .or_default()
                    .push(AttachTarget::Edge(EdgeId(index)));
            }
        }
    }
    owners
}

fn resolve_ref(
    column_ref: &ColumnRef,
    graph: &MatchGraph,
    column_owners: &IndexMap<IdentKey, Vec<AttachTarget>>,
) -> Option<AttachTarget> {
    if let Some(qualifier) = column_ref.qualifier() {
        if let Some(node) = graph.node_by_alias(qualifier) {
            return Some(AttachTarget::Node(node));
        }
        if let Some(edge) = graph.edge_by_alias(qualifier) {
            return Some(AttachTarget::Edge(edge));
        }
        return None;
    }
    let owners = column_owners.get(&IdentKey::new(column_ref.column()))?;
    if owners.len() == 1 {
        Some(owners[0])
    } else {
        None
    }
}

/// The single node or edge every column reference of `conjunct` falls
/// under, if there is one.
fn single_target_of(
    conjunct: &Expression,
    graph: &MatchGraph,
    column_owners: &IndexMap<IdentKey, Vec<AttachTarget>>,
) -> Option<AttachTarget> {
    let mut target: Option<AttachTarget> = None;
    let mut attachable = true;
    let mut saw_column = false;

    visit_column_refs(conjunct, &mut |column_ref| {
        saw_column = true;
        match resolve_ref(column_ref, graph, column_owners) {
            Some(resolved) => match target {
                None => target = Some(resolved),
                Some(existing) if existing == resolved => {}
                Some(_) => attachable = false,
            },
            None => attachable = false,
        }
    });

    if attachable && saw_column { target } else { None }
}

fn qualify_columns(
    conjunct: &mut Expression,
    graph: &MatchGraph,
    target: AttachTarget,
    column_owners: &IndexMap<IdentKey, Vec<AttachTarget>>,
) {
    let alias = match target {
        AttachTarget::Node(id) => graph.node(id).alias.clone(),
        AttachTarget::Edge(id) => graph.edge(id).alias.clone(),
    };
    visit_column_refs_mut(conjunct, &mut |column_ref| {
        if column_ref.qualifier().is_none()
            && column_owners.contains_key(&IdentKey::new(column_ref.column()))
        {
            column_ref.parts.insert(column_ref.parts.len() - 1, alias.clone());
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_catalog::testing::mock_catalog::employee_metadata;
    use crate::gsql_parser::parse_query;
    use crate::query_planner::match_graph::pattern_builder::build_match_graph;
    use crate::query_planner::scope::ScopeChain;

    fn attach(query_text: &str) -> (SelectQueryBlock, MatchGraph) {
        let metadata = employee_metadata();
        let mut query = parse_query(query_text).expect("query should parse");
        let match_clause = query.match_clause.clone().expect("query should have MATCH");
        let mut graph =
            build_match_graph(&mut query, &match_clause, &metadata, &ScopeChain::new())
                .expect("pattern should build");
        attach_predicates(&mut query, &mut graph, &metadata);
        (query, graph)
    }

    #[test]
    fn test_single_node_predicate_moves_to_node() {
        let (query, graph) = attach(
            "SELECT a.age FROM Employee AS a, Employee AS b \
             MATCH a-[Colleagues AS e]->b WHERE a.age > 30",
        );
        assert!(query.where_clause.is_none());
        let a = graph.node(graph.node_by_alias("a").unwrap());
        assert_eq!(a.predicates.len(), 1);
    }

    #[test]
    fn test_edge_attribute_predicate_moves_to_edge() {
        let (query, graph) = attach(
            "SELECT a.age FROM Employee AS a, Employee AS b \
             MATCH a-[Colleagues AS e]->b WHERE e.weight > 3",
        );
        assert!(query.where_clause.is_none());
        let e = graph.edge(graph.edge_by_alias("e").unwrap());
        assert_eq!(e.predicates.len(), 1);
    }

    #[test]
    fn test_cross_alias_predicate_stays_residual() {
        let (query, graph) = attach(
            "SELECT a.age FROM Employee AS a, Employee AS b \
             MATCH a-[Colleagues AS e]->b WHERE a.age > b.age",
        );
        assert!(query.where_clause.is_some());
        assert!(graph.nodes.iter().all(|node| node.predicates.is_empty()));
    }

    #[test]
    fn test_mixed_conjunction_splits() {
        let (query, graph) = attach(
            "SELECT a.age FROM Employee AS a, Employee AS b \
             MATCH a-[Colleagues AS e]->b \
             WHERE a.age > 30 AND a.age > b.age AND b.age < 60",
        );
        let a = graph.node(graph.node_by_alias("a").unwrap());
        let b = graph.node(graph.node_by_alias("b").unwrap());
        assert_eq!(a.predicates.len(), 1);
        assert_eq!(b.predicates.len(), 1);
        // only the cross-alias conjunct stays behind
        let residual = query.where_clause.unwrap();
        assert_eq!(residual.into_conjuncts().len(), 1);
    }

    #[test]
    fn test_unqualified_column_with_one_owner_attaches_qualified() {
        let (query, graph) = attach(
            "SELECT a.age FROM Employee AS a, Employee AS b \
             MATCH a-[Colleagues AS e]->b WHERE weight > 3",
        );
        assert!(query.where_clause.is_none());
        let e = graph.edge(graph.edge_by_alias("e").unwrap());
        assert_eq!(e.predicates.len(), 1);
        assert!(e.predicates[0].to_string().contains("[e].[weight]"));
    }

    #[test]
    fn test_unqualified_column_with_many_owners_stays_residual() {
        // age is visible through both a and b
        let (query, _) = attach(
            "SELECT a.age FROM Employee AS a, Employee AS b \
             MATCH a-[Colleagues AS e]->b WHERE age > 30",
        );
        assert!(query.where_clause.is_some());
    }
}
