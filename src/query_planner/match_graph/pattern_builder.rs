use std::collections::HashMap;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::graph_catalog::graph_metadata::{
    GraphMetaData, GLOBAL_NODE_ID, NODE_ID_COLUMN, NODE_TYPE_COLUMN, PATH_DECODER_SUFFIX,
    PATH_MESSAGE_COLUMN,
};
use crate::graph_catalog::ident::{IdentKey, TableKey};
use crate::gsql_parser::ast::{
    ColumnRef, Expression, FunctionCall, MatchClause, ObjectName, SelectItem, SelectQueryBlock,
    TableReference,
};
use crate::query_planner::errors::PatternError;
use crate::query_planner::expr_visitor::{query_references_alias, visit_query_column_refs_mut};
use crate::query_planner::match_graph::union_find::UnionFind;
use crate::query_planner::match_graph::{
    ConnectedComponent, EdgeId, EdgeStatistics, MatchEdge, MatchGraph, NodeId, PathSpec,
};
use crate::query_planner::scope::ScopeChain;

pub fn generate_id() -> String {
    format!(
        "a{}",
        Uuid::new_v4().to_string()[..10].to_string().replace("-", "")
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum BindingOrigin {
    Inner,
    Outer,
}

#[derive(Debug, Clone)]
pub(crate) struct NodeBinding {
    pub object: ObjectName,
    pub origin: BindingOrigin,
}

/// Aliases visible to the MATCH pattern: the block's own FROM entries,
/// overridden by enclosing-scope aliases (an inherited alias is
/// rematerialized, not shadowed).
pub(crate) fn collect_node_bindings(
    query: &SelectQueryBlock,
    scopes: &ScopeChain,
) -> IndexMap<IdentKey, NodeBinding> {
    let mut bindings = IndexMap::new();
    for table_ref in &query.from_clause {
        if let TableReference::Named(named) = table_ref {
            bindings.insert(
                IdentKey::new(named.exposed_alias()),
                NodeBinding {
                    object: named.object.clone(),
                    origin: BindingOrigin::Inner,
                },
            );
        }
    }
    for (key, _) in bindings.clone() {
        if let Some(object) = scopes.resolve_alias(key.as_str()) {
            bindings.insert(
                key,
                NodeBinding {
                    object: object.clone(),
                    origin: BindingOrigin::Outer,
                },
            );
        }
    }
    // outer aliases never mentioned in FROM are still usable in MATCH
    bindings
}

pub(crate) fn resolve_binding(
    bindings: &IndexMap<IdentKey, NodeBinding>,
    scopes: &ScopeChain,
    alias: &str,
) -> Option<NodeBinding> {
    if let Some(binding) = bindings.get(&IdentKey::new(alias)) {
        return Some(binding.clone());
    }
    scopes.resolve_alias(alias).map(|object| NodeBinding {
        object: object.clone(),
        origin: BindingOrigin::Outer,
    })
}

pub fn build_match_graph(
    query: &mut SelectQueryBlock,
    match_clause: &MatchClause,
    metadata: &GraphMetaData,
    scopes: &ScopeChain,
) -> Result<MatchGraph, PatternError> {
    let bindings = collect_node_bindings(query, scopes);
    let mut graph = MatchGraph::default();
    let mut union_find = UnionFind::new();
    let mut externals: Vec<NodeId> = Vec::new();
    // edge column name -> synthesized aliases, for reference rewriting
    let mut edge_column_to_aliases: IndexMap<IdentKey, Vec<String>> = IndexMap::new();
    let mut edge_binding_cache: HashMap<(TableKey, IdentKey), ObjectName> = HashMap::new();

    for path in &match_clause.paths {
        for (source_alias, edge_pattern, next_alias) in path.triples() {
            let source = get_or_create_node(
                &mut graph,
                &mut union_find,
                &mut externals,
                &bindings,
                scopes,
                source_alias,
            )?;
            let next = get_or_create_node(
                &mut graph,
                &mut union_find,
                &mut externals,
                &bindings,
                scopes,
                next_alias,
            )?;

            let edge_alias = match &edge_pattern.alias {
                Some(alias) => alias.clone(),
                None => {
                    let synthesized = format!(
                        "{}_{}_{}",
                        source_alias, edge_pattern.edge_column, next_alias
                    );
                    edge_column_to_aliases
                        .entry(IdentKey::new(&edge_pattern.edge_column))
                        .or_default()
                        .push(synthesized.clone());
                    synthesized
                }
            };
            if graph.contains_alias(&edge_alias) {
                return Err(PatternError::DuplicateAlias { alias: edge_alias });
            }

            let source_table_key = TableKey::from_object(&graph.node(source).table);
            let edge_key = IdentKey::new(&edge_pattern.edge_column);
            let cache_key = (source_table_key.clone(), edge_key.clone());
            let bound_table = match edge_binding_cache.get(&cache_key) {
                Some(object) => object.clone(),
                None => {
                    let (bound_key, _) = metadata
                        .resolve_edge_binding(&source_table_key, &edge_key)
                        .ok_or_else(|| PatternError::UnresolvedEdgeBinding {
                            edge: edge_pattern.edge_column.clone(),
                        })?;
                    let object = metadata
                        .canonical_object(&bound_key)
                        .cloned()
                        .unwrap_or_else(|| {
                            ObjectName::qualified(
                                bound_key.schema.as_str(),
                                bound_key.table.as_str(),
                            )
                        });
                    edge_binding_cache.insert(cache_key, object.clone());
                    object
                }
            };

            let path_spec = if edge_pattern.is_single_hop() {
                None
            } else {
                Some(PathSpec {
                    min_length: edge_pattern.min_length,
                    max_length: edge_pattern.max_length,
                    reference_path_info: false,
                    attributes: edge_pattern.attributes.clone(),
                })
            };

            let edge_id = EdgeId(graph.edges.len());
            graph
                .alias_to_edge
                .insert(IdentKey::new(&edge_alias), edge_id);
            graph.edges.push(MatchEdge {
                alias: edge_alias,
                edge_column: edge_pattern.edge_column.clone(),
                source_node: source,
                sink_node: Some(next),
                bound_table,
                predicates: Vec::new(),
                statistics: EdgeStatistics::default(),
                path: path_spec,
            });
            graph.node_mut(source).neighbors.push(edge_id);
            union_find.union(source.0, next.0);
        }
    }

    rewrite_ambiguous_edge_references(query, &graph, &edge_column_to_aliases)?;
    rematerialize_external_nodes(query, &mut graph, &externals);
    rewrite_path_projections(query, &mut graph);
    let tails = mark_tail_nodes(query, &graph);
    partition_components(&mut graph, &mut union_find, &tails);

    Ok(graph)
}

fn get_or_create_node(
    graph: &mut MatchGraph,
    union_find: &mut UnionFind,
    externals: &mut Vec<NodeId>,
    bindings: &IndexMap<IdentKey, NodeBinding>,
    scopes: &ScopeChain,
    alias: &str,
) -> Result<NodeId, PatternError> {
    if let Some(existing) = graph.node_by_alias(alias) {
        return Ok(existing);
    }
    if graph.edge_by_alias(alias).is_some() {
        return Err(PatternError::DuplicateAlias {
            alias: alias.to_string(),
        });
    }
    let binding =
        resolve_binding(bindings, scopes, alias).ok_or_else(|| PatternError::UnboundAlias {
            alias: alias.to_string(),
        })?;

    let id = graph.push_node(alias.to_string(), binding.object);
    let uf_index = union_find.push();
    debug_assert_eq!(uf_index, id.0);
    if binding.origin == BindingOrigin::Outer {
        externals.push(id);
    }
    Ok(id)
}

/// Rewrites references that qualify columns by an unnamed edge's column
/// name to the synthesized edge alias, e.g. `Colleagues.weight` to
/// `a_Colleagues_b.weight`. More than one candidate alias is an error.
fn rewrite_ambiguous_edge_references(
    query: &mut SelectQueryBlock,
    graph: &MatchGraph,
    edge_column_to_aliases: &IndexMap<IdentKey, Vec<String>>,
) -> Result<(), PatternError> {
    if edge_column_to_aliases.is_empty() {
        return Ok(());
    }

    // ambiguity is decided per referenced name before any rewrite
    let mut replacements: HashMap<IdentKey, String> = HashMap::new();
    for (column, aliases) in edge_column_to_aliases {
        if aliases.len() > 1 {
            // only an error if the query actually references the bare name
            continue;
        }
        replacements.insert(column.clone(), aliases[0].clone());
    }

    let mut ambiguous: Option<String> = None;
    visit_query_column_refs_mut(query, &mut |column_ref: &mut ColumnRef| {
        let Some(qualifier) = column_ref.qualifier().map(str::to_string) else {
            return;
        };
        if graph.contains_alias(&qualifier) {
            return;
        }
        let key = IdentKey::new(&qualifier);
        if let Some(alias) = replacements.get(&key) {
            let position = column_ref.parts.len() - 2;
            column_ref.parts[position] = alias.clone();
        } else if edge_column_to_aliases.contains_key(&key) && ambiguous.is_none() {
            ambiguous = Some(qualifier);
        }
    });

    match ambiguous {
        Some(name) => Err(PatternError::AmbiguousEdgeReference { name }),
        None => Ok(()),
    }
}

/// An alias inherited from an enclosing scope keeps its outer meaning:
/// the inner pattern node is renamed, the outer table reference leaves
/// this block's FROM, and a node-identity join ties the two together.
fn rematerialize_external_nodes(
    query: &mut SelectQueryBlock,
    graph: &mut MatchGraph,
    externals: &[NodeId],
) {
    for &node_id in externals {
        let outer_alias = graph.node(node_id).alias.clone();
        let mut inner_alias = format!("{}_inner", outer_alias);
        if graph.contains_alias(&inner_alias) {
            inner_alias = format!("{}_{}", inner_alias, generate_id());
        }

        graph.rename_node_alias(node_id, inner_alias.clone());
        graph.node_mut(node_id).external = true;

        let outer_key = IdentKey::new(&outer_alias);
        query.from_clause.retain(|table_ref| match table_ref {
            TableReference::Named(named) => IdentKey::new(named.exposed_alias()) != outer_key,
            _ => true,
        });

        let join_back = Expression::equals(
            Expression::ColumnRef(ColumnRef::two_part(outer_alias, GLOBAL_NODE_ID)),
            Expression::ColumnRef(ColumnRef::two_part(inner_alias, GLOBAL_NODE_ID)),
        );
        query.where_clause = Some(match query.where_clause.take() {
            Some(existing) => Expression::and(existing, join_back),
            None => join_back,
        });
    }
}

/// `p.*` over a path alias becomes a decoder call over the path's encoded
/// message plus the sink node's identity columns.
fn rewrite_path_projections(query: &mut SelectQueryBlock, graph: &mut MatchGraph) {
    let mut decoded_items: Vec<(usize, SelectItem)> = Vec::new();

    for (index, item) in query.select_items.iter().enumerate() {
        let SelectItem::QualifiedStar { qualifier } = item else {
            continue;
        };
        let Some(edge_id) = graph.edge_by_alias(qualifier) else {
            continue;
        };
        if !graph.edge(edge_id).is_path() {
            continue;
        }

        let (decoder_name, path_alias, sink_alias) = {
            let edge = graph.edge(edge_id);
            let sink_alias = edge
                .sink_node
                .map(|sink| graph.node(sink).alias.clone())
                .unwrap_or_default();
            let decoder = format!(
                "{}_{}_{}_{}",
                edge.bound_table.schema_or_default(),
                edge.bound_table.base,
                edge.edge_column,
                PATH_DECODER_SUFFIX
            );
            (decoder, edge.alias.clone(), sink_alias)
        };
        if let Some(spec) = graph.edge_mut(edge_id).path.as_mut() {
            spec.reference_path_info = true;
        }

        decoded_items.push((
            index,
            SelectItem::Expr {
                expression: Expression::FunctionCall(FunctionCall {
                    name: ObjectName::qualified("dbo", decoder_name),
                    args: vec![
                        Expression::ColumnRef(ColumnRef::two_part(
                            path_alias,
                            PATH_MESSAGE_COLUMN,
                        )),
                        Expression::ColumnRef(ColumnRef::two_part(
                            sink_alias.clone(),
                            NODE_TYPE_COLUMN,
                        )),
                        Expression::ColumnRef(ColumnRef::two_part(sink_alias, NODE_ID_COLUMN)),
                    ],
                }),
                column_alias: None,
            },
        ));
    }

    for (index, item) in decoded_items {
        query.select_items[index] = item;
    }

    // a path referenced by plain columns still carries its info through
    for edge in &mut graph.edges {
        if let Some(spec) = edge.path.as_mut() {
            if !spec.reference_path_info && query_references_alias(query, &edge.alias) {
                spec.reference_path_info = true;
            }
        }
    }
}

/// A tail only terminates an edge: terminal position, single incident
/// edge, nothing referencing it. Tails may be skipped by the join tree.
fn mark_tail_nodes(query: &SelectQueryBlock, graph: &MatchGraph) -> Vec<NodeId> {
    let selects_everything = query
        .select_items
        .iter()
        .any(|item| matches!(item, SelectItem::Star));
    if selects_everything {
        return Vec::new();
    }

    let mut incoming_counts: HashMap<NodeId, usize> = HashMap::new();
    for edge in &graph.edges {
        if let Some(sink) = edge.sink_node {
            *incoming_counts.entry(sink).or_insert(0) += 1;
        }
    }

    let mut tails = Vec::new();
    for (index, node) in graph.nodes.iter().enumerate() {
        let id = NodeId(index);
        if node.neighbors.is_empty()
            && incoming_counts.get(&id).copied().unwrap_or(0) == 1
            && !node.external
            && !query_references_alias(query, &node.alias)
        {
            tails.push(id);
        }
    }
    tails
}

fn partition_components(graph: &mut MatchGraph, union_find: &mut UnionFind, tails: &[NodeId]) {
    let mut components: Vec<ConnectedComponent> = Vec::new();
    let mut root_to_component: HashMap<usize, usize> = HashMap::new();

    for index in 0..graph.nodes.len() {
        let root = union_find.find(index);
        let component_index = *root_to_component.entry(root).or_insert_with(|| {
            components.push(ConnectedComponent::default());
            components.len() - 1
        });
        let id = NodeId(index);
        let alias = graph.nodes[index].alias.clone();
        let component = &mut components[component_index];
        component.nodes.insert(alias, id);
        component.is_tail.insert(id, tails.contains(&id));
    }

    for (index, edge) in graph.edges.iter().enumerate() {
        let root = union_find.find(edge.source_node.0);
        let component_index = root_to_component[&root];
        components[component_index]
            .edges
            .insert(edge.alias.clone(), EdgeId(index));
    }

    graph.components = components;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_catalog::testing::mock_catalog::employee_metadata;
    use crate::gsql_parser::parse_query;
    use crate::query_planner::scope::{ScopeChain, ScopeFrame};

    fn build(query_text: &str) -> (SelectQueryBlock, MatchGraph) {
        build_with_scopes(query_text, &ScopeChain::new())
    }

    fn build_with_scopes(query_text: &str, scopes: &ScopeChain) -> (SelectQueryBlock, MatchGraph) {
        let metadata = employee_metadata();
        let mut query = parse_query(query_text).expect("query should parse");
        let match_clause = query.match_clause.clone().expect("query should have MATCH");
        let graph = build_match_graph(&mut query, &match_clause, &metadata, scopes)
            .expect("pattern should build");
        (query, graph)
    }

    #[test]
    fn test_two_hop_path_builds_one_component() {
        let (_, graph) = build(
            "SELECT a.age, b.age, c.age \
             FROM Employee AS a, Employee AS b, Employee AS c \
             MATCH a-[Colleagues AS e]->b-[Colleagues AS f]->c",
        );
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.components.len(), 1);

        let e = graph.edge(graph.edge_by_alias("e").unwrap());
        assert_eq!(graph.node(e.source_node).alias, "a");
        assert_eq!(graph.node(e.sink_node.unwrap()).alias, "b");

        let a = graph.node(graph.node_by_alias("a").unwrap());
        assert_eq!(a.neighbors.len(), 1);
        let b = graph.node(graph.node_by_alias("b").unwrap());
        assert_eq!(b.neighbors.len(), 1);
    }

    #[test]
    fn test_every_edge_has_a_sink() {
        let (_, graph) = build(
            "SELECT a.age FROM Employee AS a, Employee AS b, Employee AS c \
             MATCH a-[Colleagues AS e]->b, a-[Manages AS m]->c",
        );
        for edge in &graph.edges {
            assert!(edge.sink_node.is_some());
        }
    }

    #[test]
    fn test_unnamed_edge_gets_synthesized_alias_and_rewrites_references() {
        let (query, graph) = build(
            "SELECT a.age FROM Employee AS a, Employee AS b \
             MATCH a-[Colleagues]->b WHERE Colleagues.weight > 3",
        );
        let edge = &graph.edges[0];
        assert_eq!(edge.alias, "a_Colleagues_b");

        // the bare edge-column qualifier now names the synthesized alias
        let where_text = query.where_clause.unwrap().to_string();
        assert!(where_text.contains("[a_Colleagues_b].[weight]"));
    }

    #[test]
    fn test_two_unnamed_edges_same_column_is_ambiguous() {
        let metadata = employee_metadata();
        let mut query = parse_query(
            "SELECT a.age FROM Employee AS a, Employee AS b, Employee AS c \
             MATCH a-[Colleagues]->b, b-[Colleagues]->c WHERE Colleagues.weight > 3",
        )
        .unwrap();
        let match_clause = query.match_clause.clone().unwrap();
        let err =
            build_match_graph(&mut query, &match_clause, &metadata, &ScopeChain::new()).unwrap_err();
        assert!(matches!(err, PatternError::AmbiguousEdgeReference { .. }));
    }

    #[test]
    fn test_disconnected_patterns_become_two_components() {
        let (_, graph) = build(
            "SELECT a.age, c.age \
             FROM Employee AS a, Employee AS b, Employee AS c, Employee AS d \
             MATCH a-[Colleagues AS e]->b, c-[Colleagues AS f]->d",
        );
        assert_eq!(graph.components.len(), 2);
        assert_eq!(graph.components[0].nodes.len(), 2);
        assert_eq!(graph.components[1].nodes.len(), 2);
        assert_eq!(graph.components[0].edges.len(), 1);
        assert_eq!(graph.components[1].edges.len(), 1);
    }

    #[test]
    fn test_external_alias_is_rematerialized() {
        let mut scopes = ScopeChain::new();
        scopes.push_frame(
            ScopeFrame::new().with_alias("x", ObjectName::qualified("dbo", "Employee")),
        );
        let (query, graph) = build_with_scopes(
            "SELECT y.age FROM Employee AS x, Employee AS y MATCH x-[Colleagues AS e]->y",
            &scopes,
        );

        // inner FROM lost x
        assert_eq!(query.from_clause.len(), 1);

        let inner = graph.node(graph.node_by_alias("x_inner").unwrap());
        assert!(inner.external);

        let where_text = query.where_clause.unwrap().to_string();
        assert!(where_text.contains("[x].[GlobalNodeId] = [x_inner].[GlobalNodeId]"));
    }

    #[test]
    fn test_unreferenced_terminal_node_is_tail() {
        let (_, graph) = build(
            "SELECT a.age FROM Employee AS a, Employee AS b \
             MATCH a-[Colleagues AS e]->b",
        );
        let b = graph.node_by_alias("b").unwrap();
        assert!(graph.components[0].is_tail_node(b));
        let a = graph.node_by_alias("a").unwrap();
        assert!(!graph.components[0].is_tail_node(a));
    }

    #[test]
    fn test_referenced_terminal_node_is_not_tail() {
        let (_, graph) = build(
            "SELECT b.age FROM Employee AS a, Employee AS b \
             MATCH a-[Colleagues AS e]->b",
        );
        let b = graph.node_by_alias("b").unwrap();
        assert!(!graph.components[0].is_tail_node(b));
    }

    #[test]
    fn test_path_star_projection_becomes_decoder_call() {
        let (query, graph) = build(
            "SELECT p.* FROM Employee AS a, Employee AS b \
             MATCH a-[Colleagues AS p *1..3]->b",
        );
        let edge = graph.edge(graph.edge_by_alias("p").unwrap());
        assert!(edge.path.as_ref().unwrap().reference_path_info);

        let SelectItem::Expr { expression, .. } = &query.select_items[0] else {
            panic!("projection should be rewritten to an expression");
        };
        let rendered = expression.to_string();
        assert!(rendered.contains("dbo_Employee_Colleagues_PathMessageDecoder"));
        assert!(rendered.contains("[p].[PathMessage]"));
        assert!(rendered.contains("[b].[_NodeType]"));
        assert!(rendered.contains("[b].[_NodeId]"));
    }

    #[test]
    fn test_unbound_alias_errors() {
        let metadata = employee_metadata();
        let mut query = parse_query(
            "SELECT a.age FROM Employee AS a MATCH a-[Colleagues AS e]->ghost",
        )
        .unwrap();
        let match_clause = query.match_clause.clone().unwrap();
        let err =
            build_match_graph(&mut query, &match_clause, &metadata, &ScopeChain::new()).unwrap_err();
        assert!(matches!(err, PatternError::UnboundAlias { .. }));
    }
}
