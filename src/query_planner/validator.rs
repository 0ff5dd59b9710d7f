use crate::graph_catalog::graph_metadata::GraphMetaData;
use crate::graph_catalog::ident::{IdentKey, TableKey};
use crate::gsql_parser::ast::{MatchClause, SelectQueryBlock};
use crate::query_planner::errors::ValidationError;
use crate::query_planner::expr_visitor::collect_query_parameters;
use crate::query_planner::match_graph::pattern_builder::{collect_node_bindings, resolve_binding};
use crate::query_planner::scope::ScopeChain;

/// Checks every `(source, edge, next)` triple of the pattern against the
/// catalog before any graph is built, and every `@parameter` against the
/// enclosing scope chain. Each failure names its offender.
pub fn validate_match_clause(
    query: &SelectQueryBlock,
    match_clause: &MatchClause,
    metadata: &GraphMetaData,
    scopes: &ScopeChain,
) -> Result<(), ValidationError> {
    for name in collect_query_parameters(query) {
        if !scopes.contains_variable(&name) {
            return Err(ValidationError::UndeclaredParameter { name });
        }
    }

    let bindings = collect_node_bindings(query, scopes);

    let node_table_key = |alias: &str| -> Result<TableKey, ValidationError> {
        let binding = resolve_binding(&bindings, scopes, alias).ok_or_else(|| {
            ValidationError::UnboundNodeAlias {
                alias: alias.to_string(),
            }
        })?;
        let key = TableKey::from_object(&binding.object);
        if !metadata.is_node_table(&key) && !metadata.is_node_view(&key) {
            return Err(ValidationError::NotANodeTable {
                alias: alias.to_string(),
                table: binding.object.base.clone(),
            });
        }
        Ok(key)
    };

    for path in &match_clause.paths {
        for (source_alias, edge, next_alias) in path.triples() {
            let source_key = node_table_key(source_alias)?;
            let next_key = node_table_key(next_alias)?;

            if let Some(max_length) = edge.max_length {
                if edge.min_length > max_length {
                    return Err(ValidationError::InvalidPathLength {
                        edge: edge.edge_column.clone(),
                        min: edge.min_length,
                        max: max_length,
                    });
                }
            }

            let edge_key = IdentKey::new(&edge.edge_column);
            let (bound_key, info) = metadata
                .resolve_edge_binding(&source_key, &edge_key)
                .ok_or_else(|| ValidationError::UnknownEdgeColumn {
                    edge: edge.edge_column.clone(),
                    table: source_key.table.to_string(),
                })?;

            if info.sink_nodes.is_empty() {
                return Err(ValidationError::UnbindableEdge {
                    edge: edge.edge_column.clone(),
                });
            }

            for sink in &info.sink_nodes {
                let sink_key = TableKey {
                    schema: bound_key.schema.clone(),
                    table: sink.clone(),
                };
                if !metadata.is_node_table(&sink_key) && !metadata.is_node_view(&sink_key) {
                    return Err(ValidationError::UnknownSinkTable {
                        edge: edge.edge_column.clone(),
                        sink: sink.to_string(),
                    });
                }
            }

            let next_candidates = metadata.concrete_tables(&next_key);
            let reachable = next_candidates
                .iter()
                .any(|candidate| info.sink_nodes.contains(&candidate.table));
            if !reachable {
                return Err(ValidationError::WrongSinkTable {
                    edge: edge.edge_column.clone(),
                    node: next_alias.to_string(),
                });
            }
        }
    }
    Ok(())
}
