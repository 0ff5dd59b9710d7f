use indexmap::IndexSet;

use crate::graph_catalog::graph_metadata::{DOWNSIZE_FUNCTION, LOCAL_NODE_ID};
use crate::graph_catalog::ident::IdentKey;
use crate::gsql_parser::ast::{
    ColumnRef, Expression, FunctionCall, Literal, ObjectName, SelectQueryBlock, TableReference,
};
use crate::query_planner::errors::EmitterError;
use crate::query_planner::expr_visitor::{visit_column_refs_mut, visit_query_column_refs_mut};
use crate::query_planner::join_order::{DownSizeTarget, MatchComponent};
use crate::query_planner::match_graph::MatchGraph;

/// Rewrites the query block from the chosen component plans: FROM gets
/// the join trees, WHERE gets the attached and replicated predicates, and
/// the consumed MATCH clause is cleared.
pub struct Emitter<'a> {
    graph: &'a MatchGraph,
}

impl<'a> Emitter<'a> {
    pub fn new(graph: &'a MatchGraph) -> Self {
        Emitter { graph }
    }

    pub fn emit(
        &self,
        query: &mut SelectQueryBlock,
        chosen: Vec<MatchComponent>,
    ) -> Result<(), EmitterError> {
        self.strip_schema_qualifiers(query);

        // the matched tables now arrive through the join trees
        let matched: IndexSet<IdentKey> = self
            .graph
            .alias_to_node
            .keys()
            .cloned()
            .collect();
        query.from_clause.retain(|table_ref| match table_ref {
            TableReference::Named(named) => {
                !matched.contains(&IdentKey::new(named.exposed_alias()))
            }
            _ => true,
        });

        for (index, component) in chosen.into_iter().enumerate() {
            self.append_attached_predicates(query, &component);

            let mut table_ref = component
                .table_ref
                .ok_or(EmitterError::MissingJoinTree { component: index })?;
            for target in &component.downsize_targets {
                inject_downsize_guard(&mut table_ref, target);
            }
            query.from_clause.push(table_ref);
        }

        query.match_clause = None;
        Ok(())
    }

    /// `dbo.a.age` is invalid once `a` is an alias; the schema qualifier
    /// goes away.
    fn strip_schema_qualifiers(&self, query: &mut SelectQueryBlock) {
        let mut aliases: IndexSet<IdentKey> = self.graph.alias_to_node.keys().cloned().collect();
        aliases.extend(self.graph.alias_to_edge.keys().cloned());
        for table_ref in &query.from_clause {
            if let TableReference::Named(named) = table_ref {
                aliases.insert(IdentKey::new(named.exposed_alias()));
            }
        }

        visit_query_column_refs_mut(query, &mut |column_ref: &mut ColumnRef| {
            if column_ref.parts.len() == 3
                && aliases.contains(&IdentKey::new(&column_ref.parts[1]))
            {
                column_ref.parts.remove(0);
            }
        });
    }

    /// Predicates pushed down for estimation return to WHERE, plus one
    /// rewrite per split replica with the `_k` alias suffix.
    fn append_attached_predicates(&self, query: &mut SelectQueryBlock, component: &MatchComponent) {
        let mut appended: Vec<Expression> = Vec::new();

        for &node_id in component.materialized_nodes.iter() {
            let node = self.graph.node(node_id);
            appended.extend(node.predicates.iter().cloned());
            let splits = component
                .materialized_node_split_count
                .get(&node_id)
                .copied()
                .unwrap_or(0);
            for replica in 1..=splits {
                let replica_alias = format!("{}_{}", node.alias, replica);
                for predicate in &node.predicates {
                    appended.push(rewrite_alias(predicate, &node.alias, &replica_alias));
                }
            }
        }

        for &edge_id in component.materialized_edges.keys() {
            appended.extend(self.graph.edge(edge_id).predicates.iter().cloned());
        }

        if appended.is_empty() {
            return;
        }
        let mut conjuncts: Vec<Expression> = query
            .where_clause
            .take()
            .map(|existing| existing.into_conjuncts())
            .unwrap_or_default();
        conjuncts.extend(appended);
        query.where_clause = Expression::from_conjuncts(conjuncts);
    }
}

fn rewrite_alias(predicate: &Expression, from: &str, to: &str) -> Expression {
    let from_key = IdentKey::new(from);
    let mut rewritten = predicate.clone();
    visit_column_refs_mut(&mut rewritten, &mut |column_ref| {
        if column_ref.parts.len() >= 2 {
            let position = column_ref.parts.len() - 2;
            if IdentKey::new(&column_ref.parts[position]) == from_key {
                column_ref.parts[position] = to.to_string();
            }
        }
    });
    rewritten
}

/// ANDs the two-way guard disjunction into the join condition at the
/// recorded boundary, biasing the host's estimate downward there.
fn inject_downsize_guard(table_ref: &mut TableReference, target: &DownSizeTarget) {
    let TableReference::QualifiedJoin(join) = table_ref else {
        return;
    };
    inject_downsize_guard(&mut join.left, target);

    if join.right.rightmost_alias() != target.join_alias {
        return;
    }
    let call = |value: &str| {
        Expression::equals(
            Expression::FunctionCall(FunctionCall {
                name: ObjectName::bare(DOWNSIZE_FUNCTION),
                args: vec![Expression::ColumnRef(ColumnRef::two_part(
                    target.node_alias.clone(),
                    LOCAL_NODE_ID,
                ))],
            }),
            Expression::Literal(Literal::String(value.to_string())),
        )
    };
    let guard = Expression::or(call("1"), call("2"));
    let condition = std::mem::replace(
        &mut join.condition,
        Expression::Literal(Literal::Null),
    );
    join.condition = Expression::and(condition, guard);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_catalog::testing::mock_catalog::employee_metadata;
    use crate::gsql_parser::ast::{JoinKind, NamedTableRef, QualifiedJoin};
    use crate::gsql_parser::parse_query;
    use crate::query_planner::match_graph::pattern_builder::build_match_graph;
    use crate::query_planner::scope::ScopeChain;

    fn named(alias: &str) -> TableReference {
        TableReference::Named(NamedTableRef {
            object: ObjectName::qualified("dbo", "Employee"),
            alias: Some(alias.to_string()),
        })
    }

    fn join(left: TableReference, right: TableReference) -> TableReference {
        TableReference::QualifiedJoin(Box::new(QualifiedJoin {
            left,
            right,
            kind: JoinKind::Inner,
            condition: Expression::equals(
                Expression::Literal(Literal::Integer(1)),
                Expression::Literal(Literal::Integer(1)),
            ),
        }))
    }

    #[test]
    fn test_split_predicates_are_replicated_with_suffixes() {
        let metadata = employee_metadata();
        let mut query = parse_query(
            "SELECT a.age, b.age FROM Employee AS a, Employee AS b \
             MATCH a-[Colleagues AS e]->b WHERE a.age > 30",
        )
        .unwrap();
        let match_clause = query.match_clause.clone().unwrap();
        let mut graph =
            build_match_graph(&mut query, &match_clause, &metadata, &ScopeChain::new()).unwrap();
        crate::query_planner::predicate_attachment::attach_predicates(
            &mut query,
            &mut graph,
            &metadata,
        );

        let a = graph.node_by_alias("a").unwrap();
        let b = graph.node_by_alias("b").unwrap();
        let e = graph.edge_by_alias("e").unwrap();

        let mut component = MatchComponent::empty();
        component.materialized_nodes.insert(a);
        component.materialized_nodes.insert(b);
        component
            .materialized_edges
            .insert(e, crate::query_planner::join_order::EdgeDirection::Outgoing);
        component.materialized_node_split_count.insert(a, 2);
        component.table_ref = Some(join(named("a"), named("b")));

        Emitter::new(&graph).emit(&mut query, vec![component]).unwrap();

        assert!(query.match_clause.is_none());
        let where_text = query.where_clause.unwrap().to_string();
        assert!(where_text.contains("[a].[age] > 30"));
        assert!(where_text.contains("[a_1].[age] > 30"));
        assert!(where_text.contains("[a_2].[age] > 30"));
    }

    #[test]
    fn test_downsize_guard_lands_on_recorded_boundary() {
        let mut tree = join(join(named("a"), named("e")), named("b"));
        inject_downsize_guard(
            &mut tree,
            &DownSizeTarget {
                join_alias: "b".to_string(),
                node_alias: "b".to_string(),
            },
        );
        let TableReference::QualifiedJoin(outer) = &tree else {
            panic!("expected a join tree");
        };
        let condition = outer.condition.to_string();
        assert!(condition.contains("[DownSizeFunction]([b].[LocalNodeId]) = '1'"));
        assert!(condition.contains("= '2'"));

        // the inner boundary (right side `e`) was left untouched
        let TableReference::QualifiedJoin(inner) = &outer.left else {
            panic!("expected an inner join");
        };
        assert!(!inner.condition.to_string().contains("DownSizeFunction"));
    }

    #[test]
    fn test_schema_qualifier_is_stripped_for_aliased_tables() {
        let metadata = employee_metadata();
        let mut query = parse_query(
            "SELECT dbo.a.age FROM Employee AS a, Employee AS b \
             MATCH a-[Colleagues AS e]->b",
        )
        .unwrap();
        let match_clause = query.match_clause.clone().unwrap();
        let graph =
            build_match_graph(&mut query, &match_clause, &metadata, &ScopeChain::new()).unwrap();

        let a = graph.node_by_alias("a").unwrap();
        let b = graph.node_by_alias("b").unwrap();
        let e = graph.edge_by_alias("e").unwrap();
        let mut component = MatchComponent::empty();
        component.materialized_nodes.insert(a);
        component.materialized_nodes.insert(b);
        component
            .materialized_edges
            .insert(e, crate::query_planner::join_order::EdgeDirection::Outgoing);
        component.table_ref = Some(join(named("a"), named("b")));

        Emitter::new(&graph).emit(&mut query, vec![component]).unwrap();

        let crate::gsql_parser::ast::SelectItem::Expr { expression, .. } = &query.select_items[0]
        else {
            panic!("expected an expression item");
        };
        assert_eq!(expression.to_string(), "[a].[age]");
    }
}
