//! End-to-end planning over the mock catalog: parse, plan, inspect the
//! rewritten query block.

use crate::graph_catalog::graph_metadata::GraphMetaData;
use crate::graph_catalog::testing::mock_catalog::MockCatalog;
use crate::gsql_parser::ast::{SelectItem, SelectQueryBlock, TableReference};
use crate::gsql_parser::parse_query;
use crate::query_planner::scope::{ScopeChain, ScopeFrame};
use crate::query_planner::MatchPlanner;

fn plan_query(query_text: &str, catalog: &MockCatalog, scopes: &ScopeChain) -> SelectQueryBlock {
    let metadata = GraphMetaData::load(catalog).expect("metadata should load");
    let mut query = parse_query(query_text).expect("query should parse");
    let planner = MatchPlanner::new(&metadata, catalog);
    planner.plan(&mut query, scopes).expect("planning should succeed");
    query
}

fn from_aliases(query: &SelectQueryBlock) -> Vec<String> {
    fn walk(table_ref: &TableReference, out: &mut Vec<String>) {
        match table_ref {
            TableReference::Named(named) => out.push(named.exposed_alias().to_string()),
            TableReference::FunctionTable(ft) => out.push(ft.alias.clone()),
            TableReference::QualifiedJoin(join) => {
                walk(&join.left, out);
                walk(&join.right, out);
            }
        }
    }
    let mut aliases = Vec::new();
    for table_ref in &query.from_clause {
        walk(table_ref, &mut aliases);
    }
    aliases
}

fn render_join_conditions(query: &SelectQueryBlock) -> String {
    fn walk(table_ref: &TableReference, out: &mut String) {
        if let TableReference::QualifiedJoin(join) = table_ref {
            walk(&join.left, out);
            walk(&join.right, out);
            out.push_str(&join.condition.to_string());
            out.push('\n');
        }
    }
    let mut rendered = String::new();
    for table_ref in &query.from_clause {
        walk(table_ref, &mut rendered);
    }
    rendered
}

#[test]
fn test_two_hop_simple_path() {
    let mut catalog = MockCatalog::with_employee_graph();
    for alias in ["a", "b", "c"] {
        catalog.set_node_estimate(alias, 100.0);
    }
    catalog.set_edge_degree("e", &[1], 1.0);
    catalog.set_edge_degree("f", &[2], 1.0);

    let query = plan_query(
        "SELECT a.age, b.age, c.age \
         FROM Employee AS a, Employee AS b, Employee AS c \
         MATCH a-[Colleagues AS e]->b-[Colleagues AS f]->c",
        &catalog,
        &ScopeChain::new(),
    );

    assert!(query.match_clause.is_none());
    assert_eq!(query.from_clause.len(), 1);
    let aliases = from_aliases(&query);
    for alias in ["a", "e", "b", "f", "c"] {
        assert!(aliases.contains(&alias.to_string()), "missing {alias}");
    }

    let conditions = render_join_conditions(&query);
    assert!(conditions.contains("[e].[Source] = [a].[GlobalNodeId]"));
    assert!(conditions.contains("[e].[Sink] = [b].[GlobalNodeId]"));
    assert!(conditions.contains("[f].[Sink] = [c].[GlobalNodeId]"));
}

#[test]
fn test_planning_is_idempotent() {
    let mut catalog = MockCatalog::with_employee_graph();
    for alias in ["a", "b"] {
        catalog.set_node_estimate(alias, 10.0);
    }
    catalog.set_edge_degree("e", &[1], 1.0);

    let mut query = plan_query(
        "SELECT a.age, b.age FROM Employee AS a, Employee AS b \
         MATCH a-[Colleagues AS e]->b",
        &catalog,
        &ScopeChain::new(),
    );
    assert!(query.match_clause.is_none());

    // planning its own output changes nothing
    let metadata = GraphMetaData::load(&catalog).unwrap();
    let planner = MatchPlanner::new(&metadata, &catalog);
    let before = query.clone();
    planner.plan(&mut query, &ScopeChain::new()).unwrap();
    assert_eq!(query, before);
}

#[test]
fn test_triangle_closes_without_downsize_guard() {
    let mut catalog = MockCatalog::with_employee_graph();
    for alias in ["a", "b", "c"] {
        catalog.set_node_estimate(alias, 50.0);
    }
    for edge in ["e1", "e2", "e3"] {
        catalog.set_edge_degree(edge, &[1, 2, 3], 1.5);
    }

    let query = plan_query(
        "SELECT a.age, b.age, c.age \
         FROM Employee AS a, Employee AS b, Employee AS c \
         MATCH a-[Colleagues AS e1]->b-[Colleagues AS e2]->c-[Colleagues AS e3]->a",
        &catalog,
        &ScopeChain::new(),
    );

    assert!(query.match_clause.is_none());
    let aliases = from_aliases(&query);
    for alias in ["a", "b", "c", "e1", "e2", "e3"] {
        assert!(aliases.contains(&alias.to_string()), "missing {alias}");
    }
    // the cycle closes through a join condition touching both endpoints
    let conditions = render_join_conditions(&query);
    assert!(conditions.contains("[e3].[Sink] = [a].[GlobalNodeId]"));
    // small estimates never cross the guard threshold
    assert!(!conditions.contains("DownSizeFunction"));
}

#[test]
fn test_variable_length_path_projection() {
    let mut catalog = MockCatalog::with_employee_graph();
    for alias in ["a", "b"] {
        catalog.set_node_estimate(alias, 10.0);
    }
    catalog.set_edge_degree("p", &[1, 2], 2.0);

    let query = plan_query(
        "SELECT p.* FROM Employee AS a, Employee AS b \
         MATCH a-[Colleagues AS p *1..3]->b",
        &catalog,
        &ScopeChain::new(),
    );

    // projection decodes the path value
    let SelectItem::Expr { expression, .. } = &query.select_items[0] else {
        panic!("path projection should be rewritten");
    };
    let rendered = expression.to_string();
    assert!(rendered.contains("dbo_Employee_Colleagues_PathMessageDecoder"));
    assert!(rendered.contains("[p].[PathMessage]"));
    assert!(rendered.contains("[b].[_NodeType]"));
    assert!(rendered.contains("[b].[_NodeId]"));

    // the path materializes through the expansion function
    let aliases = from_aliases(&query);
    assert!(aliases.contains(&"p".to_string()));
    let has_function_table = {
        fn any_function(table_ref: &TableReference) -> bool {
            match table_ref {
                TableReference::FunctionTable(ft) => {
                    ft.call.name.base.contains("bfsPath")
                }
                TableReference::QualifiedJoin(join) => {
                    any_function(&join.left) || any_function(&join.right)
                }
                TableReference::Named(_) => false,
            }
        }
        query.from_clause.iter().any(any_function)
    };
    assert!(has_function_table);
}

#[test]
fn test_disconnected_components_plan_independently() {
    let mut catalog = MockCatalog::with_employee_graph();
    for alias in ["a", "b", "c", "d"] {
        catalog.set_node_estimate(alias, 20.0);
    }
    catalog.set_edge_degree("e", &[1], 1.0);
    catalog.set_edge_degree("f", &[2], 1.0);

    let query = plan_query(
        "SELECT a.age, b.age, c.age, d.age \
         FROM Employee AS a, Employee AS b, Employee AS c, Employee AS d \
         MATCH a-[Colleagues AS e]->b, c-[Colleagues AS f]->d",
        &catalog,
        &ScopeChain::new(),
    );

    assert!(query.match_clause.is_none());
    // one join tree per component, nothing else left in FROM
    assert_eq!(query.from_clause.len(), 2);

    let conditions = render_join_conditions(&query);
    assert!(conditions.contains("[e].[Source] = [a].[GlobalNodeId]"));
    assert!(conditions.contains("[f].[Source] = [c].[GlobalNodeId]"));
    // no predicate ties the two components together
    assert!(!conditions.contains("[b].[GlobalNodeId] = [c]"));
    assert!(query.where_clause.is_none());
}

#[test]
fn test_external_alias_rematerialization() {
    let mut catalog = MockCatalog::with_employee_graph();
    catalog.set_node_estimate("x_inner", 10.0);
    catalog.set_node_estimate("y", 10.0);
    catalog.set_edge_degree("e", &[1], 1.0);

    let mut scopes = ScopeChain::new();
    scopes.push_frame(ScopeFrame::new().with_alias(
        "x",
        crate::gsql_parser::ast::ObjectName::qualified("dbo", "Employee"),
    ));

    let query = plan_query(
        "SELECT y.age FROM Employee AS x, Employee AS y MATCH x-[Colleagues AS e]->y",
        &catalog,
        &scopes,
    );

    // the outer table left this block's FROM; the inner copy joins back
    let aliases = from_aliases(&query);
    assert!(!aliases.contains(&"x".to_string()));
    assert!(aliases.contains(&"x_inner".to_string()));
    assert!(aliases.contains(&"y".to_string()));

    let where_text = query.where_clause.as_ref().unwrap().to_string();
    assert!(where_text.contains("[x].[GlobalNodeId] = [x_inner].[GlobalNodeId]"));
}

#[test]
fn test_attached_predicates_return_to_where() {
    let mut catalog = MockCatalog::with_employee_graph();
    for alias in ["a", "b"] {
        catalog.set_node_estimate(alias, 10.0);
    }
    catalog.set_edge_degree("e", &[1], 1.0);

    let query = plan_query(
        "SELECT a.age, b.age FROM Employee AS a, Employee AS b \
         MATCH a-[Colleagues AS e]->b WHERE a.age > 30 AND a.age > b.age",
        &catalog,
        &ScopeChain::new(),
    );

    let where_text = query.where_clause.as_ref().unwrap().to_string();
    // the pushed-down predicate came back alongside the residual one
    assert!(where_text.contains("[a].[age] > 30"));
    assert!(where_text.contains("[a].[age] > [b].[age]"));
}

#[test]
fn test_validation_failure_surfaces_from_plan() {
    let catalog = MockCatalog::with_employee_graph();
    let metadata = GraphMetaData::load(&catalog).unwrap();
    let mut query = parse_query(
        "SELECT a.age FROM Employee AS a, Client AS c MATCH a-[Colleagues AS e]->c",
    )
    .unwrap();
    let planner = MatchPlanner::new(&metadata, &catalog);
    let err = planner.plan(&mut query, &ScopeChain::new()).unwrap_err();
    assert!(err
        .to_string()
        .contains("cannot be a sink of edge `Colleagues`"));
}
