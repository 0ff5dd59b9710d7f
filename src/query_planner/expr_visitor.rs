//! Explicit recursive walkers over the query AST. Each pass collects or
//! rewrites facts through its closure state.

use crate::gsql_parser::ast::{
    ColumnRef, Expression, SelectItem, SelectQueryBlock, TableReference,
};

pub fn visit_column_refs<'a>(expr: &'a Expression, f: &mut impl FnMut(&'a ColumnRef)) {
    match expr {
        Expression::ColumnRef(column_ref) => f(column_ref),
        Expression::FunctionCall(fc) => {
            for arg in &fc.args {
                visit_column_refs(arg, f);
            }
        }
        Expression::OperatorApplicationExp(op_app) => {
            for operand in &op_app.operands {
                visit_column_refs(operand, f);
            }
        }
        Expression::Literal(_) | Expression::Parameter(_) => {}
    }
}

pub fn visit_parameters<'a>(expr: &'a Expression, f: &mut impl FnMut(&'a str)) {
    match expr {
        Expression::Parameter(name) => f(name),
        Expression::FunctionCall(fc) => {
            for arg in &fc.args {
                visit_parameters(arg, f);
            }
        }
        Expression::OperatorApplicationExp(op_app) => {
            for operand in &op_app.operands {
                visit_parameters(operand, f);
            }
        }
        Expression::Literal(_) | Expression::ColumnRef(_) => {}
    }
}

/// Every `@parameter` referenced by the block, in reading order.
pub fn collect_query_parameters(query: &SelectQueryBlock) -> Vec<String> {
    let mut parameters = Vec::new();
    for item in &query.select_items {
        if let SelectItem::Expr { expression, .. } = item {
            visit_parameters(expression, &mut |name| parameters.push(name.to_string()));
        }
    }
    if let Some(where_clause) = &query.where_clause {
        visit_parameters(where_clause, &mut |name| parameters.push(name.to_string()));
    }
    parameters
}

pub fn visit_column_refs_mut(expr: &mut Expression, f: &mut impl FnMut(&mut ColumnRef)) {
    match expr {
        Expression::ColumnRef(column_ref) => f(column_ref),
        Expression::FunctionCall(fc) => {
            for arg in &mut fc.args {
                visit_column_refs_mut(arg, f);
            }
        }
        Expression::OperatorApplicationExp(op_app) => {
            for operand in &mut op_app.operands {
                visit_column_refs_mut(operand, f);
            }
        }
        Expression::Literal(_) | Expression::Parameter(_) => {}
    }
}

fn visit_table_ref_conditions_mut(
    table_ref: &mut TableReference,
    f: &mut impl FnMut(&mut ColumnRef),
) {
    if let TableReference::QualifiedJoin(join) = table_ref {
        visit_table_ref_conditions_mut(&mut join.left, f);
        visit_table_ref_conditions_mut(&mut join.right, f);
        visit_column_refs_mut(&mut join.condition, f);
    }
}

/// Rewrites every column reference in the block: select items, join
/// conditions already on FROM, and the WHERE clause.
pub fn visit_query_column_refs_mut(
    query: &mut SelectQueryBlock,
    f: &mut impl FnMut(&mut ColumnRef),
) {
    for item in &mut query.select_items {
        if let SelectItem::Expr { expression, .. } = item {
            visit_column_refs_mut(expression, f);
        }
    }
    for table_ref in &mut query.from_clause {
        visit_table_ref_conditions_mut(table_ref, f);
    }
    if let Some(where_clause) = &mut query.where_clause {
        visit_column_refs_mut(where_clause, f);
    }
}

/// True when any column reference or qualified star in the block uses
/// `alias` as its qualifier.
pub fn query_references_alias(query: &SelectQueryBlock, alias: &str) -> bool {
    let alias_lower = alias.to_lowercase();
    let mut found = false;

    for item in &query.select_items {
        match item {
            SelectItem::QualifiedStar { qualifier } => {
                if qualifier.to_lowercase() == alias_lower {
                    found = true;
                }
            }
            SelectItem::Expr { expression, .. } => {
                visit_column_refs(expression, &mut |column_ref| {
                    if let Some(qualifier) = column_ref.qualifier() {
                        if qualifier.to_lowercase() == alias_lower {
                            found = true;
                        }
                    }
                });
            }
            SelectItem::Star => {}
        }
    }
    if let Some(where_clause) = &query.where_clause {
        visit_column_refs(where_clause, &mut |column_ref| {
            if let Some(qualifier) = column_ref.qualifier() {
                if qualifier.to_lowercase() == alias_lower {
                    found = true;
                }
            }
        });
    }
    found
}
