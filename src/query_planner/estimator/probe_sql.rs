//! SQL builders for the three statistics probes. The collaborator only
//! executes these; every template is owned here so the shapes stay in one
//! place.

use crate::graph_catalog::catalog_probe::EDGE_DEGREE_CATALOG;
use crate::graph_catalog::graph_metadata::{
    GLOBAL_NODE_ID, NODE_ID_ENCODER_FUNCTION,
};
use crate::gsql_parser::ast::{Expression, ObjectName};

#[derive(Debug, Clone)]
pub struct NodeProbeSelect {
    pub alias: String,
    pub table: ObjectName,
    pub predicates: Vec<Expression>,
}

fn render_where(predicates: &[Expression]) -> String {
    if predicates.is_empty() {
        return String::new();
    }
    let rendered: Vec<String> = predicates.iter().map(|p| format!("({})", p)).collect();
    format!(" WHERE {}", rendered.join(" AND "))
}

/// One union-all returning the host's row estimate per tagged select. A
/// node over a view contributes one select per concrete member table.
pub fn node_estimate_sql(selects: &[NodeProbeSelect]) -> String {
    let parts: Vec<String> = selects
        .iter()
        .map(|select| {
            format!(
                "SELECT '{alias}' AS TableAlias, [{node_id}] FROM {table} AS [{alias}] \
                 WITH (ForceScan){where_clause}",
                alias = select.alias,
                node_id = GLOBAL_NODE_ID,
                table = select.table,
                where_clause = render_where(&select.predicates),
            )
        })
        .collect();
    parts.join(" UNION ALL ")
}

#[derive(Debug, Clone)]
pub struct EdgeProbeMember {
    pub schema: String,
    pub table: String,
    pub edge_column: String,
}

impl EdgeProbeMember {
    pub fn sampling_table(&self) -> String {
        format!(
            "[{schema}].[{schema}_{table}_{edge}_Sampling]",
            schema = self.schema,
            table = self.table,
            edge = self.edge_column,
        )
    }
}

/// One probe per pattern edge: the sampling table joined with the degree
/// catalog, one select per member edge of a view. Returns the encoded
/// sink sample, the sample size, and the cataloged average degree.
pub fn edge_degree_sql(
    edge_alias: &str,
    members: &[EdgeProbeMember],
    predicates: &[Expression],
) -> String {
    let parts: Vec<String> = members
        .iter()
        .map(|member| {
            format!(
                "SELECT '{alias}' AS EdgeAlias, dbo.{encoder}(S.[Sink]) AS SinkSample, \
                 D.SampleRowCount, D.AverageDegree \
                 FROM {sampling} AS S \
                 JOIN [dbo].[{degree_catalog}] AS D \
                 ON D.TableSchema = '{schema}' AND D.TableName = '{table}' \
                 AND D.ColumnName = '{edge}'{where_clause} \
                 GROUP BY D.SampleRowCount, D.AverageDegree",
                alias = edge_alias,
                encoder = NODE_ID_ENCODER_FUNCTION,
                sampling = member.sampling_table(),
                degree_catalog = EDGE_DEGREE_CATALOG,
                schema = member.schema,
                table = member.table,
                edge = member.edge_column,
                where_clause = render_where(predicates),
            )
        })
        .collect();
    parts.join(" UNION ALL ")
}

/// Density of the node-identity key, per concrete table.
pub fn density_sql(table: &ObjectName) -> String {
    format!(
        "DBCC SHOW_STATISTICS (\"{schema}.{table}\", {column}) WITH DENSITY_VECTOR",
        schema = table.schema_or_default(),
        table = table.base,
        column = GLOBAL_NODE_ID,
    )
}
