use serde::{Deserialize, Serialize};

use super::errors::ProbeError;

/// Catalog table names. The planner only reads these; the surrounding DDL
/// layer owns their maintenance.
pub const NODE_TABLE_CATALOG: &str = "_NodeTableCollection";
pub const NODE_TABLE_COLUMN_CATALOG: &str = "_NodeTableColumnCollection";
pub const EDGE_ATTRIBUTE_CATALOG: &str = "_EdgeAttributeCollection";
pub const EDGE_DEGREE_CATALOG: &str = "_EdgeAverageDegreeCollection";
pub const NODE_VIEW_CATALOG: &str = "_NodeViewCollection";
pub const EDGE_VIEW_CATALOG: &str = "_NodeViewColumnCollection";

/// Role tags on metadata probe rows. Non-negative values are
/// `ColumnRole` codes of node-table columns.
pub const ROLE_EDGE_ATTRIBUTE: i32 = -1;
pub const ROLE_NODE_VIEW_MEMBER: i32 = -2;
pub const ROLE_EDGE_VIEW_MEMBER: i32 = -3;

/// One row of the union-all metadata probe. The `reference` column is
/// role-dependent: sink table for edges, attribute name for attribute
/// rows, member table for node views, `table.column` for edge views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub role: i32,
    pub table_schema: String,
    pub table_name: String,
    pub column_name: Option<String>,
    pub reference: Option<String>,
    pub column_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEstimateRow {
    pub table_alias: String,
    pub estimated_rows: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDegreeRow {
    pub edge_alias: String,
    /// Encoded sample of sink node ids, eight little-endian bytes each.
    pub sink_sample: Vec<u8>,
    pub sample_row_count: i64,
    pub average_degree: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityRow {
    pub table_schema: String,
    pub table_name: String,
    /// `1 / distinct_values` of the primary-key column.
    pub key_density: f64,
    pub table_rows: f64,
}

/// Synchronous catalog access. The planner builds the SQL text; the
/// collaborator executes it under the caller's connection and transaction
/// and returns typed rows. Probe calls within one planner invocation are
/// serial, and `metadata_rows` results must preserve the emitted order.
#[cfg_attr(test, mockall::automock)]
pub trait CatalogProbe {
    fn metadata_rows(&self, sql: &str) -> Result<Vec<MetadataRow>, ProbeError>;
    fn node_estimates(&self, sql: &str) -> Result<Vec<NodeEstimateRow>, ProbeError>;
    fn edge_degrees(&self, sql: &str) -> Result<Vec<EdgeDegreeRow>, ProbeError>;
    fn key_densities(&self, sql: &str) -> Result<Vec<DensityRow>, ProbeError>;
}
