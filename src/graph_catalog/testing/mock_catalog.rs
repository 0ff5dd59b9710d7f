//! Canned catalog data for unit and integration tests.

use crate::graph_catalog::catalog_probe::{
    CatalogProbe, DensityRow, EdgeDegreeRow, MetadataRow, NodeEstimateRow, ROLE_EDGE_ATTRIBUTE,
    ROLE_EDGE_VIEW_MEMBER, ROLE_NODE_VIEW_MEMBER,
};
use crate::graph_catalog::errors::ProbeError;
use crate::graph_catalog::graph_metadata::GraphMetaData;

/// Encodes sink node ids the way the sampling probe returns them: eight
/// little-endian bytes per id.
pub fn encode_sink_ids(ids: &[i64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(ids.len() * 8);
    for id in ids {
        bytes.extend_from_slice(&id.to_le_bytes());
    }
    bytes
}

fn node_column(
    schema: &str,
    table: &str,
    column: &str,
    role: i32,
    reference: Option<&str>,
    column_id: i64,
) -> MetadataRow {
    MetadataRow {
        role,
        table_schema: schema.to_string(),
        table_name: table.to_string(),
        column_name: Some(column.to_string()),
        reference: reference.map(str::to_string),
        column_id,
    }
}

/// A small company graph: `Employee` and `Client` node tables, a `Person`
/// node view over both, and a `Connected` edge view unioning
/// `Employee.Colleagues` with `Client.Contacts`.
pub fn employee_rows() -> Vec<MetadataRow> {
    vec![
        node_column("dbo", "Employee", "GlobalNodeId", 3, None, 1),
        node_column("dbo", "Employee", "age", 0, None, 2),
        node_column("dbo", "Employee", "name", 0, None, 3),
        node_column("dbo", "Employee", "Colleagues", 1, Some("Employee"), 4),
        node_column("dbo", "Employee", "Manages", 1, Some("Employee"), 5),
        node_column("dbo", "Client", "GlobalNodeId", 3, None, 6),
        node_column("dbo", "Client", "name", 0, None, 7),
        node_column("dbo", "Client", "Contacts", 1, Some("Employee"), 8),
        MetadataRow {
            role: ROLE_EDGE_ATTRIBUTE,
            table_schema: "dbo".to_string(),
            table_name: "Employee".to_string(),
            column_name: Some("Colleagues".to_string()),
            reference: Some("weight".to_string()),
            column_id: 9,
        },
        MetadataRow {
            role: ROLE_NODE_VIEW_MEMBER,
            table_schema: "dbo".to_string(),
            table_name: "Person".to_string(),
            column_name: None,
            reference: Some("Employee".to_string()),
            column_id: 20,
        },
        MetadataRow {
            role: ROLE_NODE_VIEW_MEMBER,
            table_schema: "dbo".to_string(),
            table_name: "Person".to_string(),
            column_name: None,
            reference: Some("Client".to_string()),
            column_id: 21,
        },
        node_column("dbo", "Person", "Connected", 2, None, 22),
        MetadataRow {
            role: ROLE_EDGE_VIEW_MEMBER,
            table_schema: "dbo".to_string(),
            table_name: "Person".to_string(),
            column_name: Some("Connected".to_string()),
            reference: Some("Employee.Colleagues".to_string()),
            column_id: 23,
        },
        MetadataRow {
            role: ROLE_EDGE_VIEW_MEMBER,
            table_schema: "dbo".to_string(),
            table_name: "Person".to_string(),
            column_name: Some("Connected".to_string()),
            reference: Some("Client.Contacts".to_string()),
            column_id: 24,
        },
    ]
}

pub fn employee_metadata() -> GraphMetaData {
    GraphMetaData::from_rows(employee_rows()).expect("canned catalog rows should load")
}

/// A `CatalogProbe` returning canned rows regardless of the probe SQL.
/// Callers configure per-alias estimates; the planner picks out the rows
/// it asked for.
#[derive(Debug, Default, Clone)]
pub struct MockCatalog {
    pub metadata: Vec<MetadataRow>,
    pub node_estimates: Vec<NodeEstimateRow>,
    pub edge_degrees: Vec<EdgeDegreeRow>,
    pub key_densities: Vec<DensityRow>,
}

impl MockCatalog {
    pub fn with_employee_graph() -> Self {
        let mut catalog = MockCatalog {
            metadata: employee_rows(),
            ..MockCatalog::default()
        };
        catalog.set_density("dbo", "Employee", 0.001, 1000.0);
        catalog.set_density("dbo", "Client", 0.01, 100.0);
        catalog
    }

    pub fn set_node_estimate(&mut self, alias: &str, estimated_rows: f64) -> &mut Self {
        self.node_estimates.push(NodeEstimateRow {
            table_alias: alias.to_string(),
            estimated_rows,
        });
        self
    }

    pub fn set_edge_degree(&mut self, alias: &str, sinks: &[i64], average_degree: f64) -> &mut Self {
        self.edge_degrees.push(EdgeDegreeRow {
            edge_alias: alias.to_string(),
            sink_sample: encode_sink_ids(sinks),
            sample_row_count: sinks.len() as i64,
            average_degree,
        });
        self
    }

    pub fn set_density(&mut self, schema: &str, table: &str, density: f64, rows: f64) -> &mut Self {
        self.key_densities.push(DensityRow {
            table_schema: schema.to_string(),
            table_name: table.to_string(),
            key_density: density,
            table_rows: rows,
        });
        self
    }
}

impl CatalogProbe for MockCatalog {
    fn metadata_rows(&self, _sql: &str) -> Result<Vec<MetadataRow>, ProbeError> {
        Ok(self.metadata.clone())
    }

    fn node_estimates(&self, _sql: &str) -> Result<Vec<NodeEstimateRow>, ProbeError> {
        Ok(self.node_estimates.clone())
    }

    fn edge_degrees(&self, _sql: &str) -> Result<Vec<EdgeDegreeRow>, ProbeError> {
        Ok(self.edge_degrees.clone())
    }

    fn key_densities(&self, _sql: &str) -> Result<Vec<DensityRow>, ProbeError> {
        Ok(self.key_densities.clone())
    }
}
