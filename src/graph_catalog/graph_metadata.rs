use indexmap::{IndexMap, IndexSet};
use tracing::info;

use super::catalog_probe::{
    CatalogProbe, MetadataRow, EDGE_ATTRIBUTE_CATALOG, EDGE_VIEW_CATALOG, NODE_TABLE_CATALOG,
    NODE_TABLE_COLUMN_CATALOG, NODE_VIEW_CATALOG, ROLE_EDGE_ATTRIBUTE, ROLE_EDGE_VIEW_MEMBER,
    ROLE_NODE_VIEW_MEMBER,
};
use super::errors::GraphCatalogError;
use super::ident::{IdentKey, TableKey};
use crate::gsql_parser::ast::ObjectName;

/// Well-known column and function names the emitted SQL depends on.
pub const GLOBAL_NODE_ID: &str = "GlobalNodeId";
pub const LOCAL_NODE_ID: &str = "LocalNodeId";
pub const NODE_TYPE_COLUMN: &str = "_NodeType";
pub const NODE_ID_COLUMN: &str = "_NodeId";
pub const PATH_MESSAGE_COLUMN: &str = "PathMessage";
pub const DOWNSIZE_FUNCTION: &str = "DownSizeFunction";
pub const NODE_ID_ENCODER_FUNCTION: &str = "GraphViewUDFGlobalNodeIdEncoder";
pub const PATH_DECODER_SUFFIX: &str = "PathMessageDecoder";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Property,
    Edge,
    EdgeView,
    NodeId,
}

impl ColumnRole {
    pub fn from_code(code: i32) -> Option<ColumnRole> {
        match code {
            0 => Some(ColumnRole::Property),
            1 => Some(ColumnRole::Edge),
            2 => Some(ColumnRole::EdgeView),
            3 => Some(ColumnRole::NodeId),
            _ => None,
        }
    }

    pub fn is_edge(&self) -> bool {
        matches!(self, ColumnRole::Edge | ColumnRole::EdgeView)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeInfo {
    /// Declared sink node tables, in catalog arrival order. The first
    /// entry is authoritative when a single sink must be chosen; the
    /// catalog is expected to declare one sink per concrete edge.
    pub sink_nodes: IndexSet<IdentKey>,
    /// For edge views only: the (source table, edge column) members in
    /// written case.
    pub edge_columns: Vec<(String, String)>,
    pub column_attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeColumns {
    pub role: ColumnRole,
    pub edge_info: Option<EdgeInfo>,
}

/// Process-scoped graph schema metadata, immutable after `load`.
#[derive(Debug, Clone, Default)]
pub struct GraphMetaData {
    columns_of_node_tables: IndexMap<TableKey, IndexMap<IdentKey, NodeColumns>>,
    node_view_mapping: IndexMap<TableKey, IndexSet<IdentKey>>,
    /// Written-case names as first seen in the catalog, for emitted SQL.
    canonical_names: IndexMap<TableKey, ObjectName>,
}

/// The single union-all metadata probe. Role tags the row kind; rows
/// arrive in ascending column id so edge-view members are loaded before
/// the views that union them.
pub fn metadata_probe_sql() -> String {
    format!(
        "SELECT NC.ColumnRole AS Role, NC.TableSchema, NC.TableName, NC.ColumnName, \
         NC.Reference, NC.ColumnId \
         FROM [dbo].[{node_columns}] AS NC \
         UNION ALL \
         SELECT {attr_role}, EA.TableSchema, EA.TableName, EA.ColumnName, EA.AttributeName, \
         EA.AttributeId \
         FROM [dbo].[{edge_attrs}] AS EA \
         UNION ALL \
         SELECT {node_view_role}, NT.TableSchema, NV.TableName, NULL, MT.TableName, \
         NV.NodeViewTableId \
         FROM [dbo].[{node_views}] AS NV \
         JOIN [dbo].[{node_tables}] AS NT ON NV.NodeViewTableId = NT.TableId \
         JOIN [dbo].[{node_tables}] AS MT ON NV.TableId = MT.TableId \
         UNION ALL \
         SELECT {edge_view_role}, VC.TableSchema, VC.TableName, VC.ColumnName, \
         MC.TableName + '.' + MC.ColumnName, EV.NodeViewColumnId \
         FROM [dbo].[{edge_views}] AS EV \
         JOIN [dbo].[{node_columns}] AS VC ON EV.NodeViewColumnId = VC.ColumnId \
         JOIN [dbo].[{node_columns}] AS MC ON EV.ColumnId = MC.ColumnId \
         ORDER BY ColumnId",
        node_columns = NODE_TABLE_COLUMN_CATALOG,
        edge_attrs = EDGE_ATTRIBUTE_CATALOG,
        node_views = NODE_VIEW_CATALOG,
        node_tables = NODE_TABLE_CATALOG,
        edge_views = EDGE_VIEW_CATALOG,
        attr_role = ROLE_EDGE_ATTRIBUTE,
        node_view_role = ROLE_NODE_VIEW_MEMBER,
        edge_view_role = ROLE_EDGE_VIEW_MEMBER,
    )
}

impl GraphMetaData {
    /// Loads the full schema in one probe. Failure here is fatal for the
    /// planner instance.
    pub fn load<P: CatalogProbe>(probe: &P) -> Result<GraphMetaData, GraphCatalogError> {
        let sql = metadata_probe_sql();
        let rows = probe.metadata_rows(&sql)?;
        let metadata = Self::from_rows(rows)?;
        info!(
            node_tables = metadata.columns_of_node_tables.len(),
            node_views = metadata.node_view_mapping.len(),
            "graph metadata loaded"
        );
        Ok(metadata)
    }

    /// Builds metadata from probe rows, which must be in emitted order.
    pub fn from_rows(rows: Vec<MetadataRow>) -> Result<GraphMetaData, GraphCatalogError> {
        let mut metadata = GraphMetaData::default();
        for row in rows {
            match row.role {
                ROLE_EDGE_ATTRIBUTE => metadata.load_edge_attribute(row)?,
                ROLE_NODE_VIEW_MEMBER => metadata.load_node_view_member(row),
                ROLE_EDGE_VIEW_MEMBER => metadata.load_edge_view_member(row)?,
                code => metadata.load_node_column(code, row)?,
            }
        }
        Ok(metadata)
    }

    fn load_node_column(&mut self, code: i32, row: MetadataRow) -> Result<(), GraphCatalogError> {
        let column_name = row.column_name.clone().unwrap_or_default();
        let role =
            ColumnRole::from_code(code).ok_or_else(|| GraphCatalogError::UnknownColumnRole {
                code,
                table: row.table_name.clone(),
                column: column_name.clone(),
            })?;

        let table_key = self.register_table(&row.table_schema, &row.table_name);
        let columns = self.columns_of_node_tables.entry(table_key).or_default();
        let entry = columns
            .entry(IdentKey::new(&column_name))
            .or_insert_with(|| NodeColumns {
                role,
                edge_info: if role.is_edge() {
                    Some(EdgeInfo::default())
                } else {
                    None
                },
            });

        // an edge column arrives once per declared sink
        if role.is_edge() {
            if let (Some(info), Some(sink)) = (entry.edge_info.as_mut(), row.reference) {
                info.sink_nodes.insert(IdentKey::new(&sink));
            }
        }
        Ok(())
    }

    fn load_edge_attribute(&mut self, row: MetadataRow) -> Result<(), GraphCatalogError> {
        let column_name = row.column_name.clone().unwrap_or_default();
        let attribute = row.reference.clone().unwrap_or_default();
        let table_key = TableKey::new(&row.table_schema, &row.table_name);

        let info = self
            .columns_of_node_tables
            .get_mut(&table_key)
            .and_then(|columns| columns.get_mut(&IdentKey::new(&column_name)))
            .and_then(|entry| entry.edge_info.as_mut())
            .ok_or_else(|| GraphCatalogError::AttributeOnUnknownEdge {
                attribute: attribute.clone(),
                table: row.table_name.clone(),
                column: column_name,
            })?;
        info.column_attributes.push(attribute);
        Ok(())
    }

    fn register_table(&mut self, schema: &str, table: &str) -> TableKey {
        let key = TableKey::new(schema, table);
        self.canonical_names
            .entry(key.clone())
            .or_insert_with(|| ObjectName::qualified(schema, table));
        key
    }

    fn load_node_view_member(&mut self, row: MetadataRow) {
        let view_key = self.register_table(&row.table_schema, &row.table_name);
        let member = IdentKey::new(&row.reference.unwrap_or_default());
        self.node_view_mapping
            .entry(view_key)
            .or_default()
            .insert(member);
    }

    fn load_edge_view_member(&mut self, row: MetadataRow) -> Result<(), GraphCatalogError> {
        let view_column = row.column_name.clone().unwrap_or_default();
        let member = row.reference.clone().unwrap_or_default();
        let (member_table, member_column) =
            member
                .split_once('.')
                .ok_or_else(|| GraphCatalogError::MalformedEdgeViewMember {
                    member: member.clone(),
                })?;

        let member_key = TableKey::new(&row.table_schema, member_table);
        let member_info = self
            .columns_of_node_tables
            .get(&member_key)
            .and_then(|columns| columns.get(&IdentKey::new(member_column)))
            .and_then(|entry| entry.edge_info.as_ref())
            .ok_or_else(|| GraphCatalogError::UnknownEdgeViewMember {
                view_column: view_column.clone(),
                member: member.clone(),
            })?;
        // members are loaded by now thanks to the probe's column id order;
        // the first declared sink of the member is the one carried up
        let member_sink = member_info.sink_nodes.first().cloned();

        let view_key = self.register_table(&row.table_schema, &row.table_name);
        let columns = self.columns_of_node_tables.entry(view_key).or_default();
        let entry = columns
            .entry(IdentKey::new(&view_column))
            .or_insert_with(|| NodeColumns {
                role: ColumnRole::EdgeView,
                edge_info: Some(EdgeInfo::default()),
            });
        if let Some(info) = entry.edge_info.as_mut() {
            info.edge_columns
                .push((member_table.to_string(), member_column.to_string()));
            if let Some(sink) = member_sink {
                info.sink_nodes.insert(sink);
            }
        }
        Ok(())
    }

    pub fn is_node_table(&self, key: &TableKey) -> bool {
        self.columns_of_node_tables.contains_key(key)
    }

    pub fn is_node_view(&self, key: &TableKey) -> bool {
        self.node_view_mapping.contains_key(key)
    }

    pub fn node_table_columns(&self, key: &TableKey) -> Option<&IndexMap<IdentKey, NodeColumns>> {
        self.columns_of_node_tables.get(key)
    }

    pub fn view_members(&self, key: &TableKey) -> Option<&IndexSet<IdentKey>> {
        self.node_view_mapping.get(key)
    }

    /// The concrete node tables behind `key`: the table itself, or the
    /// members of the view it names.
    pub fn concrete_tables(&self, key: &TableKey) -> Vec<TableKey> {
        if let Some(members) = self.node_view_mapping.get(key) {
            members
                .iter()
                .map(|member| TableKey {
                    schema: key.schema.clone(),
                    table: member.clone(),
                })
                .collect()
        } else if self.is_node_table(key) {
            vec![key.clone()]
        } else {
            Vec::new()
        }
    }

    /// The written-case name of a catalog table or view, for emitted SQL.
    pub fn canonical_object(&self, key: &TableKey) -> Option<&ObjectName> {
        self.canonical_names.get(key)
    }

    pub fn edge_info(&self, table: &TableKey, column: &IdentKey) -> Option<&EdgeInfo> {
        self.columns_of_node_tables
            .get(table)?
            .get(column)
            .filter(|entry| entry.role.is_edge())?
            .edge_info
            .as_ref()
    }

    /// Resolves which table actually declares `edge` when the pattern
    /// binds it through `source` — the table itself, or one of the view's
    /// members.
    pub fn resolve_edge_binding(
        &self,
        source: &TableKey,
        edge: &IdentKey,
    ) -> Option<(TableKey, &EdgeInfo)> {
        if let Some(info) = self.edge_info(source, edge) {
            return Some((source.clone(), info));
        }
        for concrete in self.concrete_tables(source) {
            if let Some(info) = self.edge_info(&concrete, edge) {
                return Some((concrete, info));
            }
        }
        None
    }
}
