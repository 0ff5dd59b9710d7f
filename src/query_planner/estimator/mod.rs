pub mod histogram;
pub mod probe_sql;

use indexmap::IndexMap;
use tracing::warn;

use crate::graph_catalog::catalog_probe::CatalogProbe;
use crate::graph_catalog::graph_metadata::GraphMetaData;
use crate::graph_catalog::ident::{IdentKey, TableKey};
use crate::query_planner::config::PlannerConfig;
use crate::query_planner::errors::EstimatorError;
use crate::query_planner::match_graph::MatchGraph;

use histogram::{collapse_to_ranges, decode_sink_blob, merge_histograms, update_edge_histogram};
use probe_sql::{density_sql, edge_degree_sql, node_estimate_sql, EdgeProbeMember, NodeProbeSelect};

/// Back-annotates the pattern with statistics from three catalog probes:
/// per-node row estimates, per-edge degree and sink histogram, per-table
/// key density.
pub struct CardinalityEstimator<'a, P: CatalogProbe> {
    probe: &'a P,
    metadata: &'a GraphMetaData,
    config: &'a PlannerConfig,
}

impl<'a, P: CatalogProbe> CardinalityEstimator<'a, P> {
    pub fn new(probe: &'a P, metadata: &'a GraphMetaData, config: &'a PlannerConfig) -> Self {
        CardinalityEstimator {
            probe,
            metadata,
            config,
        }
    }

    pub fn annotate(&self, graph: &mut MatchGraph) -> Result<(), EstimatorError> {
        self.annotate_node_rows(graph)?;
        self.annotate_densities(graph)?;
        self.annotate_edge_statistics(graph)?;
        Ok(())
    }

    /// One batched union-all; a node over a view contributes one select
    /// per member table and its estimate is the sum over members.
    fn annotate_node_rows(&self, graph: &mut MatchGraph) -> Result<(), EstimatorError> {
        let mut selects: Vec<NodeProbeSelect> = Vec::new();
        for node in &graph.nodes {
            let key = TableKey::from_object(&node.table);
            let concrete = self.metadata.concrete_tables(&key);
            if concrete.is_empty() {
                selects.push(NodeProbeSelect {
                    alias: node.alias.clone(),
                    table: node.table.clone(),
                    predicates: node.predicates.clone(),
                });
                continue;
            }
            for table_key in concrete {
                let table = self
                    .metadata
                    .canonical_object(&table_key)
                    .cloned()
                    .unwrap_or_else(|| node.table.clone());
                selects.push(NodeProbeSelect {
                    alias: node.alias.clone(),
                    table,
                    predicates: node.predicates.clone(),
                });
            }
        }

        let sql = node_estimate_sql(&selects);
        let rows = self.probe.node_estimates(&sql)?;

        let mut sums: IndexMap<IdentKey, f64> = IndexMap::new();
        for row in rows {
            *sums.entry(IdentKey::new(&row.table_alias)).or_insert(0.0) += row.estimated_rows;
        }
        for node in &mut graph.nodes {
            match sums.get(&IdentKey::new(&node.alias)) {
                Some(&estimated) => node.estimated_rows = estimated.max(1.0),
                None => {
                    warn!(alias = %node.alias, "no row estimate returned; assuming one row");
                    node.estimated_rows = 1.0;
                }
            }
        }
        Ok(())
    }

    /// DBCC density per concrete table; a view's density is the
    /// rows-weighted mean over its members and its row count the sum.
    fn annotate_densities(&self, graph: &mut MatchGraph) -> Result<(), EstimatorError> {
        let per_node_tables: Vec<Vec<TableKey>> = graph
            .nodes
            .iter()
            .map(|node| {
                let key = TableKey::from_object(&node.table);
                let concrete = self.metadata.concrete_tables(&key);
                if concrete.is_empty() {
                    vec![key]
                } else {
                    concrete
                }
            })
            .collect();

        let mut cache: IndexMap<TableKey, Option<(f64, f64)>> = IndexMap::new();
        for tables in &per_node_tables {
            for table_key in tables {
                if cache.contains_key(table_key) {
                    continue;
                }
                let object = self
                    .metadata
                    .canonical_object(table_key)
                    .cloned()
                    .unwrap_or_else(|| {
                        crate::gsql_parser::ast::ObjectName::qualified(
                            table_key.schema.as_str(),
                            table_key.table.as_str(),
                        )
                    });
                let rows = self.probe.key_densities(&density_sql(&object))?;
                let matching = rows.into_iter().find(|row| {
                    TableKey::new(&row.table_schema, &row.table_name) == *table_key
                });
                cache.insert(
                    table_key.clone(),
                    matching.map(|row| (row.key_density, row.table_rows)),
                );
            }
        }

        for (node, tables) in graph.nodes.iter_mut().zip(per_node_tables) {
            let mut total_rows = 0.0;
            let mut weighted_density = 0.0;
            for table_key in &tables {
                let Some(Some((density, rows))) = cache.get(table_key) else {
                    warn!(table = %table_key, "no key density statistics; using default");
                    continue;
                };
                let density = if *density <= 0.0 || *density >= 1.0 {
                    // a density of exactly 1.0 means the host had nothing
                    self.config.default_density
                } else {
                    *density
                };
                total_rows += rows;
                weighted_density += density * rows;
            }
            if total_rows > 0.0 {
                node.table_row_count = total_rows;
                node.node_id_density = weighted_density / total_rows;
            } else {
                node.table_row_count = node.estimated_rows;
                node.node_id_density = self.config.default_density;
            }
        }
        Ok(())
    }

    /// Per-edge sampling probe. Edge views union one select per member
    /// edge; member samples merge into one histogram and a sample-size
    /// weighted degree, scaled by decoded ids over sample rows.
    fn annotate_edge_statistics(&self, graph: &mut MatchGraph) -> Result<(), EstimatorError> {
        for index in 0..graph.edges.len() {
            let (sql, alias_key) = {
                let edge = &graph.edges[index];
                let bound_key = TableKey::from_object(&edge.bound_table);
                let edge_key = IdentKey::new(&edge.edge_column);
                let schema = edge.bound_table.schema_or_default().to_string();

                let members: Vec<EdgeProbeMember> = match self
                    .metadata
                    .edge_info(&bound_key, &edge_key)
                {
                    Some(info) if !info.edge_columns.is_empty() => info
                        .edge_columns
                        .iter()
                        .map(|(table, column)| EdgeProbeMember {
                            schema: schema.clone(),
                            table: table.clone(),
                            edge_column: column.clone(),
                        })
                        .collect(),
                    _ => vec![EdgeProbeMember {
                        schema,
                        table: edge.bound_table.base.clone(),
                        edge_column: edge.edge_column.clone(),
                    }],
                };
                (
                    edge_degree_sql(&edge.alias, &members, &edge.predicates),
                    IdentKey::new(&edge.alias),
                )
            };

            let rows = self.probe.edge_degrees(&sql)?;
            let matching: Vec<_> = rows
                .into_iter()
                .filter(|row| IdentKey::new(&row.edge_alias) == alias_key)
                .collect();
            if matching.is_empty() {
                warn!(edge = %alias_key, "no degree statistics returned; keeping defaults");
                continue;
            }

            let mut histogram = IndexMap::new();
            let mut total_ids = 0usize;
            let mut total_samples = 0i64;
            let mut weighted_degree = 0.0;
            for row in &matching {
                let ids = decode_sink_blob(&row.sink_sample).ok_or_else(|| {
                    EstimatorError::MalformedSinkSample {
                        edge: alias_key.to_string(),
                        length: row.sink_sample.len(),
                    }
                })?;
                if row.sample_row_count == 0 {
                    warn!(edge = %alias_key, "degree sample is empty");
                }
                let mut member_histogram = IndexMap::new();
                update_edge_histogram(&mut member_histogram, &ids);
                merge_histograms(&mut histogram, &member_histogram);
                total_ids += ids.len();
                total_samples += row.sample_row_count;
                weighted_degree += row.average_degree * row.sample_row_count as f64;
            }

            let base_degree = if total_samples > 0 {
                weighted_degree / total_samples as f64
            } else {
                1.0
            };
            let scale = if total_samples > 0 {
                total_ids as f64 / total_samples as f64
            } else {
                1.0
            };

            let distinct = histogram.len();
            let stats = &mut graph.edges[index].statistics;
            stats.average_degree = base_degree * scale;
            stats.row_count = total_samples as f64;
            stats.max_value = histogram.keys().copied().max().unwrap_or(0);
            stats.density = if distinct > 0 {
                1.0 / distinct as f64
            } else {
                1.0
            };
            stats.histogram = collapse_to_ranges(histogram, self.config.histogram_bucket_cap);
        }
        Ok(())
    }
}
