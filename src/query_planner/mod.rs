pub mod config;
pub mod emitter;
pub mod errors;
pub mod estimator;
pub(crate) mod expr_visitor;
pub mod join_order;
pub mod match_graph;
pub mod predicate_attachment;
pub mod scope;
pub mod validator;

#[cfg(test)]
mod tests;

use crate::graph_catalog::catalog_probe::CatalogProbe;
use crate::graph_catalog::graph_metadata::GraphMetaData;
use crate::gsql_parser::ast::SelectQueryBlock;

use config::PlannerConfig;
use emitter::Emitter;
use errors::QueryPlannerError;
use estimator::CardinalityEstimator;
use join_order::JoinOrderPlanner;
use match_graph::pattern_builder::build_match_graph;
use scope::ScopeChain;

/// Cost-based planner for one query block's MATCH clause. Holds the
/// process-wide catalog metadata and a probe handle; each `plan` call
/// owns its pattern graph and search states exclusively.
pub struct MatchPlanner<'a, P: CatalogProbe> {
    metadata: &'a GraphMetaData,
    probe: &'a P,
    config: PlannerConfig,
}

impl<'a, P: CatalogProbe> MatchPlanner<'a, P> {
    pub fn new(metadata: &'a GraphMetaData, probe: &'a P) -> Self {
        Self::with_config(metadata, probe, PlannerConfig::default())
    }

    pub fn with_config(metadata: &'a GraphMetaData, probe: &'a P, config: PlannerConfig) -> Self {
        MatchPlanner {
            metadata,
            probe,
            config,
        }
    }

    /// Rewrites the block in place: FROM receives the chosen join trees,
    /// WHERE the derived predicates, and MATCH is cleared. A block
    /// without MATCH is left untouched, so planning is idempotent.
    pub fn plan(
        &self,
        query: &mut SelectQueryBlock,
        scopes: &ScopeChain,
    ) -> Result<(), QueryPlannerError> {
        let Some(match_clause) = query.match_clause.clone() else {
            return Ok(());
        };

        validator::validate_match_clause(query, &match_clause, self.metadata, scopes)?;
        let mut graph = build_match_graph(query, &match_clause, self.metadata, scopes)?;
        predicate_attachment::attach_predicates(query, &mut graph, self.metadata);
        CardinalityEstimator::new(self.probe, self.metadata, &self.config)
            .annotate(&mut graph)?;
        let chosen = JoinOrderPlanner::new(&graph, &self.config).plan()?;
        Emitter::new(&graph).emit(query, chosen)?;
        Ok(())
    }
}
