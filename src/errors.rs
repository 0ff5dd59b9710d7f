use thiserror::Error;

use crate::graph_catalog::errors::GraphCatalogError;
use crate::gsql_parser::ParseError;
use crate::query_planner::errors::QueryPlannerError;

/// Top-level error of the crate. `Display` is the single user-visible
/// message; there are no machine-readable codes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SangamError {
    #[error("ParseError: {0}")]
    Parse(#[from] ParseError),
    #[error("GraphCatalogError: {0}")]
    Catalog(#[from] GraphCatalogError),
    #[error("QueryPlannerError: {0}")]
    Planner(#[from] QueryPlannerError),
}
