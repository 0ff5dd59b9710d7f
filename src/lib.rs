//! Sangam - cost-based MATCH planner for graph-extended SQL
//!
//! This crate rewrites the graph-pattern MATCH clause of a SELECT query
//! block into plain relational form:
//! - Graph schema metadata loaded once from the host catalog
//! - Pattern validation and construction over node tables, edge columns
//!   and views
//! - Statistics-driven cardinality estimation through catalog probes
//! - Dynamic-programming join-order search with beam pruning
//! - In-place AST emission of the chosen join trees

pub mod errors;
pub mod graph_catalog;
pub mod gsql_parser;
pub mod query_planner;

pub use errors::SangamError;
pub use graph_catalog::{CatalogProbe, GraphMetaData};
pub use gsql_parser::parse_query;
pub use query_planner::config::PlannerConfig;
pub use query_planner::scope::{ScopeChain, ScopeFrame};
pub use query_planner::MatchPlanner;
