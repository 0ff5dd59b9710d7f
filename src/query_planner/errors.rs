use std::fmt::Display;

use thiserror::Error;

use crate::graph_catalog::errors::{GraphCatalogError, ProbeError};

/// The pipeline stage an error came out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Validation,
    PatternConstruction,
    PredicateAttachment,
    CardinalityEstimation,
    JoinOrderSelection,
    Emission,
}

impl Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pass::Validation => write!(f, "Validation"),
            Pass::PatternConstruction => write!(f, "PatternConstruction"),
            Pass::PredicateAttachment => write!(f, "PredicateAttachment"),
            Pass::CardinalityEstimation => write!(f, "CardinalityEstimation"),
            Pass::JoinOrderSelection => write!(f, "JoinOrderSelection"),
            Pass::Emission => write!(f, "Emission"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Alias `{alias}` in MATCH is not bound to a table in FROM.")]
    UnboundNodeAlias { alias: String },

    #[error("Table `{table}` bound to alias `{alias}` is not a node table.")]
    NotANodeTable { alias: String, table: String },

    #[error("Edge column `{edge}` does not exist on node table `{table}`.")]
    UnknownEdgeColumn { edge: String, table: String },

    #[error("Edge `{edge}` cannot bind any source/sink node table pair.")]
    UnbindableEdge { edge: String },

    #[error("Invalid path length range {min}..{max} on edge `{edge}`.")]
    InvalidPathLength { edge: String, min: u32, max: u32 },

    #[error("Edge `{edge}` declares sink `{sink}` which is not a node table.")]
    UnknownSinkTable { edge: String, sink: String },

    #[error("Node `{node}` cannot be a sink of edge `{edge}`.")]
    WrongSinkTable { edge: String, node: String },

    #[error("Parameter `@{name}` is not declared in any enclosing scope.")]
    UndeclaredParameter { name: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PatternError {
    #[error("Alias `{alias}` in MATCH is not bound to a table in FROM.")]
    UnboundAlias { alias: String },

    #[error("Duplicate alias `{alias}` in MATCH pattern.")]
    DuplicateAlias { alias: String },

    #[error("Edge `{edge}` has no resolvable node table binding.")]
    UnresolvedEdgeBinding { edge: String },

    #[error("Ambiguous edge reference `{name}`; more than one unnamed `{name}` edge exists.")]
    AmbiguousEdgeReference { name: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EstimatorError {
    #[error("ProbeError: {0}")]
    Probe(#[from] ProbeError),

    #[error("Malformed sink sample for edge `{edge}`: {length} bytes is not a whole number of ids.")]
    MalformedSinkSample { edge: String, length: usize },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum JoinOrderError {
    #[error("No admissible initial state for pattern component {component}.")]
    NoInitialState { component: usize },

    #[error("No complete join order found for pattern component {component}.")]
    NoCompletePlan { component: usize },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EmitterError {
    #[error("Chosen plan for component {component} carries no join tree.")]
    MissingJoinTree { component: usize },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryPlannerError {
    #[error("{pass}: {source}")]
    Validation {
        pass: Pass,
        #[source]
        source: ValidationError,
    },

    #[error("{pass}: {source}")]
    Pattern {
        pass: Pass,
        #[source]
        source: PatternError,
    },

    #[error("{pass}: {source}")]
    Estimator {
        pass: Pass,
        #[source]
        source: EstimatorError,
    },

    #[error("{pass}: {source}")]
    JoinOrder {
        pass: Pass,
        #[source]
        source: JoinOrderError,
    },

    #[error("{pass}: {source}")]
    Emitter {
        pass: Pass,
        #[source]
        source: EmitterError,
    },

    #[error("GraphCatalogError: {0}")]
    Catalog(#[from] GraphCatalogError),
}

impl QueryPlannerError {
    /// The stage that failed; `None` for infrastructure errors.
    pub fn pass(&self) -> Option<Pass> {
        match self {
            QueryPlannerError::Validation { pass, .. }
            | QueryPlannerError::Pattern { pass, .. }
            | QueryPlannerError::Estimator { pass, .. }
            | QueryPlannerError::JoinOrder { pass, .. }
            | QueryPlannerError::Emitter { pass, .. } => Some(*pass),
            QueryPlannerError::Catalog(_) => None,
        }
    }
}

impl From<ValidationError> for QueryPlannerError {
    fn from(source: ValidationError) -> Self {
        QueryPlannerError::Validation {
            pass: Pass::Validation,
            source,
        }
    }
}

impl From<PatternError> for QueryPlannerError {
    fn from(source: PatternError) -> Self {
        QueryPlannerError::Pattern {
            pass: Pass::PatternConstruction,
            source,
        }
    }
}

impl From<EstimatorError> for QueryPlannerError {
    fn from(source: EstimatorError) -> Self {
        QueryPlannerError::Estimator {
            pass: Pass::CardinalityEstimation,
            source,
        }
    }
}

impl From<JoinOrderError> for QueryPlannerError {
    fn from(source: JoinOrderError) -> Self {
        QueryPlannerError::JoinOrder {
            pass: Pass::JoinOrderSelection,
            source,
        }
    }
}

impl From<EmitterError> for QueryPlannerError {
    fn from(source: EmitterError) -> Self {
        QueryPlannerError::Emitter {
            pass: Pass::Emission,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_errors_carry_their_pass() {
        let err = QueryPlannerError::from(ValidationError::UnbindableEdge {
            edge: "Colleagues".to_string(),
        });
        assert_eq!(err.pass(), Some(Pass::Validation));
        assert!(err.to_string().starts_with("Validation:"));

        let err = QueryPlannerError::from(JoinOrderError::NoInitialState { component: 0 });
        assert_eq!(err.pass(), Some(Pass::JoinOrderSelection));
        assert!(err.to_string().starts_with("JoinOrderSelection:"));
    }

    #[test]
    fn test_infrastructure_errors_have_no_pass() {
        let err = QueryPlannerError::Catalog(GraphCatalogError::Probe(ProbeError::Io {
            message: "connection severed".to_string(),
        }));
        assert_eq!(err.pass(), None);
    }
}
