use thiserror::Error;

/// I/O-level failure from the catalog collaborator. The host message is
/// carried through untouched.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProbeError {
    #[error("Catalog probe failed: {message}")]
    Io { message: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphCatalogError {
    #[error("ProbeError: {0}")]
    Probe(#[from] ProbeError),

    #[error("Unknown column role code {code} for `{table}`.`{column}`.")]
    UnknownColumnRole {
        code: i32,
        table: String,
        column: String,
    },

    #[error("Edge attribute `{attribute}` references unknown edge `{table}`.`{column}`.")]
    AttributeOnUnknownEdge {
        attribute: String,
        table: String,
        column: String,
    },

    #[error("Edge view `{view_column}` references unknown member edge `{member}`.")]
    UnknownEdgeViewMember { view_column: String, member: String },

    #[error("Edge view member reference `{member}` is not of the form `table.column`.")]
    MalformedEdgeViewMember { member: String },
}
