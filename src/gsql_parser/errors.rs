use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("Failed to parse query near `{near}`.")]
    Syntax { near: String },
    #[error("Unexpected trailing input `{trailing}`.")]
    TrailingInput { trailing: String },
}
