pub mod ast;
mod common;
pub(crate) mod errors;
mod expression;
mod match_clause;
mod select_query;

pub use errors::ParseError;

use ast::SelectQueryBlock;

fn error_context(input: &str) -> String {
    input.chars().take(40).collect()
}

/// Parses one graph-extended SELECT query block. A trailing semicolon is
/// allowed; anything else left over is an error.
pub fn parse_query(input: &str) -> Result<SelectQueryBlock, ParseError> {
    match select_query::parse_select_query_block(input) {
        Ok((rest, query)) => {
            let rest = rest.trim().trim_end_matches(';').trim();
            if rest.is_empty() {
                Ok(query)
            } else {
                Err(ParseError::TrailingInput {
                    trailing: error_context(rest),
                })
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ParseError::Syntax {
            near: error_context(e.input),
        }),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::Syntax {
            near: String::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_accepts_semicolon() {
        assert!(parse_query("SELECT * FROM Employee AS a;").is_ok());
    }

    #[test]
    fn test_parse_query_rejects_trailing_garbage() {
        let err = parse_query("SELECT * FROM Employee AS a nonsense ^^").unwrap_err();
        assert!(matches!(err, ParseError::TrailingInput { .. }));
    }
}
