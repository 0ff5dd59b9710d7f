use nom::{
    IResult, Parser,
    branch::alt,
    character::complete::{char, multispace0},
    combinator::{map, opt},
    multi::separated_list1,
    sequence::{preceded, terminated},
};

use super::ast::{
    NamedTableRef, SelectItem, SelectQueryBlock, TableReference,
};
use super::common::{comma, keyword, parse_identifier, parse_object_name, ws};
use super::expression::parse_expression;
use super::match_clause::parse_match_clause;

/// `SELECT items FROM tables [MATCH pattern] [WHERE predicate]`
pub fn parse_select_query_block(input: &str) -> IResult<&str, SelectQueryBlock> {
    let (input, _) = multispace0.parse(input)?;
    let (input, _) = ws(keyword("SELECT")).parse(input)?;
    let (input, select_items) = separated_list1(comma, parse_select_item).parse(input)?;

    let (input, _) = ws(keyword("FROM")).parse(input)?;
    let (input, from_clause) = separated_list1(comma, parse_table_reference).parse(input)?;

    let (input, match_clause) = opt(parse_match_clause).parse(input)?;
    let (input, where_clause) =
        opt(preceded(ws(keyword("WHERE")), parse_expression)).parse(input)?;

    Ok((
        input,
        SelectQueryBlock {
            select_items,
            from_clause,
            match_clause,
            where_clause,
        },
    ))
}

fn parse_select_item(input: &str) -> IResult<&str, SelectItem> {
    alt((
        parse_qualified_star,
        map(ws(char('*')), |_| SelectItem::Star),
        parse_expression_item,
    ))
    .parse(input)
}

fn parse_qualified_star(input: &str) -> IResult<&str, SelectItem> {
    let (input, qualifier) = ws(parse_identifier).parse(input)?;
    let (input, _) = char('.')(input)?;
    let (input, _) = char('*')(input)?;
    Ok((input, SelectItem::QualifiedStar { qualifier }))
}

fn parse_expression_item(input: &str) -> IResult<&str, SelectItem> {
    let (input, expression) = ws(parse_expression).parse(input)?;
    let (input, column_alias) =
        opt(preceded(ws(keyword("AS")), ws(parse_identifier))).parse(input)?;
    Ok((
        input,
        SelectItem::Expr {
            expression,
            column_alias,
        },
    ))
}

/// `[schema.]table [[AS] alias]` — join trees are planner output, not
/// parser input.
fn parse_table_reference(input: &str) -> IResult<&str, TableReference> {
    let (input, object) = ws(parse_object_name).parse(input)?;
    let (input, alias) = opt(alt((
        preceded(ws(keyword("AS")), ws(parse_identifier)),
        terminated(ws(parse_identifier), multispace0),
    )))
    .parse(input)?;
    Ok((
        input,
        TableReference::Named(NamedTableRef { object, alias }),
    ))
}
