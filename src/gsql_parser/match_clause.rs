use nom::{
    IResult, Parser,
    character::complete::{char, digit1},
    combinator::{map, opt},
    multi::{many1, separated_list0, separated_list1},
    sequence::{delimited, preceded, separated_pair},
};

use super::ast::{EdgePattern, Literal, MatchClause, MatchPathExpr, MatchStep};
use super::common::{comma, keyword, parse_identifier, ws};
use super::expression::parse_literal_value;

/// `MATCH a-[Colleagues]->b, c-[Knows AS e *1..3 {weight: 5}]->d`
pub fn parse_match_clause(input: &str) -> IResult<&str, MatchClause> {
    let (input, _) = ws(keyword("MATCH")).parse(input)?;
    let (input, paths) = separated_list1(comma, parse_match_path).parse(input)?;
    Ok((input, MatchClause { paths }))
}

fn parse_match_path(input: &str) -> IResult<&str, MatchPathExpr> {
    let (input, first_alias) = ws(parse_identifier).parse(input)?;
    let (input, hops) = many1((parse_edge_pattern, ws(parse_identifier))).parse(input)?;

    let mut steps = Vec::new();
    let mut node_alias = first_alias;
    let mut tail_alias = String::new();
    for (edge, next_alias) in hops {
        steps.push(MatchStep {
            node_alias: std::mem::replace(&mut node_alias, next_alias.clone()),
            edge,
        });
        tail_alias = next_alias;
    }

    Ok((input, MatchPathExpr { steps, tail_alias }))
}

/// `-[EdgeColumn [AS alias] [*min..max] [{attr: literal}]]->`
fn parse_edge_pattern(input: &str) -> IResult<&str, EdgePattern> {
    let (input, _) = ws(char('-')).parse(input)?;
    let (input, edge) = delimited(char('['), parse_edge_body, char(']')).parse(input)?;
    let (input, _) = ws(char('-')).parse(input)?;
    let (input, _) = char('>')(input)?;
    Ok((input, edge))
}

fn parse_edge_body(input: &str) -> IResult<&str, EdgePattern> {
    let (input, edge_column) = ws(parse_identifier).parse(input)?;
    let (input, alias) =
        opt(preceded(ws(keyword("AS")), ws(parse_identifier))).parse(input)?;
    let (input, length) = opt(parse_length_spec).parse(input)?;
    let (input, attributes) = opt(parse_edge_attributes).parse(input)?;

    let (min_length, max_length) = length.unwrap_or((1, Some(1)));
    Ok((
        input,
        EdgePattern {
            edge_column,
            alias,
            min_length,
            max_length,
            attributes: attributes.unwrap_or_default(),
        },
    ))
}

/// `*`, `*2`, `*1..3`, `*2..` — a bare star is one-to-unbounded.
fn parse_length_spec(input: &str) -> IResult<&str, (u32, Option<u32>)> {
    let (input, _) = ws(char('*')).parse(input)?;
    let (input, min) = opt(ws(parse_u32)).parse(input)?;
    let (input, range) = opt(preceded(
        (char('.'), char('.')),
        opt(ws(parse_u32)),
    ))
    .parse(input)?;

    let spec = match (min, range) {
        // `*n..m` / `*n..`
        (Some(min), Some(max)) => (min, max),
        // `*n` — exactly n hops
        (Some(min), None) => (min, Some(min)),
        // `*..m`
        (None, Some(max)) => (1, max),
        // bare `*`
        (None, None) => (1, None),
    };
    Ok((input, spec))
}

fn parse_u32(input: &str) -> IResult<&str, u32> {
    map(digit1, |digits: &str| digits.parse().unwrap_or(u32::MAX)).parse(input)
}

fn parse_edge_attributes(input: &str) -> IResult<&str, Vec<(String, Literal)>> {
    delimited(
        ws(char('{')),
        separated_list0(
            ws(char(',')),
            separated_pair(ws(parse_identifier), char(':'), ws(parse_literal_value)),
        ),
        ws(char('}')),
    )
    .parse(input)
}
