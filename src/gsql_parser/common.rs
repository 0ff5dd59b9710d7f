use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{map, not, peek, recognize, verify},
    error::ParseError,
    multi::many0,
    sequence::{delimited, pair, terminated},
};

use super::ast::ObjectName;

const RESERVED_WORDS: &[&str] = &[
    "select", "from", "where", "match", "as", "and", "or", "not", "null", "is", "like", "in",
    "join", "on", "inner", "left", "outer", "true", "false", "with",
];

pub fn ws<'a, O, E: ParseError<&'a str>, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
{
    delimited(multispace0, inner, multispace0)
}

fn underscore1(input: &str) -> IResult<&str, &str> {
    take_while1(|c| c == '_')(input)
}

fn bare_identifier(input: &str) -> IResult<&str, &str> {
    verify(
        recognize(pair(
            alt((alpha1, underscore1)),
            many0(alt((alphanumeric1, underscore1))),
        )),
        |word: &str| !RESERVED_WORDS.contains(&word.to_ascii_lowercase().as_str()),
    )
    .parse(input)
}

fn bracketed_identifier(input: &str) -> IResult<&str, &str> {
    delimited(char('['), take_while1(|c| c != ']'), char(']')).parse(input)
}

/// A bare or `[bracketed]` identifier, returned without brackets.
pub fn parse_identifier(input: &str) -> IResult<&str, String> {
    map(alt((bracketed_identifier, bare_identifier)), |name| {
        name.to_string()
    })
    .parse(input)
}

/// `name` or `schema.name`, each part bare or bracketed.
pub fn parse_object_name(input: &str) -> IResult<&str, ObjectName> {
    let (input, first) = parse_identifier(input)?;
    let (input, second) = nom::combinator::opt((char('.'), parse_identifier)).parse(input)?;
    let object = match second {
        Some((_, base)) => ObjectName::qualified(first, base),
        None => ObjectName::bare(first),
    };
    Ok((input, object))
}

/// A case-insensitive keyword that is not a prefix of a longer word.
pub fn keyword<'a>(
    word: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(
        nom::bytes::complete::tag_no_case(word),
        not(peek(alt((alphanumeric1, underscore1)))),
    )
}

pub fn comma(input: &str) -> IResult<&str, char> {
    ws(char(',')).parse(input)
}
