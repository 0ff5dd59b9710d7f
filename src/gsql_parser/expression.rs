use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_until},
    character::complete::{char, digit1},
    combinator::{map, opt, recognize},
    multi::separated_list0,
    sequence::{delimited, preceded},
};

use super::ast::{
    ColumnRef, Expression, FunctionCall, Literal, Operator, OperatorApplication,
};
use super::common::{self, keyword, ws};

pub fn parse_expression(input: &str) -> IResult<&str, Expression> {
    parse_logical_or(input)
}

fn parse_logical_or(input: &str) -> IResult<&str, Expression> {
    let (input, lhs) = parse_logical_and(input)?;

    let mut remaining_input = input;
    let mut final_expression = lhs;

    loop {
        let res = preceded(ws(keyword("OR")), parse_logical_and).parse(remaining_input);
        match res {
            Ok((new_input, rhs)) => {
                final_expression = Expression::OperatorApplicationExp(OperatorApplication {
                    operator: Operator::Or,
                    operands: vec![final_expression, rhs],
                });
                remaining_input = new_input;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((remaining_input, final_expression))
}

fn parse_logical_and(input: &str) -> IResult<&str, Expression> {
    let (input, lhs) = parse_unary_expression(input)?;

    let mut remaining_input = input;
    let mut final_expression = lhs;

    loop {
        let res = preceded(ws(keyword("AND")), parse_unary_expression).parse(remaining_input);
        match res {
            Ok((new_input, rhs)) => {
                final_expression = Expression::OperatorApplicationExp(OperatorApplication {
                    operator: Operator::And,
                    operands: vec![final_expression, rhs],
                });
                remaining_input = new_input;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((remaining_input, final_expression))
}

fn parse_unary_expression(input: &str) -> IResult<&str, Expression> {
    alt((
        map(
            preceded(ws(keyword("NOT")), parse_unary_expression),
            |expr| {
                Expression::OperatorApplicationExp(OperatorApplication {
                    operator: Operator::Not,
                    operands: vec![expr],
                })
            },
        ),
        parse_comparison,
    ))
    .parse(input)
}

fn parse_comparison_operator(input: &str) -> IResult<&str, Operator> {
    alt((
        map(tag(">="), |_| Operator::GreaterThanEqual),
        map(tag("<="), |_| Operator::LessThanEqual),
        map(tag("<>"), |_| Operator::NotEqual),
        map(tag("!="), |_| Operator::NotEqual),
        map(tag(">"), |_| Operator::GreaterThan),
        map(tag("<"), |_| Operator::LessThan),
        map(tag("="), |_| Operator::Equal),
        map(keyword("LIKE"), |_| Operator::Like),
        map(keyword("IN"), |_| Operator::In),
    ))
    .parse(input)
}

fn parse_additive_operator(input: &str) -> IResult<&str, Operator> {
    alt((
        map(tag("+"), |_| Operator::Addition),
        map(tag("-"), |_| Operator::Subtraction),
    ))
    .parse(input)
}

fn parse_multiplicative_operator(input: &str) -> IResult<&str, Operator> {
    alt((
        map(tag("*"), |_| Operator::Multiplication),
        map(tag("/"), |_| Operator::Division),
    ))
    .parse(input)
}

fn parse_comparison(input: &str) -> IResult<&str, Expression> {
    let (input, lhs) = parse_additive(input)?;

    let (input, tail) = opt((ws(parse_comparison_operator), parse_additive)).parse(input)?;
    if let Some((operator, rhs)) = tail {
        return Ok((
            input,
            Expression::OperatorApplicationExp(OperatorApplication {
                operator,
                operands: vec![lhs, rhs],
            }),
        ));
    }

    // postfix IS NULL / IS NOT NULL
    let (input, opt_null_op) = opt(preceded(
        ws(keyword("IS")),
        alt((
            map(preceded(ws(keyword("NOT")), ws(keyword("NULL"))), |_| {
                Operator::IsNotNull
            }),
            map(ws(keyword("NULL")), |_| Operator::IsNull),
        )),
    ))
    .parse(input)?;

    if let Some(operator) = opt_null_op {
        Ok((
            input,
            Expression::OperatorApplicationExp(OperatorApplication {
                operator,
                operands: vec![lhs],
            }),
        ))
    } else {
        Ok((input, lhs))
    }
}

fn parse_additive(input: &str) -> IResult<&str, Expression> {
    let (input, lhs) = parse_multiplicative(input)?;

    let mut remaining_input = input;
    let mut final_expression = lhs;

    loop {
        let res = (ws(parse_additive_operator), parse_multiplicative).parse(remaining_input);
        match res {
            Ok((new_input, (operator, rhs))) => {
                final_expression = Expression::OperatorApplicationExp(OperatorApplication {
                    operator,
                    operands: vec![final_expression, rhs],
                });
                remaining_input = new_input;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((remaining_input, final_expression))
}

fn parse_multiplicative(input: &str) -> IResult<&str, Expression> {
    let (input, lhs) = parse_primary(input)?;

    let mut remaining_input = input;
    let mut final_expression = lhs;

    loop {
        let res = (ws(parse_multiplicative_operator), parse_primary).parse(remaining_input);
        match res {
            Ok((new_input, (operator, rhs))) => {
                final_expression = Expression::OperatorApplicationExp(OperatorApplication {
                    operator,
                    operands: vec![final_expression, rhs],
                });
                remaining_input = new_input;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((remaining_input, final_expression))
}

fn parse_primary(input: &str) -> IResult<&str, Expression> {
    alt((
        parse_parameter,
        parse_literal,
        parse_function_call,
        parse_column_ref,
        delimited(ws(char('(')), parse_expression, ws(char(')'))),
    ))
    .parse(input)
}

pub fn parse_parameter(input: &str) -> IResult<&str, Expression> {
    map(preceded(char('@'), common::parse_identifier), |name| {
        Expression::Parameter(name)
    })
    .parse(input)
}

pub fn parse_literal(input: &str) -> IResult<&str, Expression> {
    map(parse_literal_value, Expression::Literal).parse(input)
}

pub fn parse_literal_value(input: &str) -> IResult<&str, Literal> {
    alt((
        map(
            delimited(char('\''), take_until("'"), char('\'')),
            |val: &str| Literal::String(val.to_string()),
        ),
        map(keyword("NULL"), |_| Literal::Null),
        map(keyword("TRUE"), |_| Literal::Boolean(true)),
        map(keyword("FALSE"), |_| Literal::Boolean(false)),
        parse_number,
    ))
    .parse(input)
}

fn parse_number(input: &str) -> IResult<&str, Literal> {
    let (rest, text) = recognize((
        opt(char('-')),
        digit1,
        opt((char('.'), digit1)),
    ))
    .parse(input)?;

    if text.contains('.') {
        let val: f64 = text.parse().map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float))
        })?;
        Ok((rest, Literal::Float(val)))
    } else {
        let val: i64 = text.parse().map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
        })?;
        Ok((rest, Literal::Integer(val)))
    }
}

fn parse_function_call(input: &str) -> IResult<&str, Expression> {
    let (input, name) = common::parse_object_name(input)?;
    let (input, args) = delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), parse_expression),
        ws(char(')')),
    )
    .parse(input)?;
    Ok((
        input,
        Expression::FunctionCall(FunctionCall { name, args }),
    ))
}

/// One or more dot-separated identifier segments, e.g. `age`, `a.age`,
/// `dbo.Employee.age`.
pub fn parse_column_ref(input: &str) -> IResult<&str, Expression> {
    let (input, first) = common::parse_identifier(input)?;
    let mut parts = vec![first];
    let mut remaining_input = input;
    loop {
        let res: IResult<&str, String> =
            preceded(char('.'), common::parse_identifier).parse(remaining_input);
        match res {
            Ok((new_input, segment)) => {
                parts.push(segment);
                remaining_input = new_input;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((
        remaining_input,
        Expression::ColumnRef(ColumnRef { parts }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comparison() {
        let (rest, expr) = parse_expression("a.age > 30").unwrap();
        assert_eq!(rest, "");
        assert_eq!(
            expr,
            Expression::OperatorApplicationExp(OperatorApplication {
                operator: Operator::GreaterThan,
                operands: vec![
                    Expression::ColumnRef(ColumnRef::two_part("a", "age")),
                    Expression::Literal(Literal::Integer(30)),
                ],
            })
        );
    }

    #[test]
    fn test_parse_conjunction_splits() {
        let (_, expr) = parse_expression("a.age > 30 AND b.name = 'Bob' AND c.x < 1").unwrap();
        let conjuncts = expr.into_conjuncts();
        assert_eq!(conjuncts.len(), 3);
    }

    #[test]
    fn test_parse_or_binds_looser_than_and() {
        let (_, expr) = parse_expression("a.x = 1 OR a.y = 2 AND a.z = 3").unwrap();
        match expr {
            Expression::OperatorApplicationExp(op_app) => {
                assert_eq!(op_app.operator, Operator::Or);
            }
            other => panic!("expected OR at the top, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_call_with_qualified_name() {
        let (_, expr) = parse_expression("dbo.DownSizeFunction(a.LocalNodeId) = '1'").unwrap();
        match expr {
            Expression::OperatorApplicationExp(op_app) => {
                assert!(matches!(op_app.operands[0], Expression::FunctionCall(_)));
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_parameter() {
        let (_, expr) = parse_expression("a.age >= @minAge").unwrap();
        match expr {
            Expression::OperatorApplicationExp(op_app) => {
                assert_eq!(op_app.operands[1], Expression::Parameter("minAge".to_string()));
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_is_null() {
        let (_, expr) = parse_expression("a.age IS NOT NULL").unwrap();
        assert_eq!(
            expr,
            Expression::OperatorApplicationExp(OperatorApplication {
                operator: Operator::IsNotNull,
                operands: vec![Expression::ColumnRef(ColumnRef::two_part("a", "age"))],
            })
        );
    }
}
