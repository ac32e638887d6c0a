// Expression grammar
//
// Precedence, lowest first:
//   or (||, or)
//   and (&&, and)
//   not (!, not)
//   comparison (== != < <= > >=) and membership (in [..])
//   additive (+ -)
//   multiplicative (* /)
//   unary minus
//   primary: literal, column, call, (expr)

use super::ast::{BinaryOp, Expr, Function, Literal};
use super::lexer::{identifier, keyword, number_literal, string_literal, ws};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{map, map_opt, opt, value},
    multi::{fold_many0, separated_list0},
    sequence::{delimited, pair, preceded},
    IResult,
};

/// Parse a complete expression (leading/trailing whitespace allowed)
pub fn parse_expression(input: &str) -> IResult<&str, Expr> {
    ws(or_expr)(input)
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    fold_many0(
        preceded(ws(alt((tag("||"), keyword("or")))), and_expr),
        move || first.clone(),
        |acc, rhs| Expr::binary(BinaryOp::Or, acc, rhs),
    )(input)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = not_expr(input)?;
    fold_many0(
        preceded(ws(alt((tag("&&"), keyword("and")))), not_expr),
        move || first.clone(),
        |acc, rhs| Expr::binary(BinaryOp::And, acc, rhs),
    )(input)
}

fn not_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(
            preceded(ws(alt((bang, keyword("not")))), not_expr),
            |e| Expr::Not(Box::new(e)),
        ),
        comparison,
    ))(input)
}

// A lone `!`, never the start of `!=`
fn bang(input: &str) -> IResult<&str, &str> {
    let (rest, matched) = tag("!")(input)?;
    if rest.starts_with('=') {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    Ok((rest, matched))
}

enum ComparisonTail {
    Cmp(BinaryOp, Expr),
    In(Vec<Literal>),
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, lhs) = additive(input)?;
    let (input, tail) = opt(alt((
        map(pair(ws(comparison_op), additive), |(op, rhs)| ComparisonTail::Cmp(op, rhs)),
        map(preceded(ws(keyword("in")), literal_list), ComparisonTail::In),
    )))(input)?;

    let expr = match tail {
        None => lhs,
        Some(ComparisonTail::Cmp(op, rhs)) => Expr::binary(op, lhs, rhs),
        Some(ComparisonTail::In(set)) => Expr::In {
            expr: Box::new(lhs),
            set,
        },
    };
    Ok((input, expr))
}

fn comparison_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Eq, tag("==")),
        value(BinaryOp::Ne, tag("!=")),
        value(BinaryOp::Le, tag("<=")),
        value(BinaryOp::Ge, tag(">=")),
        value(BinaryOp::Lt, tag("<")),
        value(BinaryOp::Gt, tag(">")),
    ))(input)
}

fn additive(input: &str) -> IResult<&str, Expr> {
    let (input, first) = multiplicative(input)?;
    fold_many0(
        pair(
            ws(alt((value(BinaryOp::Add, char('+')), value(BinaryOp::Sub, char('-'))))),
            multiplicative,
        ),
        move || first.clone(),
        |acc, (op, rhs)| Expr::binary(op, acc, rhs),
    )(input)
}

fn multiplicative(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    fold_many0(
        pair(
            ws(alt((value(BinaryOp::Mul, char('*')), value(BinaryOp::Div, char('/'))))),
            unary,
        ),
        move || first.clone(),
        |acc, (op, rhs)| Expr::binary(op, acc, rhs),
    )(input)
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), unary), |e| Expr::Neg(Box::new(e))),
        primary,
    ))(input)
}

fn primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        delimited(ws(char('(')), or_expr, ws(char(')'))),
        map(literal, Expr::Literal),
        call,
        map(identifier, Expr::Column),
    )))(input)
}

fn call(input: &str) -> IResult<&str, Expr> {
    map_opt(
        pair(
            identifier,
            delimited(
                ws(char('(')),
                separated_list0(ws(char(',')), or_expr),
                ws(char(')')),
            ),
        ),
        |(name, args)| {
            let func = Function::from_name(&name)?;
            (args.len() == func.arity()).then_some(Expr::Call { func, args })
        },
    )(input)
}

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        value(Literal::Bool(true), keyword("true")),
        value(Literal::Bool(false), keyword("false")),
        map(string_literal, Literal::Str),
        map(number_literal, Literal::Num),
    ))(input)
}

fn literal_list(input: &str) -> IResult<&str, Vec<Literal>> {
    delimited(
        ws(char('[')),
        separated_list0(ws(char(',')), ws(literal)),
        ws(char(']')),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Expr {
        let (rest, expr) = parse_expression(input).unwrap();
        assert!(rest.is_empty(), "unparsed input: '{}'", rest);
        expr
    }

    fn col(name: &str) -> Expr {
        Expr::Column(name.to_string())
    }

    fn num(n: f64) -> Expr {
        Expr::Literal(Literal::Num(n))
    }

    #[test]
    fn test_parse_comparison() {
        assert_eq!(
            parse("species == \"setosa\""),
            Expr::binary(BinaryOp::Eq, col("species"), Expr::Literal(Literal::Str("setosa".to_string())))
        );
    }

    #[test]
    fn test_parse_precedence() {
        // a + b * 2 > 3 && !c  ==>  ((a + (b*2)) > 3) && (!c)
        let expected = Expr::binary(
            BinaryOp::And,
            Expr::binary(
                BinaryOp::Gt,
                Expr::binary(BinaryOp::Add, col("a"), Expr::binary(BinaryOp::Mul, col("b"), num(2.0))),
                num(3.0),
            ),
            Expr::Not(Box::new(col("c"))),
        );
        assert_eq!(parse("a + b * 2 > 3 && !c"), expected);
    }

    #[test]
    fn test_parse_left_associative_subtraction() {
        assert_eq!(
            parse("10 - 4 - 3"),
            Expr::binary(BinaryOp::Sub, Expr::binary(BinaryOp::Sub, num(10.0), num(4.0)), num(3.0))
        );
    }

    #[test]
    fn test_parse_keywords() {
        let expr = parse("type == \"confirmed\" and not country in [\"US\", \"Italy\"]");
        match expr {
            Expr::Binary { op: BinaryOp::And, rhs, .. } => {
                assert!(matches!(*rhs, Expr::Not(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_not_equal_is_not_negation() {
        assert_eq!(
            parse("cases != 0"),
            Expr::binary(BinaryOp::Ne, col("cases"), num(0.0))
        );
    }

    #[test]
    fn test_parse_call() {
        let expr = parse("if_else(country == \"US\", \"US\", \"other\")");
        match expr {
            Expr::Call { func: Function::IfElse, args } => assert_eq!(args.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_call_wrong_arity_fails() {
        let result = parse_expression("day(date, 2)");
        // Falls back to a bare identifier, leaving the argument list unparsed
        assert!(matches!(result, Ok((rest, _)) if !rest.is_empty()));
    }

    #[test]
    fn test_parse_column_named_like_keyword_prefix() {
        assert_eq!(parse("order_id > 1"), Expr::binary(BinaryOp::Gt, col("order_id"), num(1.0)));
    }

    #[test]
    fn test_parse_negative_literal() {
        assert_eq!(parse("-1.5"), Expr::Neg(Box::new(num(1.5))));
    }
}
