// Lexical helpers shared by the expression grammar

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while},
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{map, map_res, not, peek, recognize},
    multi::many0_count,
    number::complete::recognize_float,
    sequence::{delimited, pair, terminated},
    IResult,
};

/// Wrap a parser so it tolerates surrounding whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Column or function name: `sepal_length`, `df.cases`, or back-quoted
/// `` `case count` ``
pub fn identifier(input: &str) -> IResult<&str, String> {
    alt((
        map(
            recognize(pair(
                alt((alpha1, tag("_"))),
                many0_count(alt((alphanumeric1, tag("_"), tag(".")))),
            )),
            String::from,
        ),
        map(delimited(char('`'), is_not("`"), char('`')), String::from),
    ))(input)
}

/// Double-quoted string without escapes
pub fn string_literal(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        String::from,
    )(input)
}

/// Plain decimal/scientific number. `inf` and `nan` are not numbers here, so
/// columns named like them stay identifiers.
pub fn number_literal(input: &str) -> IResult<&str, f64> {
    map_res(recognize_float, |s: &str| s.parse::<f64>())(input)
}

/// A reserved word that is not the prefix of a longer identifier
pub fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(
        tag(word),
        not(peek(alt((alphanumeric1, tag("_"))))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("sepal_length + 1"), Ok((" + 1", "sepal_length".to_string())));
        assert_eq!(identifier("`case count`"), Ok(("", "case count".to_string())));
        assert!(identifier("1abc").is_err());
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(string_literal("\"US\" rest"), Ok((" rest", "US".to_string())));
        assert_eq!(string_literal("\"\""), Ok(("", String::new())));
    }

    #[test]
    fn test_number_literal() {
        assert_eq!(number_literal("4.5)"), Ok((")", 4.5)));
        assert_eq!(number_literal("1e3"), Ok(("", 1000.0)));
        assert!(number_literal("inf").is_err());
    }

    #[test]
    fn test_keyword_boundary() {
        assert!(keyword("and")("and b").is_ok());
        assert!(keyword("and")("anderson").is_err());
    }
}
