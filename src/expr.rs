//! Evaluation of parsed expressions against dataset rows.

use crate::data::{Dataset, Row, Value};
use crate::error::{Error, Result};
use crate::parser::{parse_expression, BinaryOp, Expr, Function, Literal};
use chrono::{Datelike, NaiveDate};
use nom::combinator::all_consuming;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Result of evaluating an expression on one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Value(Value),
    Bool(bool),
}

impl Datum {
    fn missing() -> Self {
        Datum::Value(Value::Missing)
    }

    fn is_missing(&self) -> bool {
        matches!(self, Datum::Value(Value::Missing))
    }

    /// Cell value for a derived column. Booleans become `"true"`/`"false"`.
    pub fn into_value(self) -> Value {
        match self {
            Datum::Value(v) => v,
            Datum::Bool(b) => Value::Str(b.to_string()),
        }
    }

    /// Truth value: `None` when missing.
    fn truth(&self) -> std::result::Result<Option<bool>, String> {
        match self {
            Datum::Bool(b) => Ok(Some(*b)),
            Datum::Value(Value::Missing) => Ok(None),
            Datum::Value(other) => Err(format!("expected a boolean, found '{}'", other)),
        }
    }
}

impl From<&Literal> for Datum {
    fn from(lit: &Literal) -> Self {
        match lit {
            Literal::Num(n) => Datum::Value(Value::Num(*n)),
            Literal::Str(s) => Datum::Value(Value::Str(s.clone())),
            Literal::Bool(b) => Datum::Bool(*b),
        }
    }
}

/// Parse a complete expression. Trailing input is an error.
pub fn parse_expr(input: &str) -> Result<Expr> {
    match all_consuming(parse_expression)(input) {
        Ok((_, expr)) => Ok(expr),
        Err(e) => Err(Error::Expression {
            input: input.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Check every column the expression mentions exists in `data`.
pub fn validate_columns(expr: &Expr, data: &Dataset) -> Result<()> {
    for column in expr.columns() {
        data.column_index(column)?;
    }
    Ok(())
}

/// Evaluate `expr` against one row.
pub fn evaluate(expr: &Expr, row: &Row<'_>) -> Result<Datum> {
    eval(expr, row).map_err(|e| match e {
        EvalError::UnknownColumn(column) => Error::SchemaMismatch {
            column,
            reason: "not found".to_string(),
        },
        EvalError::Type(message) => Error::Expression {
            input: expr.to_string(),
            message,
        },
    })
}

enum EvalError {
    UnknownColumn(String),
    Type(String),
}

impl From<String> for EvalError {
    fn from(message: String) -> Self {
        EvalError::Type(message)
    }
}

fn eval(expr: &Expr, row: &Row<'_>) -> std::result::Result<Datum, EvalError> {
    match expr {
        Expr::Column(name) => row
            .get(name)
            .map(|v| Datum::Value(v.clone()))
            .ok_or_else(|| EvalError::UnknownColumn(name.clone())),
        Expr::Literal(lit) => Ok(Datum::from(lit)),
        Expr::Not(inner) => {
            let value = eval(inner, row)?;
            Ok(match value.truth()? {
                Some(b) => Datum::Bool(!b),
                None => Datum::missing(),
            })
        }
        Expr::Neg(inner) => match eval(inner, row)? {
            Datum::Value(Value::Num(n)) => Ok(Datum::Value(Value::Num(-n))),
            d if d.is_missing() => Ok(d),
            other => Err(format!("cannot negate '{}'", describe(&other)).into()),
        },
        Expr::Binary { op: BinaryOp::And, lhs, rhs } => {
            let l = eval(lhs, row)?.truth()?;
            if l == Some(false) {
                return Ok(Datum::Bool(false));
            }
            let r = eval(rhs, row)?.truth()?;
            Ok(match (l, r) {
                (_, Some(false)) => Datum::Bool(false),
                (Some(true), Some(true)) => Datum::Bool(true),
                _ => Datum::missing(),
            })
        }
        Expr::Binary { op: BinaryOp::Or, lhs, rhs } => {
            let l = eval(lhs, row)?.truth()?;
            if l == Some(true) {
                return Ok(Datum::Bool(true));
            }
            let r = eval(rhs, row)?.truth()?;
            Ok(match (l, r) {
                (_, Some(true)) => Datum::Bool(true),
                (Some(false), Some(false)) => Datum::Bool(false),
                _ => Datum::missing(),
            })
        }
        Expr::Binary { op, lhs, rhs } => {
            let l = eval(lhs, row)?;
            let r = eval(rhs, row)?;
            binary(*op, l, r).map_err(EvalError::Type)
        }
        Expr::In { expr, set } => {
            let value = eval(expr, row)?;
            if value.is_missing() {
                return Ok(Datum::missing());
            }
            for lit in set {
                if compare(&value, &Datum::from(lit))? == Some(Ordering::Equal) {
                    return Ok(Datum::Bool(true));
                }
            }
            Ok(Datum::Bool(false))
        }
        Expr::Call { func, args } => call(*func, args, row),
    }
}

fn binary(op: BinaryOp, l: Datum, r: Datum) -> std::result::Result<Datum, String> {
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => arithmetic(op, l, r),
        _ => {
            let Some(ord) = compare(&l, &r)? else {
                return Ok(Datum::missing());
            };
            let result = match op {
                BinaryOp::Eq => ord == Ordering::Equal,
                BinaryOp::Ne => ord != Ordering::Equal,
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::Le => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                BinaryOp::Ge => ord != Ordering::Less,
                _ => unreachable!("logical operators are evaluated lazily"),
            };
            Ok(Datum::Bool(result))
        }
    }
}

fn arithmetic(op: BinaryOp, l: Datum, r: Datum) -> std::result::Result<Datum, String> {
    if l.is_missing() || r.is_missing() {
        return Ok(Datum::missing());
    }
    match (&l, &r) {
        (Datum::Value(Value::Num(a)), Datum::Value(Value::Num(b))) => {
            let n = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                _ => {
                    if *b == 0.0 {
                        return Ok(Datum::missing());
                    }
                    a / b
                }
            };
            Ok(Datum::Value(Value::Num(n)))
        }
        // date +/- days
        (Datum::Value(Value::Date(d)), Datum::Value(Value::Num(days)))
            if matches!(op, BinaryOp::Add | BinaryOp::Sub) =>
        {
            let signed = if op == BinaryOp::Add { *days } else { -*days };
            let delta = chrono::Duration::days(signed.round() as i64);
            Ok(d.checked_add_signed(delta)
                .map(|d| Datum::Value(Value::Date(d)))
                .unwrap_or_else(Datum::missing))
        }
        (Datum::Value(Value::Date(a)), Datum::Value(Value::Date(b))) if op == BinaryOp::Sub => {
            Ok(Datum::Value(Value::Num((*a - *b).num_days() as f64)))
        }
        _ => Err(format!(
            "cannot apply '{}' to '{}' and '{}'",
            op.symbol(),
            describe(&l),
            describe(&r)
        )),
    }
}

/// Order two data; `None` when either side is missing.
fn compare(l: &Datum, r: &Datum) -> std::result::Result<Option<Ordering>, String> {
    use Datum::{Bool, Value as V};
    Ok(match (l, r) {
        (V(Value::Missing), _) | (_, V(Value::Missing)) => None,
        (Bool(a), Bool(b)) => Some(a.cmp(b)),
        (V(Value::Num(a)), V(Value::Num(b))) => Some(a.partial_cmp(b).unwrap_or(Ordering::Equal)),
        (V(Value::Str(a)), V(Value::Str(b))) => Some(a.cmp(b)),
        (V(Value::Date(a)), V(Value::Date(b))) => Some(a.cmp(b)),
        (V(Value::Date(a)), V(Value::Str(s))) => Some(a.cmp(&parse_date(s)?)),
        (V(Value::Str(s)), V(Value::Date(b))) => Some(parse_date(s)?.cmp(b)),
        _ => {
            return Err(format!(
                "cannot compare '{}' with '{}'",
                describe(l),
                describe(r)
            ))
        }
    })
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    Value::Str(s.to_string())
        .as_date()
        .ok_or_else(|| format!("'{}' is not a date (expected YYYY-MM-DD)", s))
}

fn call(func: Function, args: &[Expr], row: &Row<'_>) -> std::result::Result<Datum, EvalError> {
    match func {
        Function::IfElse => match eval(&args[0], row)?.truth()? {
            Some(true) => eval(&args[1], row),
            Some(false) => eval(&args[2], row),
            None => Ok(Datum::missing()),
        },
        Function::IsMissing => Ok(Datum::Bool(eval(&args[0], row)?.is_missing())),
        Function::Abs => match eval(&args[0], row)? {
            Datum::Value(Value::Num(n)) => Ok(Datum::Value(Value::Num(n.abs()))),
            d if d.is_missing() => Ok(d),
            other => Err(format!("abs() expects a number, found '{}'", describe(&other)).into()),
        },
        Function::Day | Function::Month | Function::Year | Function::Weekday => {
            let arg = eval(&args[0], row)?;
            if arg.is_missing() {
                return Ok(arg);
            }
            let date = match &arg {
                Datum::Value(v) => v.as_date(),
                Datum::Bool(_) => None,
            }
            .ok_or_else(|| format!("{}() expects a date, found '{}'", func.name(), describe(&arg)))?;
            let n = match func {
                Function::Day => date.day() as f64,
                Function::Month => date.month() as f64,
                Function::Year => date.year() as f64,
                _ => date.weekday().number_from_monday() as f64,
            };
            Ok(Datum::Value(Value::Num(n)))
        }
    }
}

fn describe(d: &Datum) -> String {
    match d {
        Datum::Value(v) => v.to_string(),
        Datum::Bool(b) => b.to_string(),
    }
}

/// A parsed boolean expression that remembers its source text.
///
/// Serializes as the source string, so chart specs in JSON carry predicates
/// like `"country == \"US\""`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Predicate {
    source: String,
    expr: Expr,
}

impl Predicate {
    pub fn parse(source: &str) -> Result<Self> {
        Ok(Self {
            source: source.trim().to_string(),
            expr: parse_expr(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Check referenced columns against a schema.
    pub fn validate(&self, data: &Dataset) -> Result<()> {
        validate_columns(&self.expr, data)
    }

    /// True if the row satisfies the predicate. Missing counts as false.
    pub fn matches(&self, row: &Row<'_>) -> Result<bool> {
        let datum = evaluate(&self.expr, row).map_err(|e| self.with_source(e))?;
        match datum.truth() {
            Ok(t) => Ok(t.unwrap_or(false)),
            Err(message) => Err(Error::Expression {
                input: self.source.clone(),
                message,
            }),
        }
    }

    fn with_source(&self, err: Error) -> Error {
        match err {
            Error::Expression { message, .. } => Error::Expression {
                input: self.source.clone(),
                message,
            },
            other => other,
        }
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for Predicate {
    type Error = Error;

    fn try_from(source: String) -> Result<Self> {
        Predicate::parse(&source)
    }
}

impl From<Predicate> for String {
    fn from(p: Predicate) -> Self {
        p.source
    }
}

impl std::str::FromStr for Predicate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Predicate::parse(s)
    }
}
