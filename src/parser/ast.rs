// Abstract Syntax Tree for the row expression language

use std::fmt;

/// Literal constant
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Num(f64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

/// Built-in functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// if_else(condition, then, otherwise)
    IfElse,
    /// Day of month of a date
    Day,
    Month,
    Year,
    /// ISO weekday, Monday = 1
    Weekday,
    Abs,
    IsMissing,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "if_else" | "ifelse" => Some(Function::IfElse),
            "day" | "mday" => Some(Function::Day),
            "month" => Some(Function::Month),
            "year" => Some(Function::Year),
            "weekday" | "wday" => Some(Function::Weekday),
            "abs" => Some(Function::Abs),
            "is_missing" | "is_na" => Some(Function::IsMissing),
            _ => None,
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Function::IfElse => 3,
            _ => 1,
        }
    }
}

/// Expression evaluated against one record
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(Literal),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `expr in [lit, ...]`
    In {
        expr: Box<Expr>,
        set: Vec<Literal>,
    },
    Call {
        func: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Column names referenced anywhere in the expression, in order of first
    /// appearance.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => {
                if !out.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                    out.push(name);
                }
            }
            Expr::Literal(_) => {}
            Expr::Not(e) | Expr::Neg(e) => e.collect_columns(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_columns(out);
                rhs.collect_columns(out);
            }
            Expr::In { expr, .. } => expr.collect_columns(out),
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_columns(out);
                }
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Num(n) => write!(f, "{}", n),
            Literal::Str(s) => write!(f, "\"{}\"", s),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

impl Function {
    pub fn name(self) -> &'static str {
        match self {
            Function::IfElse => "if_else",
            Function::Day => "day",
            Function::Month => "month",
            Function::Year => "year",
            Function::Weekday => "weekday",
            Function::Abs => "abs",
            Function::IsMissing => "is_missing",
        }
    }
}

// Fully parenthesised; used in error messages
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => {
                if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
                    f.write_str(name)
                } else {
                    write!(f, "`{}`", name)
                }
            }
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::Not(e) => write!(f, "!({})", e),
            Expr::Neg(e) => write!(f, "-({})", e),
            Expr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Expr::In { expr, set } => {
                let items: Vec<String> = set.iter().map(|l| l.to_string()).collect();
                write!(f, "({} in [{}])", expr, items.join(", "))
            }
            Expr::Call { func, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", func.name(), args.join(", "))
            }
        }
    }
}
