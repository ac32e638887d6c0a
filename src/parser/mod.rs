// Expression language parser

pub mod ast;
pub mod expr;
pub mod lexer;

// Public API re-exports
pub use ast::{BinaryOp, Expr, Function, Literal};
pub use expr::parse_expression;
