#![doc = include_str!("../README.md")]

pub mod lexer;
pub mod parser;
pub mod token;

pub use lexer::Lexer;
pub use parser::{BinaryExpr, BinaryOp, Expr, FieldExpr, ParseError, Parser};
pub use token::Token;
