// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Constraint definition language: lexer, parser, interpreter and message
//! interpolation.
//!
//! The pipeline is `source -> tokens -> AST -> value`:
//!
//! - [`lexer::scan`] turns constraint source into tokens,
//! - [`parser::Parser`] compiles tokens into an [`ast::Ast`],
//! - [`interp::interpret`] evaluates an AST against a model, a state and a
//!   registered [`interp::Functions`] table,
//! - [`text::TextProcessor`] interpolates DSL fragments embedded in plain
//!   text (constraint messages).
//!
//! Compilation errors are fatal ([`diag::SyntaxError`]); evaluation faults
//! are collected into a [`diag::Diagnostics`] sink and never abort.

pub mod ast;
pub mod diag;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod text;
pub mod token;
pub mod value;

pub use ast::{Ast, Expr, VarPrefix, VarStats};
pub use diag::{Category, Diagnostic, Diagnostics, SyntaxError};
pub use interp::{interpret, DuplicateFunction, Functions};
pub use parser::Parser;
pub use text::TextProcessor;
pub use token::{Literal, Token, TokenKind};
pub use value::Value;
