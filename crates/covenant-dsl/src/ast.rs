//! AST node types for the constraint DSL.
//!
//! The node set is a closed sum type; traversals (interpreter, printer)
//! are `match`-based passes so the compiler checks them exhaustively.

use std::fmt;

use indexmap::IndexMap;

use crate::token::{Token, TokenKind};

/// Which data object a variable reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarPrefix {
    /// `$` — the model object.
    Model,
    /// `#` — the state object.
    State,
}

impl VarPrefix {
    pub fn noun(self) -> &'static str {
        match self {
            VarPrefix::Model => "model",
            VarPrefix::State => "state",
        }
    }
}

/// An expression node. Immutable once constructed; the tree is acyclic and
/// owned exclusively by its [`Ast`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Arithmetic or comparison, non-logical.
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    /// `&&`/`AND`, `||`/`OR`; short-circuiting.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    /// Numeric or boolean negation.
    Unary { operator: Token, right: Box<Expr> },
    /// Explicit parenthesization, preserved for evaluation order only.
    Grouping { inner: Box<Expr> },
    /// Number, string, or the `ALWAYS` boolean-true keyword.
    Literal { value: Token },
    /// `$path.to.field` / `#path.to.field`; an empty path means the whole
    /// model or state object.
    Variable {
        prefix: Token,
        path: Vec<Token>,
    },
    /// Function call; zero call-site arguments means "statement", invoked
    /// with `(model, state)` implicitly.
    Function { name: Token, args: Vec<Expr> },
    /// The root node: only node type returned by a top-level parse.
    Constraint {
        activation: Box<Expr>,
        assertion: Box<Expr>,
    },
}

impl Expr {
    /// The prefix of a variable node, by token kind.
    pub fn var_prefix(prefix: &Token) -> VarPrefix {
        if prefix.kind == TokenKind::Hash {
            VarPrefix::State
        } else {
            VarPrefix::Model
        }
    }
}

/// Variable-occurrence statistics accumulated during parsing.
///
/// Keyed by the dotted path, separately for model and state references.
/// Informational only; evaluation never consults these.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarStats {
    pub model: IndexMap<String, usize>,
    pub state: IndexMap<String, usize>,
}

impl VarStats {
    pub fn record(&mut self, prefix: VarPrefix, path: &str) {
        let bucket = match prefix {
            VarPrefix::Model => &mut self.model,
            VarPrefix::State => &mut self.state,
        };
        *bucket.entry(path.to_string()).or_insert(0) += 1;
    }
}

/// A compiled unit: the root expression, the original source text (kept for
/// error reporting) and the parse-time variable statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    pub root: Expr,
    pub source: String,
    pub stats: VarStats,
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, &self.root)
    }
}

/// Debug pretty-printer pass: parenthesized prefix form, e.g.
/// `(activation (ALWAYS) assertion (> ($ a) (42)))`.
fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Binary {
            left,
            operator,
            right,
        }
        | Expr::Logical {
            left,
            operator,
            right,
        } => {
            write!(f, "({} ", operator.lexeme)?;
            write_expr(f, left)?;
            write!(f, " ")?;
            write_expr(f, right)?;
            write!(f, ")")
        }
        Expr::Unary { operator, right } => {
            write!(f, "({} ", operator.lexeme)?;
            write_expr(f, right)?;
            write!(f, ")")
        }
        Expr::Grouping { inner } => {
            write!(f, "(group ")?;
            write_expr(f, inner)?;
            write!(f, ")")
        }
        Expr::Literal { value } => match value.kind {
            TokenKind::Str => write!(f, "('{}')", value.lexeme),
            _ => write!(f, "({})", value.lexeme),
        },
        Expr::Variable { prefix, path } => {
            if path.is_empty() {
                write!(f, "({})", prefix.lexeme)
            } else {
                let dotted: Vec<&str> = path.iter().map(|t| t.lexeme.as_str()).collect();
                write!(f, "({} {})", prefix.lexeme, dotted.join("."))
            }
        }
        Expr::Function { name, args } => {
            write!(f, "({}", name.lexeme)?;
            for arg in args {
                write!(f, " ")?;
                write_expr(f, arg)?;
            }
            write!(f, ")")
        }
        Expr::Constraint {
            activation,
            assertion,
        } => {
            write!(f, "(activation ")?;
            write_expr(f, activation)?;
            write!(f, " assertion ")?;
            write_expr(f, assertion)?;
            write!(f, ")")
        }
    }
}
