//! Token definitions for the constraint DSL.
//!
//! Raw tokenization is done with logos; the lexer wraps the logos output
//! into [`Token`] values that carry their lexeme, literal value and exact
//! byte position so downstream error messages can point at the source.

use logos::Logos;
use std::fmt;

/// Raw logos-driven token set.
///
/// This enum exists purely for scanning. It includes error-carrier variants
/// (`LoneEqual`, `LonePipe`, `LoneAmp`, `UnterminatedStr`) that the lexer
/// wrapper turns into syntax errors with tailored messages instead of
/// surfacing a generic "unexpected input".
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub(crate) enum RawToken {
    #[token("(")]
    ParenOpen,
    #[token(")")]
    ParenClose,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token("/")]
    Slash,
    #[token("*")]
    Star,
    #[token("%")]
    Percent,
    #[token("$")]
    Dollar,
    #[token("#")]
    Hash,

    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token("==")]
    EqualEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token("||")]
    PipePipe,
    #[token("&&")]
    AmpAmp,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,
    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),
    #[regex(r"'[^']*'", priority = 6)]
    Str,

    // A single `=`, `|` or `&` must be doubled; these variants let the
    // lexer report that with the exact offending position.
    #[token("=")]
    LoneEqual,
    #[token("|")]
    LonePipe,
    #[token("&")]
    LoneAmp,
    // A quote that never closes; reported at the opening quote.
    #[regex(r"'[^']*", priority = 5)]
    UnterminatedStr,
}

/// All possible words of the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // single character tokens
    ParenOpen,
    ParenClose,
    Plus,
    Minus,
    Comma,
    Dot,
    Colon,
    Slash,
    Star,
    Percent,
    Dollar,
    Hash,

    // single or double character tokens
    Bang,
    BangEqual,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    PipePipe,
    AmpAmp,

    // literals
    Identifier,
    Str,
    Number,

    // keywords (matched case-insensitively)
    Always,
    When,
    Then,
    And,
    Or,
    Not,

    Eof,
}

/// Literal value attached to a token.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(String),
    Bool(bool),
}

/// A word of the DSL with its source location.
///
/// Tokens are produced once by the lexer and consumed read-only by the
/// parser; the text processor reuses their positions for error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token. String tokens store the content between
    /// the quotes, not the quotes themselves.
    pub lexeme: String,
    pub literal: Option<Literal>,
    /// Absolute byte offset into the (enclosing) source.
    pub position: usize,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        lexeme: impl Into<String>,
        literal: Option<Literal>,
        position: usize,
    ) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            literal,
            position,
        }
    }

    /// The end-of-input sentinel, positioned at source length.
    pub fn eof(position: usize) -> Self {
        Self::new(TokenKind::Eof, "", None, position)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "([{:?}] '{}')", self.kind, self.lexeme)
    }
}
