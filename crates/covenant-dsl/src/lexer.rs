//! Lexical analysis for the constraint DSL.
//!
//! Single pass, left to right, no backtracking. Keywords are matched
//! case-insensitively by upper-casing identifiers before lookup, so
//! `always`, `Always` and `ALWAYS` are equivalent. Scanning stops at the
//! first error; there is no recovery.

use logos::Logos;

use crate::diag::SyntaxError;
use crate::token::{Literal, RawToken, Token, TokenKind};

/// Map an identifier to a keyword kind, if it is one.
fn keyword(identifier: &str) -> Option<TokenKind> {
    match identifier.to_ascii_uppercase().as_str() {
        "ALWAYS" => Some(TokenKind::Always),
        "WHEN" => Some(TokenKind::When),
        "THEN" => Some(TokenKind::Then),
        "AND" => Some(TokenKind::And),
        "OR" => Some(TokenKind::Or),
        "NOT" => Some(TokenKind::Not),
        _ => None,
    }
}

/// Scan `source` into tokens.
///
/// `offset` is added to every recorded position; it is used when the source
/// is a fragment embedded in a larger text (message templates), so that
/// error messages still point at the right column of the enclosing text.
/// The returned sequence always ends with an [`TokenKind::Eof`] sentinel
/// positioned at `source.len() + offset`.
pub fn scan(source: &str, offset: usize) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut lexer = RawToken::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let slice = lexer.slice();
        let position = span.start + offset;

        let raw = result.map_err(|()| {
            let symbol = slice.chars().next().unwrap_or('\0');
            SyntaxError::new(format!("Unexpected character '{symbol}'"), position)
        })?;

        let token = match raw {
            RawToken::ParenOpen => Token::new(TokenKind::ParenOpen, slice, None, position),
            RawToken::ParenClose => Token::new(TokenKind::ParenClose, slice, None, position),
            RawToken::Plus => Token::new(TokenKind::Plus, slice, None, position),
            RawToken::Minus => Token::new(TokenKind::Minus, slice, None, position),
            RawToken::Comma => Token::new(TokenKind::Comma, slice, None, position),
            RawToken::Dot => Token::new(TokenKind::Dot, slice, None, position),
            RawToken::Colon => Token::new(TokenKind::Colon, slice, None, position),
            RawToken::Slash => Token::new(TokenKind::Slash, slice, None, position),
            RawToken::Star => Token::new(TokenKind::Star, slice, None, position),
            RawToken::Percent => Token::new(TokenKind::Percent, slice, None, position),
            RawToken::Dollar => Token::new(TokenKind::Dollar, slice, None, position),
            RawToken::Hash => Token::new(TokenKind::Hash, slice, None, position),
            RawToken::Bang => Token::new(TokenKind::Bang, slice, None, position),
            RawToken::BangEqual => Token::new(TokenKind::BangEqual, slice, None, position),
            RawToken::EqualEqual => Token::new(TokenKind::EqualEqual, slice, None, position),
            RawToken::Greater => Token::new(TokenKind::Greater, slice, None, position),
            RawToken::GreaterEqual => Token::new(TokenKind::GreaterEqual, slice, None, position),
            RawToken::Less => Token::new(TokenKind::Less, slice, None, position),
            RawToken::LessEqual => Token::new(TokenKind::LessEqual, slice, None, position),
            RawToken::PipePipe => Token::new(TokenKind::PipePipe, slice, None, position),
            RawToken::AmpAmp => Token::new(TokenKind::AmpAmp, slice, None, position),
            RawToken::Number(value) => Token::new(
                TokenKind::Number,
                slice,
                Some(Literal::Number(value)),
                position,
            ),
            RawToken::Str => {
                // Lexeme and literal are the content between the quotes;
                // the position stays on the opening quote.
                let content = &slice[1..slice.len() - 1];
                Token::new(
                    TokenKind::Str,
                    content,
                    Some(Literal::Str(content.to_string())),
                    position,
                )
            }
            RawToken::Identifier => match keyword(slice) {
                Some(TokenKind::Always) => Token::new(
                    TokenKind::Always,
                    slice,
                    Some(Literal::Bool(true)),
                    position,
                ),
                Some(kind) => Token::new(kind, slice, None, position),
                None => Token::new(TokenKind::Identifier, slice, None, position),
            },
            RawToken::LoneEqual => {
                return Err(SyntaxError::new(
                    "Single '=' is not allowed, did you mean '=='?",
                    position,
                ));
            }
            RawToken::LonePipe => {
                return Err(SyntaxError::new(
                    "Single '|' is not allowed, did you mean '||'?",
                    position,
                ));
            }
            RawToken::LoneAmp => {
                return Err(SyntaxError::new(
                    "Single '&' is not allowed, did you mean '&&'?",
                    position,
                ));
            }
            RawToken::UnterminatedStr => {
                return Err(SyntaxError::new("Unterminated string", position));
            }
        };
        tokens.push(token);
    }

    tokens.push(Token::eof(source.len() + offset));
    Ok(tokens)
}
