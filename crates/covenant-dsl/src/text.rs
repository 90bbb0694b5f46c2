//! Message-template interpolation.
//!
//! A template is plain text with embedded DSL fragments: `$`/`#` variable
//! references, calls of registered functions, and bare registered function
//! names (invoked as statements). Fragments are recognised by a dedicated
//! scan, compiled once with the narrow parser entry points, and replaced by
//! their evaluated value on [`TextProcessor::process`].
//!
//! Recognition is deliberately conservative: an identifier that is not a
//! registered function name stays inert, as does a call whose parentheses
//! never balance. Because registration changes what counts as a fragment,
//! callers re-scan (via the `rescan` flag) when the function table has
//! changed since the last scan.

use crate::ast::Ast;
use crate::diag::{Diagnostics, SyntaxError};
use crate::interp::{interpret, Functions};
use crate::lexer;
use crate::parser::Parser;

enum FragmentKind {
    Model,
    State,
    Function,
    FunctionExpr,
}

struct Fragment {
    /// Byte offset of the fragment in the template.
    position: usize,
    /// Byte length of the fragment text.
    len: usize,
    /// Compiled fragment, or the error that prevented compilation.
    ast: Result<Ast, SyntaxError>,
}

/// Scans a text template and substitutes evaluated fragment values.
pub struct TextProcessor {
    source: String,
    fragments: Vec<Fragment>,
}

impl TextProcessor {
    pub fn new(source: impl Into<String>, functions: &Functions) -> Self {
        let mut processor = Self {
            source: source.into(),
            fragments: Vec::new(),
        };
        processor.scan(functions);
        processor
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Substitute every compiled fragment with its evaluated value.
    ///
    /// Fragments are replaced back to front so earlier positions stay
    /// valid. A fragment that failed to compile reports an evaluation
    /// diagnostic and is left as-is; a fragment whose evaluation reports
    /// diagnostics substitutes the sentinel `undefined`.
    pub fn process(
        &mut self,
        model: &serde_json::Value,
        state: &serde_json::Value,
        functions: &Functions,
        rescan: bool,
        diags: &mut Diagnostics,
    ) -> String {
        if self.source.is_empty() {
            return String::new();
        }
        if rescan {
            self.scan(functions);
        }
        let mut result = self.source.clone();
        for fragment in self.fragments.iter().rev() {
            match &fragment.ast {
                Ok(ast) => {
                    let before = diags.len();
                    let value = interpret(ast, model, state, functions, diags);
                    let rendered = if diags.len() > before {
                        "undefined".to_string()
                    } else {
                        value.to_string()
                    };
                    result.replace_range(
                        fragment.position..fragment.position + fragment.len,
                        &rendered,
                    );
                }
                Err(err) => {
                    diags.evaluation(&self.source, &err.message, err.position);
                }
            }
        }
        result
    }

    fn scan(&mut self, functions: &Functions) {
        let mut scanner = Scanner {
            source: &self.source,
            functions,
            current: 0,
            start: 0,
            fragments: Vec::new(),
        };
        scanner.run();
        self.fragments = scanner.fragments;
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Scanner<'a> {
    source: &'a str,
    functions: &'a Functions,
    /// Byte cursor, always on a char boundary.
    current: usize,
    start: usize,
    fragments: Vec<Fragment>,
}

impl Scanner<'_> {
    fn run(&mut self) {
        while !self.at_end() {
            self.start = self.current;
            match self.advance() {
                '$' => self.variable(FragmentKind::Model),
                '#' => self.variable(FragmentKind::State),
                c if is_ident_start(c) => self.function(),
                _ => {}
            }
        }
    }

    /// `$`/`#` followed by an optional dotted identifier path. A trailing
    /// dot belongs to the surrounding text, not the path.
    fn variable(&mut self, kind: FragmentKind) {
        if is_ident_start(self.peek()) {
            while !self.at_end() {
                while is_ident_continue(self.peek()) {
                    self.advance();
                }
                if self.peek() == '.' && is_ident_start(self.peek_next()) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.add_fragment(kind);
    }

    /// An identifier; only registered names become fragments. With a
    /// following `(` the balanced argument list is included; if the
    /// parentheses never balance the whole stretch stays inert.
    fn function(&mut self) {
        while is_ident_continue(self.peek()) {
            self.advance();
        }
        let identifier = &self.source[self.start..self.current];
        if !self.functions.contains(identifier) {
            return;
        }
        if self.peek() == '(' {
            self.arguments();
            if self.peek() == ')' {
                self.advance();
                self.add_fragment(FragmentKind::Function);
            }
            return;
        }
        self.add_fragment(FragmentKind::FunctionExpr);
    }

    /// Advance over a balanced-parenthesis argument list, stopping on the
    /// closing parenthesis or at the end of the template.
    fn arguments(&mut self) {
        let mut depth = 0usize;
        while !self.at_end() {
            match self.peek() {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
            if depth == 0 {
                return;
            }
            self.advance();
        }
    }

    fn add_fragment(&mut self, kind: FragmentKind) {
        let text = &self.source[self.start..self.current];
        let ast = compile_fragment(text, self.start, kind);
        self.fragments.push(Fragment {
            position: self.start,
            len: text.len(),
            ast,
        });
    }

    fn at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.peek();
        self.current += c.len_utf8();
        c
    }

    fn peek(&self) -> char {
        self.source[self.current..].chars().next().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        let mut chars = self.source[self.current..].chars();
        chars.next();
        chars.next().unwrap_or('\0')
    }
}

/// Lex and parse a fragment with the entry point matching its kind. The
/// byte offset keeps diagnostic positions relative to the whole template.
fn compile_fragment(text: &str, offset: usize, kind: FragmentKind) -> Result<Ast, SyntaxError> {
    let tokens = lexer::scan(text, offset)?;
    match kind {
        FragmentKind::Model => Parser::parse_model(text, &tokens),
        FragmentKind::State => Parser::parse_state(text, &tokens),
        FragmentKind::Function => Parser::parse_function(text, &tokens),
        FragmentKind::FunctionExpr => Parser::parse_function_expr(text, &tokens),
    }
}
