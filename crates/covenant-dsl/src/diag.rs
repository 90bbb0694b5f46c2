//! Structured diagnostics with caret-aligned source rendering.
//!
//! Syntax errors abort compilation and surface as [`SyntaxError`]; runtime
//! faults are collected into a [`Diagnostics`] sink so evaluation can report
//! a problem and still produce a value (see the interpreter contract).

use std::fmt;

/// Error category, used as the heading of a rendered diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Syntax,
    Runtime,
    Evaluation,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Syntax => write!(f, "Syntax"),
            Category::Runtime => write!(f, "Runtime"),
            Category::Evaluation => write!(f, "Evaluation"),
        }
    }
}

/// A single diagnostic: what went wrong, where, and in which source text.
///
/// Rendered with the full source and a caret pointing at `position` so that
/// authoring constraints is self-debuggable without external tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub category: Category,
    /// The original source text the position refers to.
    pub source: String,
    pub message: String,
    /// Absolute byte offset of the offending location in `source`.
    pub position: usize,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} error in:", self.category)?;
        writeln!(f, "{}", self.source)?;
        write!(f, "{}^~~~~~ {}.", " ".repeat(self.position), self.message)
    }
}

/// Fatal lexing/parsing error.
///
/// Carries the message and absolute source position; the surrounding
/// source text is known to the caller, which can render a full
/// [`Diagnostic`] via [`SyntaxError::to_diagnostic`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} (at position {position})")]
pub struct SyntaxError {
    pub message: String,
    pub position: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }

    pub fn to_diagnostic(&self, source: &str) -> Diagnostic {
        Diagnostic {
            category: Category::Syntax,
            source: source.to_string(),
            message: self.message.clone(),
            position: self.position,
        }
    }
}

/// Collector for non-fatal diagnostics emitted during evaluation.
///
/// The interpreter and text processor report faults here and keep going;
/// the constraint layer inspects the sink to decide consistency. Every
/// reported diagnostic is also logged.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        tracing::warn!("{diagnostic}");
        self.items.push(diagnostic);
    }

    /// Report a runtime fault at `position` within `source`.
    pub fn runtime(&mut self, source: &str, message: impl Into<String>, position: usize) {
        self.report(Diagnostic {
            category: Category::Runtime,
            source: source.to_string(),
            message: message.into(),
            position,
        });
    }

    /// Report an evaluation fault (e.g. a message fragment that failed to
    /// parse) at `position` within `source`.
    pub fn evaluation(&mut self, source: &str, message: impl Into<String>, position: usize) {
        self.report(Diagnostic {
            category: Category::Evaluation,
            source: source.to_string(),
            message: message.into(),
            position,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_renders_caret_at_position() {
        let diag = Diagnostic {
            category: Category::Runtime,
            source: "ALWAYS: 1 / 0".to_string(),
            message: "Division by zero".to_string(),
            position: 10,
        };
        let rendered = diag.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "Runtime error in:");
        assert_eq!(lines[1], "ALWAYS: 1 / 0");
        assert_eq!(lines[2], "          ^~~~~~ Division by zero.");
    }

    #[test]
    fn sink_collects_and_counts() {
        let mut diags = Diagnostics::new();
        assert!(diags.is_empty());
        diags.runtime("ALWAYS: $x", "Given model has no attribute 'x'", 8);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.items()[0].category, Category::Runtime);
    }
}
