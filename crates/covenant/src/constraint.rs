//! A single compiled constraint.
//!
//! Compilation (lex and parse) happens once, eagerly, in [`Constraint::new`]
//! and fails fast on bad DSL source. Evaluation never fails: runtime faults
//! are collected per evaluation and reported as inconsistency.

use std::cell::{Cell, RefCell};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use covenant_dsl::{lexer, Ast, Diagnostics, Functions, Parser, SyntaxError, TextProcessor};

/// The raw definition a constraint is compiled from: the DSL source, an
/// optional failure message template, and any extra payload fields the host
/// application attaches (carried through verbatim into evaluations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintData {
    pub constraint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConstraintData {
    pub fn new(constraint: impl Into<String>) -> Self {
        Self {
            constraint: constraint.into(),
            message: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_message(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            constraint: constraint.into(),
            message: Some(message.into()),
            extra: serde_json::Map::new(),
        }
    }
}

/// The outcome of evaluating one constraint against one model/state pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub consistent: bool,
    /// Interpolated failure message; empty when consistent or when the
    /// constraint has no message template.
    pub message: String,
    /// The definition this evaluation belongs to.
    pub resource: ConstraintData,
}

/// One compiled rule: `activation : assertion` plus an optional message
/// template.
///
/// The AST is immutable after construction. The message processor is built
/// lazily on the first inconsistent evaluation and re-scanned whenever the
/// function table has grown since the last scan (registration changes which
/// template identifiers count as fragments).
pub struct Constraint {
    data: ConstraintData,
    ast: Ast,
    processor: RefCell<Option<TextProcessor>>,
    scanned_generation: Cell<u64>,
}

impl Constraint {
    /// Compile `data.constraint`. Syntax errors fail construction so bad
    /// configuration is rejected at registration time.
    pub fn new(data: ConstraintData) -> Result<Self, SyntaxError> {
        let ast = compile(&data.constraint)?;
        Ok(Self {
            data,
            ast,
            processor: RefCell::new(None),
            scanned_generation: Cell::new(0),
        })
    }

    pub fn data(&self) -> &ConstraintData {
        &self.data
    }

    /// Pure consistency check, no message computation.
    ///
    /// A constraint is consistent when its root evaluates truthy and the
    /// evaluation reported no diagnostics; a fault anywhere in the tree
    /// (missing attribute, unregistered function, division by zero) makes
    /// the constraint inconsistent rather than aborting the batch.
    pub fn is_consistent(
        &self,
        model: &serde_json::Value,
        state: &serde_json::Value,
        functions: &Functions,
    ) -> bool {
        let mut diags = Diagnostics::new();
        let value = covenant_dsl::interpret(&self.ast, model, state, functions, &mut diags);
        value.is_truthy() && diags.is_empty()
    }

    /// Evaluate consistency and, when inconsistent, interpolate the failure
    /// message template.
    pub fn evaluate(
        &self,
        model: &serde_json::Value,
        state: &serde_json::Value,
        functions: &Functions,
    ) -> Evaluation {
        let consistent = self.is_consistent(model, state, functions);
        let message = if consistent {
            String::new()
        } else {
            self.render_message(model, state, functions)
        };
        Evaluation {
            consistent,
            message,
            resource: self.data.clone(),
        }
    }

    /// Parse-time model variable occurrence counts, keyed by dotted path.
    pub fn model_var_occurrences(&self) -> &IndexMap<String, usize> {
        &self.ast.stats.model
    }

    /// Parse-time state variable occurrence counts, keyed by dotted path.
    pub fn state_var_occurrences(&self) -> &IndexMap<String, usize> {
        &self.ast.stats.state
    }

    fn render_message(
        &self,
        model: &serde_json::Value,
        state: &serde_json::Value,
        functions: &Functions,
    ) -> String {
        let Some(template) = &self.data.message else {
            return String::new();
        };
        let mut slot = self.processor.borrow_mut();
        let rescan = match slot.as_ref() {
            // The previous scan is stale once the function table changed.
            Some(_) => self.scanned_generation.get() != functions.generation(),
            None => false,
        };
        let processor =
            slot.get_or_insert_with(|| TextProcessor::new(template.clone(), functions));
        self.scanned_generation.set(functions.generation());
        let mut diags = Diagnostics::new();
        processor.process(model, state, functions, rescan, &mut diags)
    }
}

impl std::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraint")
            .field("data", &self.data)
            .field("ast", &self.ast.to_string())
            .finish()
    }
}

fn compile(source: &str) -> Result<Ast, SyntaxError> {
    let result = lexer::scan(source, 0).and_then(|tokens| Parser::parse(source, &tokens));
    match &result {
        Ok(ast) => tracing::debug!(%source, ast = %ast, "compiled constraint"),
        Err(err) => tracing::error!("{}", err.to_diagnostic(source)),
    }
    result
}
