//! Constraint system: the shared function table plus the compiled
//! constraint list, evaluated together against typed models and states.

use std::marker::PhantomData;

use indexmap::IndexMap;
use serde::Serialize;

use covenant_dsl::{Diagnostics, Functions, TextProcessor, Value};

use crate::constraint::{Constraint, ConstraintData, Evaluation};
use crate::error::Error;
use crate::plugin::ConstraintSystemPlugin;

/// Selects which evaluations a [`Report`] keeps.
pub enum EvaluationFilter {
    All,
    Consistent,
    Inconsistent,
    /// Keep evaluations whose constraint definition matches a predicate.
    Resource(Box<dyn Fn(&ConstraintData) -> bool>),
}

impl EvaluationFilter {
    fn keep(&self, evaluation: &Evaluation) -> bool {
        match self {
            EvaluationFilter::All => true,
            EvaluationFilter::Consistent => evaluation.consistent,
            EvaluationFilter::Inconsistent => !evaluation.consistent,
            EvaluationFilter::Resource(predicate) => predicate(&evaluation.resource),
        }
    }
}

impl Default for EvaluationFilter {
    fn default() -> Self {
        EvaluationFilter::All
    }
}

/// The full evaluation result for one model/state pair.
///
/// `checked_constraints` always lists every registered constraint; the
/// filter applies to `evaluation` only.
#[derive(Debug, Serialize)]
pub struct Report<'a, M, S> {
    pub checked_model: &'a M,
    pub checked_state: &'a S,
    pub checked_constraints: Vec<ConstraintData>,
    pub evaluation: Vec<Evaluation>,
}

/// Variable-occurrence tallies for one consistency outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatBucket {
    /// Number of constraints that landed in this bucket.
    pub total: usize,
    /// Model variable occurrences summed over the bucket, by dotted path.
    pub model: IndexMap<String, usize>,
    /// State variable occurrences summed over the bucket, by dotted path.
    pub state: IndexMap<String, usize>,
}

impl StatBucket {
    fn absorb(&mut self, constraint: &Constraint) {
        self.total += 1;
        for (path, count) in constraint.model_var_occurrences() {
            *self.model.entry(path.clone()).or_insert(0) += count;
        }
        for (path, count) in constraint.state_var_occurrences() {
            *self.state.entry(path.clone()).or_insert(0) += count;
        }
    }
}

/// Which variables correlate with failures: per-outcome occurrence tallies
/// for one model/state pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    pub total_constraints: usize,
    pub consistent: StatBucket,
    pub inconsistent: StatBucket,
}

/// A set of compiled constraints and registered functions, evaluated
/// against models of type `M` and states of type `S`.
///
/// Models and states are serialized to JSON at the evaluation boundary;
/// the DSL addresses their fields through that representation.
pub struct ConstraintSystem<M, S> {
    functions: Functions,
    constraints: Vec<Constraint>,
    _marker: PhantomData<fn(&M, &S)>,
}

impl<M, S> Default for ConstraintSystem<M, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, S> ConstraintSystem<M, S> {
    pub fn new() -> Self {
        Self {
            functions: Functions::new(),
            constraints: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Compile and append a constraint. Bad DSL source is rejected here,
    /// before any evaluation.
    pub fn add_constraint(&mut self, data: ConstraintData) -> Result<(), Error> {
        self.constraints.push(Constraint::new(data)?);
        Ok(())
    }

    pub fn add_constraints(
        &mut self,
        data: impl IntoIterator<Item = ConstraintData>,
    ) -> Result<(), Error> {
        for item in data {
            self.add_constraint(item)?;
        }
        Ok(())
    }

    /// Register a custom function, callable as `NAME(args...)` in
    /// constraints and message templates. Duplicate names are rejected.
    pub fn add_function(
        &mut self,
        name: impl Into<String>,
        function: impl Fn(&[Value]) -> Value + 'static,
    ) -> Result<(), Error> {
        self.functions.register(name, function)?;
        Ok(())
    }

    /// Register a statement: referenced by bare name, invoked with the
    /// whole model and state.
    pub fn add_statement(
        &mut self,
        name: impl Into<String>,
        statement: impl Fn(&Value, &Value) -> Value + 'static,
    ) -> Result<(), Error> {
        self.functions.register(name, move |args: &[Value]| {
            let model = args.first().cloned().unwrap_or(Value::Null);
            let state = args.get(1).cloned().unwrap_or(Value::Null);
            statement(&model, &state)
        })?;
        Ok(())
    }

    /// Run both registration phases of a plugin, functions first so that
    /// the plugin's own constraints can already reference them.
    pub async fn register_plugin<P>(&mut self, plugin: &P) -> Result<(), Error>
    where
        P: ConstraintSystemPlugin<M, S>,
    {
        plugin.register_functions(self).await?;
        plugin.register_constraints(self).await?;
        tracing::info!(plugin = %std::any::type_name::<P>(), "registered plugin");
        Ok(())
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }
}

impl<M: Serialize, S: Serialize> ConstraintSystem<M, S> {
    /// Evaluate every constraint against every model, producing one report
    /// per model. The state is fixed across the call; the filter selects
    /// which evaluations each report keeps.
    pub fn evaluate<'a>(
        &self,
        models: &'a [M],
        state: &'a S,
        filter: &EvaluationFilter,
    ) -> Result<Vec<Report<'a, M, S>>, Error> {
        let state_json = serde_json::to_value(state)?;
        models
            .iter()
            .map(|model| self.report(model, state, &state_json, filter))
            .collect()
    }

    /// Single-model convenience wrapper around [`ConstraintSystem::evaluate`].
    pub fn evaluate_one<'a>(
        &self,
        model: &'a M,
        state: &'a S,
        filter: &EvaluationFilter,
    ) -> Result<Report<'a, M, S>, Error> {
        let state_json = serde_json::to_value(state)?;
        self.report(model, state, &state_json, filter)
    }

    fn report<'a>(
        &self,
        model: &'a M,
        state: &'a S,
        state_json: &serde_json::Value,
        filter: &EvaluationFilter,
    ) -> Result<Report<'a, M, S>, Error> {
        let model_json = serde_json::to_value(model)?;
        let evaluation = self
            .constraints
            .iter()
            .map(|constraint| constraint.evaluate(&model_json, state_json, &self.functions))
            .filter(|evaluation| filter.keep(evaluation))
            .collect();
        Ok(Report {
            checked_model: model,
            checked_state: state,
            checked_constraints: self
                .constraints
                .iter()
                .map(|constraint| constraint.data().clone())
                .collect(),
            evaluation,
        })
    }

    /// Check every constraint and accumulate its variable-occurrence counts
    /// into the bucket matching its outcome.
    pub fn evaluate_statistics(&self, model: &M, state: &S) -> Result<StatisticsReport, Error> {
        let model_json = serde_json::to_value(model)?;
        let state_json = serde_json::to_value(state)?;
        let mut consistent = StatBucket::default();
        let mut inconsistent = StatBucket::default();
        for constraint in &self.constraints {
            if constraint.is_consistent(&model_json, &state_json, &self.functions) {
                consistent.absorb(constraint);
            } else {
                inconsistent.absorb(constraint);
            }
        }
        Ok(StatisticsReport {
            total_constraints: self.constraints.len(),
            consistent,
            inconsistent,
        })
    }

    /// Number of constraints consistent for this model/state pair. Not
    /// cached; every call re-evaluates the full constraint list.
    pub fn num_consistent_constraints(&self, model: &M, state: &S) -> Result<usize, Error> {
        let model_json = serde_json::to_value(model)?;
        let state_json = serde_json::to_value(state)?;
        Ok(self
            .constraints
            .iter()
            .filter(|constraint| {
                constraint.is_consistent(&model_json, &state_json, &self.functions)
            })
            .count())
    }

    pub fn num_inconsistent_constraints(&self, model: &M, state: &S) -> Result<usize, Error> {
        Ok(self.num_constraints() - self.num_consistent_constraints(model, state)?)
    }

    /// One-off template interpolation outside any constraint.
    pub fn get_message(&self, template: &str, model: &M, state: &S) -> Result<String, Error> {
        let model_json = serde_json::to_value(model)?;
        let state_json = serde_json::to_value(state)?;
        let mut processor = TextProcessor::new(template, &self.functions);
        let mut diags = Diagnostics::new();
        Ok(processor.process(&model_json, &state_json, &self.functions, false, &mut diags))
    }
}
