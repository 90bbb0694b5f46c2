//! Plugin surface for collaborators that contribute functions and
//! constraints, possibly fetched asynchronously.

use serde::Serialize;

use crate::error::Error;
use crate::system::{ConstraintSystem, EvaluationFilter, Report};

/// A contributor of functions and constraints.
///
/// Registration runs in two sequential phases: functions first, then
/// constraints, so registered constraints can already reference the
/// plugin's own functions. Both phases are async to allow fetching
/// definitions from external sources.
#[allow(async_fn_in_trait)]
pub trait ConstraintSystemPlugin<M, S> {
    async fn register_functions(&self, system: &mut ConstraintSystem<M, S>) -> Result<(), Error>;

    async fn register_constraints(&self, system: &mut ConstraintSystem<M, S>) -> Result<(), Error>;
}

/// Owns a [`ConstraintSystem`] and wires plugins into it.
pub struct PluginHost<M, S> {
    system: ConstraintSystem<M, S>,
}

impl<M, S> Default for PluginHost<M, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, S> PluginHost<M, S> {
    pub fn new() -> Self {
        Self {
            system: ConstraintSystem::new(),
        }
    }

    pub async fn init(&mut self, plugin: &impl ConstraintSystemPlugin<M, S>) -> Result<(), Error> {
        self.system.register_plugin(plugin).await
    }

    pub fn system(&self) -> &ConstraintSystem<M, S> {
        &self.system
    }

    pub fn system_mut(&mut self) -> &mut ConstraintSystem<M, S> {
        &mut self.system
    }
}

impl<M: Serialize, S: Serialize> PluginHost<M, S> {
    pub fn evaluate<'a>(
        &self,
        models: &'a [M],
        state: &'a S,
        filter: &EvaluationFilter,
    ) -> Result<Vec<Report<'a, M, S>>, Error> {
        self.system.evaluate(models, state, filter)
    }
}
