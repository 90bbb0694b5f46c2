// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Constraint-definition and evaluation engine.
//!
//! Constraints are written in a small rule DSL (`activation : assertion`)
//! and evaluated against a serializable model and state:
//!
//! ```
//! use covenant::{ConstraintData, ConstraintSystem, EvaluationFilter};
//! use serde_json::json;
//!
//! let mut system: ConstraintSystem<serde_json::Value, serde_json::Value> =
//!     ConstraintSystem::new();
//! system
//!     .add_constraint(ConstraintData::with_message(
//!         "WHEN $x > $y: $y * $y == #z",
//!         "z is #z",
//!     ))
//!     .unwrap();
//!
//! let model = json!({"x": 4, "y": 2});
//! let state = json!({"z": 5});
//! let report = system
//!     .evaluate_one(&model, &state, &EvaluationFilter::All)
//!     .unwrap();
//! assert!(!report.evaluation[0].consistent);
//! assert_eq!(report.evaluation[0].message, "z is 5");
//! ```
//!
//! Compilation errors (bad DSL source, duplicate function names) surface at
//! registration time; evaluation-time faults are reported as inconsistency
//! and never abort a batch. The DSL pipeline itself lives in the
//! [`covenant_dsl`] crate and is re-exported under [`dsl`].

pub mod constraint;
pub mod error;
pub mod plugin;
pub mod system;

pub use covenant_dsl as dsl;

pub use constraint::{Constraint, ConstraintData, Evaluation};
pub use dsl::Value;
pub use error::Error;
pub use plugin::{ConstraintSystemPlugin, PluginHost};
pub use system::{ConstraintSystem, EvaluationFilter, Report, StatBucket, StatisticsReport};
