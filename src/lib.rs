//! # Noema - a BDI-style agent reasoning runtime
//!
//! Noema lets host applications define agents whose behavior is literal
//! rewriting and plan execution rather than imperative control flow:
//! beliefs and goals are literals, mutation emits triggers, triggers select
//! plans through unification, and every executable unit reports a fuzzy
//! (truth, confidence-degree) outcome.
//!
//! ## Core Concepts
//!
//! - **Term / Literal**: the data model - terms, variables, and named,
//!   possibly-negated facts with ordered arguments and annotations
//! - **Trigger**: an event descriptor (belief or goal, added or removed)
//!   that drives plan selection
//! - **Unification**: structural matching of data literals against
//!   variable-carrying templates, sequentially or as a parallel race
//! - **Fuzzy value**: the universal (bool, degree) result of executable
//!   units, aggregated by union/intersection reducers
//! - **View**: a named node in the belief tree, backed by a pluggable
//!   storage
//!
//! ## Usage
//!
//! ```
//! use noema::{Agent, Execution, Literal, Plan, Term, Trigger, Variable};
//!
//! // +!greet(X) <- success.
//! let plan = Plan::builder()
//!     .trigger(Trigger::add_goal(Literal::new(
//!         "greet",
//!         vec![Term::Variable(Variable::shared(noema::Path::from("X")))],
//!     )))
//!     .element(Execution::Constant(true))
//!     .build()
//!     .unwrap();
//!
//! let agent = Agent::builder().plan(plan).build().unwrap();
//! agent.raise_goal(Literal::new("greet", vec![Term::from("world")]));
//! let report = agent.cycle();
//! assert_eq!(report.executed, 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Data model
pub mod error;
pub mod fuzzy;
pub mod literal;
pub mod path;
pub mod term;
pub mod trigger;
pub mod variable;

// Reasoning machinery
pub mod action;
pub mod agent;
pub mod beliefbase;
pub mod config;
pub mod context;
pub mod execution;
pub mod expression;
pub mod lambda;
pub mod plan;
pub mod rule;
pub mod unify;

// Re-export primary types at crate root for convenience
pub use action::{Action, ActionRegistry, FnAction};
pub use agent::{Agent, AgentId, CloneBeliefs, CycleReport, RunState, RunningPlanRecord};
pub use beliefbase::{EmptyStorage, MemoryStorage, Storage, ViewArena, ViewGenerator, ViewId};
pub use config::RuntimeConfig;
pub use context::{Context, Instantiable};
pub use error::{ConfigurationError, ExecutionError, NoemaError, NoemaResult};
pub use execution::{
    execute, execute_all, BeliefActionKind, Execution, LambdaExecution, LambdaSource,
    UnifyExecution,
};
pub use expression::{BinaryOp, Expression, UnaryOp};
pub use fuzzy::{Defuzzifier, FuzzyAccumulator, FuzzyOperator, FuzzyValue, Intersection, Union};
pub use lambda::{FnLambdaStream, LambdaRegistry, LambdaStream};
pub use literal::{Literal, LiteralBuilder, LiteralSignature};
pub use path::Path;
pub use plan::{Annotation, AnnotationKind, Plan, PlanBuilder, PlanState};
pub use rule::{Rule, RuleEntry, RuleLibrary};
pub use term::{OpaqueValue, Term, TermKind, TermSet};
pub use trigger::{Trigger, TriggerKind, TriggerSignature};
pub use unify::Unifier;
pub use variable::Variable;
