//! The action contract - external capabilities invoked from plan bodies.
//!
//! Actions are registered under their name in an explicit registry built at
//! agent-construction time; there is no runtime reflection. The invocation
//! boundary is a hard fault barrier: panics and arity violations are caught,
//! logged, and converted into a single failing fuzzy value. Actions never
//! propagate exceptions into the reasoning cycle.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::context::Context;
use crate::fuzzy::{FuzzyOperator, FuzzyValue, Intersection};
use crate::path::Path;
use crate::term::Term;

/// An external capability.
///
/// Implementations may append zero or more result terms to `returns` and
/// must yield at least one fuzzy value reflecting overall success.
pub trait Action: Send + Sync {
    /// The name the action is registered under.
    fn name(&self) -> Path;

    /// Minimum number of arguments the action accepts.
    fn min_arity(&self) -> usize {
        0
    }

    /// Executes the action.
    fn execute(
        &self,
        parallel: bool,
        ctx: &Context,
        args: &[Term],
        returns: &mut Vec<Term>,
    ) -> Vec<FuzzyValue<bool>>;
}

/// An action wrapping a plain closure.
pub struct FnAction {
    name: Path,
    min_arity: usize,
    #[allow(clippy::type_complexity)]
    func: Box<
        dyn Fn(bool, &Context, &[Term], &mut Vec<Term>) -> Vec<FuzzyValue<bool>> + Send + Sync,
    >,
}

impl FnAction {
    /// Wraps a closure as an action.
    #[must_use]
    pub fn new(
        name: impl Into<Path>,
        min_arity: usize,
        func: impl Fn(bool, &Context, &[Term], &mut Vec<Term>) -> Vec<FuzzyValue<bool>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            min_arity,
            func: Box::new(func),
        }
    }
}

impl Action for FnAction {
    fn name(&self) -> Path {
        self.name.clone()
    }

    fn min_arity(&self) -> usize {
        self.min_arity
    }

    fn execute(
        &self,
        parallel: bool,
        ctx: &Context,
        args: &[Term],
        returns: &mut Vec<Term>,
    ) -> Vec<FuzzyValue<bool>> {
        (self.func)(parallel, ctx, args, returns)
    }
}

/// Name-to-action map built at agent construction time.
#[derive(Default, Clone)]
pub struct ActionRegistry {
    actions: HashMap<Path, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action under its name, replacing any previous one.
    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.name(), action);
    }

    /// Looks up an action.
    #[must_use]
    pub fn get(&self, name: &Path) -> Option<Arc<dyn Action>> {
        self.actions.get(name).map(Arc::clone)
    }

    /// Number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if no action is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Invokes an action through the fault barrier.
    ///
    /// Missing actions, arity violations, panics, and empty result streams
    /// all collapse into a failing fuzzy value with a logged diagnostic.
    #[must_use]
    pub fn invoke(
        &self,
        name: &Path,
        parallel: bool,
        ctx: &Context,
        args: &[Term],
        returns: &mut Vec<Term>,
    ) -> FuzzyValue<bool> {
        let Some(action) = self.get(name) else {
            tracing::warn!(action = %name, "action not registered");
            return FuzzyValue::truth(false);
        };

        if args.len() < action.min_arity() {
            tracing::warn!(
                action = %name,
                given = args.len(),
                required = action.min_arity(),
                "action called with too few arguments"
            );
            return FuzzyValue::truth(false);
        }

        let mut collected = Vec::new();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            action.execute(parallel, ctx, args, &mut collected)
        }));

        match outcome {
            Ok(values) if values.is_empty() => {
                tracing::warn!(action = %name, "action returned no result value");
                FuzzyValue::truth(false)
            }
            Ok(values) => {
                returns.append(&mut collected);
                Intersection.collect(values)
            }
            Err(_) => {
                tracing::warn!(action = %name, "action panicked; converted to fail");
                FuzzyValue::truth(false)
            }
        }
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}
