//! Execution contexts - the per-activation variable scope.
//!
//! A context ties a running plan or rule instance to its agent and to the
//! variable cells the body reads and writes. Duplication produces an
//! isolated scope (fresh, unbound cells) that stays attributable to the
//! same logical instance; this is how recursive and nested activations
//! avoid sharing mutable state.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::agent::Agent;
use crate::error::{ExecutionError, NoemaError, NoemaResult};
use crate::path::Path;
use crate::plan::Plan;
use crate::rule::Rule;
use crate::term::Term;
use crate::variable::Variable;

/// The instance a context belongs to: a plan or a rule.
#[derive(Clone)]
pub enum Instantiable {
    /// A plan instance.
    Plan(Arc<Plan>),
    /// A rule instance.
    Rule(Arc<Rule>),
}

impl Instantiable {
    /// Structural hash of the owning instance.
    #[must_use]
    pub fn structural_hash(&self) -> u64 {
        match self {
            Self::Plan(plan) => plan.structural_hash(),
            Self::Rule(rule) => rule.structural_hash(),
        }
    }

    /// Template variables declared by the instance.
    #[must_use]
    pub fn variables(&self) -> Vec<Arc<Variable>> {
        match self {
            Self::Plan(plan) => plan.variables(),
            Self::Rule(rule) => rule.variables(),
        }
    }
}

impl fmt::Debug for Instantiable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plan(plan) => write!(f, "Instantiable::Plan({})", plan.trigger()),
            Self::Rule(rule) => write!(f, "Instantiable::Rule({})", rule.identifier()),
        }
    }
}

/// The per-activation variable scope.
///
/// The variable map is keyed by fully-qualified variable path; on duplicate
/// keys the first cell wins. The hash combines agent, instance, and key
/// hashes by XOR and exists for structural comparison in tests only, never
/// for identity.
#[derive(Clone)]
pub struct Context {
    agent: Agent,
    instance: Instantiable,
    variables: HashMap<Path, Arc<Variable>>,
    hash: u64,
}

impl Context {
    /// Creates a context over the given variable cells.
    #[must_use]
    pub fn new(
        agent: Agent,
        instance: Instantiable,
        variables: impl IntoIterator<Item = Arc<Variable>>,
    ) -> Self {
        let mut map: HashMap<Path, Arc<Variable>> = HashMap::new();
        for var in variables {
            map.entry(var.name().clone()).or_insert(var);
        }

        let mut hash = hash_of(&agent.id()) ^ instance.structural_hash();
        for key in map.keys() {
            hash ^= hash_of(key);
        }

        Self {
            agent,
            instance,
            variables: map,
            hash,
        }
    }

    /// The owning agent handle.
    #[must_use]
    pub const fn agent(&self) -> &Agent {
        &self.agent
    }

    /// The owning plan or rule.
    #[must_use]
    pub const fn instance(&self) -> &Instantiable {
        &self.instance
    }

    /// The live variable map used by body elements.
    #[must_use]
    pub const fn instance_variables(&self) -> &HashMap<Path, Arc<Variable>> {
        &self.variables
    }

    /// Looks up a variable cell by name.
    #[must_use]
    pub fn variable(&self, name: &Path) -> Option<Arc<Variable>> {
        self.variables.get(name).map(Arc::clone)
    }

    /// Resolves a variable name to its bound value.
    #[must_use]
    pub fn resolve(&self, name: &Path) -> Option<Term> {
        self.variables.get(name).and_then(|v| v.raw())
    }

    /// Binds a context variable by name.
    ///
    /// # Errors
    ///
    /// Returns an execution error if the variable is not in scope, or a
    /// type mismatch if its restriction rejects the value.
    pub fn bind(&self, name: &Path, value: Term) -> NoemaResult<()> {
        let var = self.variables.get(name).ok_or_else(|| {
            NoemaError::Execution(ExecutionError::MissingVariable { name: name.clone() })
        })?;
        var.bind(value)
    }

    /// Copies the values of already-bound cells into this context's
    /// same-named cells. Cells without a counterpart are ignored; cells
    /// whose restriction rejects the value stay unbound.
    pub fn commit_bindings(&self, bound: &[Arc<Variable>]) {
        for var in bound {
            if let (Some(target), Some(value)) = (self.variables.get(var.name()), var.raw()) {
                let _ = target.bind(value);
            }
        }
    }

    /// Creates an isolated scope: same agent, same instance, fresh unbound
    /// copies of every current variable, plus the supplied extras. Extras
    /// win on name collisions.
    #[must_use]
    pub fn duplicate(&self, extra: impl IntoIterator<Item = Arc<Variable>>) -> Self {
        Self::new(
            self.agent.clone(),
            self.instance.clone(),
            extra.into_iter().chain(
                self.variables
                    .values()
                    .map(|v| v.shallow_copy_shared()),
            ),
        )
    }

    /// Structural hash, for tests.
    #[must_use]
    pub const fn structural_hash(&self) -> u64 {
        self.hash
    }
}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Context {}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("agent", &self.agent.id())
            .field("instance", &self.instance)
            .field("variables", &self.variables.keys().collect::<Vec<_>>())
            .finish()
    }
}
