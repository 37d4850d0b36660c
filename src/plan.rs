//! Plans - trigger-selected units of behavior.
//!
//! A plan owns its trigger, a head literal with an optional guard, an
//! ordered body, and an annotation map. Plans are built once at load time
//! and stay immutable afterwards except for the run/fail counters and the
//! state machine, both of which move only as a side effect of `execute`.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;

use crate::context::{Context, Instantiable};
use crate::error::ConfigurationError;
use crate::execution::{execute, execute_all, Execution};
use crate::expression::Expression;
use crate::fuzzy::{FuzzyOperator, FuzzyValue, Intersection};
use crate::literal::Literal;
use crate::path::Path;
use crate::term::{digest64, Term};
use crate::trigger::Trigger;
use crate::variable::Variable;

/// Plan execution states. Success is the rest state; transitions happen
/// only as a side effect of `execute` (a waiting barrier parks the plan in
/// `Suspend` until the body settles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanState {
    /// Last execution succeeded (or the plan never ran).
    #[default]
    Success,
    /// Last execution failed.
    Fail,
    /// The body is parked at a barrier.
    Suspend,
}

/// Identifies an annotation slot; at most one value per kind.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    Atomic,
    Parallel,
    FuzzyWeight,
    Constant,
    Tag,
    Description,
    VariableDescription,
}

impl AnnotationKind {
    /// Returns the annotation keyword.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::Parallel => "parallel",
            Self::FuzzyWeight => "fuzzy",
            Self::Constant => "constant",
            Self::Tag => "tag",
            Self::Description => "description",
            Self::VariableDescription => "variabledescription",
        }
    }
}

/// A plan annotation.
#[derive(Debug, Clone)]
pub enum Annotation {
    /// Body short-circuits to success.
    Atomic,
    /// Body elements execute concurrently.
    Parallel,
    /// Weight applied to the aggregated body result (default 1.0).
    FuzzyWeight(f64),
    /// A named constant bound into every activation.
    Constant {
        /// Constant name.
        name: Path,
        /// Constant value.
        value: Term,
    },
    /// Free-form tag.
    Tag(String),
    /// Human-readable plan description.
    Description(String),
    /// Documentation for one plan variable.
    VariableDescription {
        /// Variable name.
        name: Path,
        /// Documentation text.
        text: String,
    },
}

impl Annotation {
    /// The slot this annotation occupies.
    #[must_use]
    pub const fn kind(&self) -> AnnotationKind {
        match self {
            Self::Atomic => AnnotationKind::Atomic,
            Self::Parallel => AnnotationKind::Parallel,
            Self::FuzzyWeight(_) => AnnotationKind::FuzzyWeight,
            Self::Constant { .. } => AnnotationKind::Constant,
            Self::Tag(_) => AnnotationKind::Tag,
            Self::Description(_) => AnnotationKind::Description,
            Self::VariableDescription { .. } => AnnotationKind::VariableDescription,
        }
    }
}

/// A trigger-selected unit of behavior.
pub struct Plan {
    trigger: Trigger,
    head: Literal,
    guard: Option<Expression>,
    body: Vec<Execution>,
    annotations: HashMap<AnnotationKind, Annotation>,
    template: Vec<Arc<Variable>>,
    state: RwLock<PlanState>,
    runs: AtomicU64,
    fails: AtomicU64,
}

impl Plan {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> PlanBuilder {
        PlanBuilder::default()
    }

    /// The owning trigger.
    #[must_use]
    pub const fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// The head literal unified against incoming trigger literals.
    #[must_use]
    pub const fn head(&self) -> &Literal {
        &self.head
    }

    /// The optional boolean guard evaluated after head unification.
    #[must_use]
    pub const fn guard(&self) -> Option<&Expression> {
        self.guard.as_ref()
    }

    /// Body elements in declaration order.
    #[must_use]
    pub fn body(&self) -> &[Execution] {
        &self.body
    }

    /// Looks up an annotation slot.
    #[must_use]
    pub fn annotation(&self, kind: AnnotationKind) -> Option<&Annotation> {
        self.annotations.get(&kind)
    }

    /// Returns true when the body short-circuits to success.
    #[must_use]
    pub fn is_atomic(&self) -> bool {
        self.annotations.contains_key(&AnnotationKind::Atomic)
    }

    /// Returns true when body elements execute concurrently.
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        self.annotations.contains_key(&AnnotationKind::Parallel)
    }

    /// The fuzzy weight; 1.0 unless annotated otherwise.
    #[must_use]
    pub fn fuzzy_weight(&self) -> f64 {
        match self.annotations.get(&AnnotationKind::FuzzyWeight) {
            Some(Annotation::FuzzyWeight(weight)) => *weight,
            _ => 1.0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> PlanState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_state(&self, state: PlanState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Number of executions so far.
    #[must_use]
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Number of failed executions so far.
    #[must_use]
    pub fn fails(&self) -> u64 {
        self.fails.load(Ordering::Relaxed)
    }

    /// Fresh unbound cells for one activation: the scope derived from the
    /// head, guard, and body, plus any constant annotations (pre-bound).
    #[must_use]
    pub fn variables(&self) -> Vec<Arc<Variable>> {
        let mut cells: Vec<Arc<Variable>> = self
            .template
            .iter()
            .map(|v| v.shallow_copy_shared())
            .collect();

        if let Some(Annotation::Constant { name, value }) =
            self.annotations.get(&AnnotationKind::Constant)
        {
            let cell = Variable::shared(name.clone());
            if cell.bind(value.clone()).is_ok() {
                // Constants lead so they win name collisions.
                cells.insert(0, cell);
            }
        }
        cells
    }

    /// Structural hash over trigger kind and head literal.
    #[must_use]
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"plan");
        hasher.update(self.trigger.kind().symbol().as_bytes());
        self.head.feed(&mut hasher);
        digest64(&hasher)
    }

    /// Creates the activation context for a shared plan: unification
    /// bindings first (they win), then the fresh template scope.
    #[must_use]
    pub fn instantiate(
        plan: &Arc<Self>,
        agent: crate::agent::Agent,
        bound: Vec<Arc<Variable>>,
    ) -> Context {
        Context::new(
            agent,
            Instantiable::Plan(Arc::clone(plan)),
            bound.into_iter().chain(plan.variables()),
        )
    }

    /// A copy with the same structure but fresh state and zeroed
    /// counters; used when cloning agents so bookkeeping never aliases.
    pub(crate) fn clone_fresh(&self) -> Self {
        Self {
            trigger: self.trigger.clone(),
            head: self.head.clone(),
            guard: self.guard.clone(),
            body: self.body.clone(),
            annotations: self.annotations.clone(),
            template: self.template.clone(),
            state: RwLock::new(PlanState::Success),
            runs: AtomicU64::new(0),
            fails: AtomicU64::new(0),
        }
    }

    /// Executes the body and settles the state machine.
    ///
    /// Atomic bodies run for their side effects but short-circuit to
    /// success. Parallel bodies run every element concurrently on an
    /// isolated context and succeed iff all succeed. Sequential bodies run
    /// *every* element - failure never short-circuits a plain body - and
    /// succeed iff all succeed. The fuzzy weight scales the final degree.
    #[must_use]
    pub fn execute(&self, ctx: &Context) -> FuzzyValue<bool> {
        self.runs.fetch_add(1, Ordering::Relaxed);

        let result = if self.is_atomic() {
            for element in &self.body {
                let _ = execute(element, ctx, false);
            }
            FuzzyValue::truth(true)
        } else if self.is_parallel() {
            let results: Vec<FuzzyValue<bool>> = thread::scope(|scope| {
                let handles: Vec<_> = self
                    .body
                    .iter()
                    .map(|element| {
                        let branch = ctx.duplicate(std::iter::empty());
                        scope.spawn(move || execute(element, &branch, true))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| handle.join().unwrap_or(FuzzyValue::truth(false)))
                    .collect()
            });
            Intersection.collect(results)
        } else {
            execute_all(&self.body, ctx, false)
        };

        let weighted = result.weighted(self.fuzzy_weight());
        if weighted.value() {
            self.set_state(PlanState::Success);
        } else {
            self.fails.fetch_add(1, Ordering::Relaxed);
            self.set_state(PlanState::Fail);
        }
        weighted
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("trigger", &self.trigger.to_string())
            .field("body", &self.body.len())
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- [{} elements]", self.trigger, self.body.len())
    }
}

/// Builder for plans; all validation happens in `build`.
#[derive(Default)]
pub struct PlanBuilder {
    trigger: Option<Trigger>,
    head: Option<Literal>,
    guard: Option<Expression>,
    body: Vec<Execution>,
    annotations: Vec<Annotation>,
}

impl PlanBuilder {
    /// Sets the owning trigger.
    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Overrides the head literal (defaults to the trigger literal).
    #[must_use]
    pub fn head(mut self, head: Literal) -> Self {
        self.head = Some(head);
        self
    }

    /// Sets the guard expression.
    #[must_use]
    pub fn guard(mut self, guard: Expression) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Appends one body element.
    #[must_use]
    pub fn element(mut self, element: Execution) -> Self {
        self.body.push(element);
        self
    }

    /// Appends body elements.
    #[must_use]
    pub fn body(mut self, body: impl IntoIterator<Item = Execution>) -> Self {
        self.body.extend(body);
        self
    }

    /// Adds an annotation.
    #[must_use]
    pub fn annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Builds the plan.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the trigger is missing, an
    /// annotation kind repeats, or `atomic` and `parallel` are combined.
    pub fn build(self) -> Result<Plan, ConfigurationError> {
        let trigger = self.trigger.ok_or(ConfigurationError::MissingTrigger)?;
        let head = self.head.unwrap_or_else(|| trigger.literal().clone());

        let mut annotations: HashMap<AnnotationKind, Annotation> = HashMap::new();
        for annotation in self.annotations {
            let kind = annotation.kind();
            if annotations.insert(kind, annotation).is_some() {
                return Err(ConfigurationError::DuplicateAnnotation { kind: kind.name() });
            }
        }
        if annotations.contains_key(&AnnotationKind::Atomic)
            && annotations.contains_key(&AnnotationKind::Parallel)
        {
            return Err(ConfigurationError::ConflictingAnnotations {
                first: AnnotationKind::Atomic.name(),
                second: AnnotationKind::Parallel.name(),
            });
        }
        annotations
            .entry(AnnotationKind::FuzzyWeight)
            .or_insert(Annotation::FuzzyWeight(1.0));

        let mut names: BTreeSet<Path> = head.variables().map(|v| v.name().clone()).collect();
        if let Some(guard) = &self.guard {
            guard.collect_variable_names(&mut names);
        }
        for element in &self.body {
            element.collect_variable_names(&mut names);
        }
        let template = names.into_iter().map(Variable::shared).collect();

        Ok(Plan {
            trigger,
            head,
            guard: self.guard,
            body: self.body,
            annotations,
            template,
            state: RwLock::new(PlanState::Success),
            runs: AtomicU64::new(0),
            fails: AtomicU64::new(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::TriggerKind;

    fn goal_trigger(functor: &str) -> Trigger {
        Trigger::add_goal(Literal::new(
            functor,
            vec![Term::Variable(Variable::shared(Path::from("X")))],
        ))
    }

    #[test]
    fn test_builder_defaults() {
        let plan = Plan::builder()
            .trigger(goal_trigger("goal"))
            .element(Execution::Constant(true))
            .build()
            .unwrap();

        assert_eq!(plan.trigger().kind(), TriggerKind::AddGoal);
        assert_eq!(plan.head(), plan.trigger().literal());
        assert!(!plan.is_atomic());
        assert!(!plan.is_parallel());
        assert_eq!(plan.fuzzy_weight(), 1.0);
        assert_eq!(plan.state(), PlanState::Success);
        assert_eq!(plan.runs(), 0);
    }

    #[test]
    fn test_builder_requires_trigger() {
        assert!(Plan::builder().build().is_err());
    }

    #[test]
    fn test_duplicate_annotation_rejected() {
        let err = Plan::builder()
            .trigger(goal_trigger("goal"))
            .annotation(Annotation::Tag("a".to_string()))
            .annotation(Annotation::Tag("b".to_string()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateAnnotation { .. }));
    }

    #[test]
    fn test_atomic_parallel_conflict_rejected() {
        let err = Plan::builder()
            .trigger(goal_trigger("goal"))
            .annotation(Annotation::Atomic)
            .annotation(Annotation::Parallel)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::ConflictingAnnotations { .. }));
    }

    #[test]
    fn test_fuzzy_weight_annotation() {
        let plan = Plan::builder()
            .trigger(goal_trigger("goal"))
            .annotation(Annotation::FuzzyWeight(0.5))
            .build()
            .unwrap();
        assert_eq!(plan.fuzzy_weight(), 0.5);
    }

    #[test]
    fn test_scope_includes_guard_and_body_names() {
        let plan = Plan::builder()
            .trigger(goal_trigger("goal"))
            .guard(Expression::gt(
                Expression::var("X"),
                Expression::var("Limit"),
            ))
            .element(Execution::Assignment {
                variable: Path::from("Y"),
                expression: Expression::var("X"),
            })
            .build()
            .unwrap();

        let names: BTreeSet<String> = plan
            .variables()
            .iter()
            .map(|v| v.name().to_string())
            .collect();
        assert!(names.contains("X"));
        assert!(names.contains("Limit"));
        assert!(names.contains("Y"));
    }

    #[test]
    fn test_variables_fresh_per_activation() {
        let plan = Plan::builder().trigger(goal_trigger("goal")).build().unwrap();
        let first = plan.variables();
        first[0].bind(Term::from(1.0)).unwrap();
        assert!(!plan.variables()[0].allocated());
    }

    #[test]
    fn test_constant_annotation_binds_cell() {
        let plan = Plan::builder()
            .trigger(goal_trigger("goal"))
            .annotation(Annotation::Constant {
                name: Path::from("Max"),
                value: Term::from(10.0),
            })
            .build()
            .unwrap();

        let cells = plan.variables();
        let max = cells.iter().find(|v| v.name() == &Path::from("Max")).unwrap();
        assert_eq!(max.raw().unwrap(), Term::from(10.0));
    }

    #[test]
    fn test_structural_hash_distinguishes_plans() {
        let a = Plan::builder().trigger(goal_trigger("a")).build().unwrap();
        let b = Plan::builder().trigger(goal_trigger("b")).build().unwrap();
        assert_ne!(a.structural_hash(), b.structural_hash());
    }
}
