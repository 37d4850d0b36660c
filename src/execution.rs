//! Plan and rule body elements.
//!
//! `Execution` is a closed tagged variant; dispatch is a pattern match in
//! [`execute`], with one function per variant. Two aggregation semantics
//! coexist deliberately and must not be unified: a plain body list runs
//! *every* element and succeeds iff all succeed (no short-circuit on
//! failure), while a repair chain tries alternatives in order and accepts
//! the *first* success.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::context::{Context, Instantiable};
use crate::error::ConfigurationError;
use crate::expression::Expression;
use crate::fuzzy::{FuzzyOperator, FuzzyValue, Intersection};
use crate::literal::Literal;
use crate::path::Path;
use crate::plan::PlanState;
use crate::term::Term;
use crate::unify::Unifier;
use crate::variable::Variable;

/// Direction of a belief mutation element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeliefActionKind {
    /// `+literal` - add to the belief view.
    Add,
    /// `-literal` - remove from the belief view.
    Delete,
}

/// A unification element, validated at construction time.
///
/// The uniqueness rule lives here, not in the unifier: a target repeating
/// a non-wildcard variable is rejected before execution ever starts.
#[derive(Debug, Clone)]
pub struct UnifyExecution {
    parallel: bool,
    target: Literal,
    constraint: Expression,
    expected: usize,
}

impl UnifyExecution {
    /// Builds a unify element over a template literal and an optional
    /// constraint expression (missing constraint accepts the first
    /// unifiable candidate).
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the template is ground or
    /// repeats a non-wildcard variable.
    pub fn new(
        parallel: bool,
        target: Literal,
        constraint: Option<Expression>,
    ) -> Result<Self, ConfigurationError> {
        let expected = Unifier::check_target(&target)?;
        Ok(Self {
            parallel,
            target,
            constraint: constraint.unwrap_or(Expression::truth(true)),
            expected,
        })
    }

    /// The template literal.
    #[must_use]
    pub const fn target(&self) -> &Literal {
        &self.target
    }

    /// Expected number of distinct bound variables.
    #[must_use]
    pub const fn expected(&self) -> usize {
        self.expected
    }
}

/// The source a lambda element iterates.
#[derive(Debug, Clone)]
pub enum LambdaSource {
    /// The half-open integer range `[from, to)`.
    Range {
        /// Lower bound expression.
        from: Expression,
        /// Upper bound expression.
        to: Expression,
    },
    /// Whatever container the expression evaluates to: a list, a set, or
    /// a registered opaque host container.
    Value(Expression),
}

/// A lambda element: iterate a source, binding the element variable per
/// round on an isolated scope.
#[derive(Debug, Clone)]
pub struct LambdaExecution {
    /// Run rounds concurrently.
    pub parallel: bool,
    /// Element source.
    pub source: LambdaSource,
    /// Name the current element is bound under.
    pub element: Path,
    /// Per-round body.
    pub body: Vec<Execution>,
}

/// A body element of a plan or rule.
#[derive(Debug, Clone)]
pub enum Execution {
    /// The `success` / `fail` atoms.
    Constant(bool),
    /// A boolean expression in a body position.
    Proof(Expression),
    /// Bind a context variable to an evaluated expression.
    Assignment {
        /// Target variable name.
        variable: Path,
        /// Value expression.
        expression: Expression,
    },
    /// Invoke a registered action.
    ActionCall {
        /// Registry name.
        name: Path,
        /// Argument expressions, evaluated against the context.
        args: Vec<Expression>,
        /// Variables the action's result terms bind to, positionally.
        returns: Vec<Path>,
    },
    /// Mutate the agent's belief view.
    BeliefAction {
        /// Add or delete.
        kind: BeliefActionKind,
        /// Literal, allocated against the context before mutation.
        literal: Literal,
    },
    /// Raise a goal; selection happens on a later cycle.
    AchievementGoal {
        /// Goal literal.
        literal: Literal,
    },
    /// Succeed iff a matching belief exists right now.
    TestGoal {
        /// Query literal.
        literal: Literal,
    },
    /// Call a rule by identifier literal.
    RuleCall {
        /// Call literal.
        literal: Literal,
    },
    /// Search belief candidates by unification.
    Unify(UnifyExecution),
    /// Ordered alternatives: first success wins, rest are skipped.
    RepairChain(Vec<Execution>),
    /// Conditional branch.
    Ternary {
        /// Branch condition.
        condition: Expression,
        /// Element executed when the condition holds.
        on_true: Box<Execution>,
        /// Element executed otherwise.
        on_false: Box<Execution>,
    },
    /// Block until a condition holds or a timeout passes; timeout is a
    /// plain failure and already-produced side effects stay.
    Barrier {
        /// Awaited condition.
        condition: Expression,
        /// `None` waits unbounded.
        timeout: Option<Duration>,
    },
    /// Iterate a container, one isolated scope per element.
    Lambda(LambdaExecution),
}

impl Execution {
    /// Collects the variable names this element contributes to a scope.
    pub fn collect_variable_names(&self, out: &mut BTreeSet<Path>) {
        match self {
            Self::Constant(_) => {}
            Self::Proof(expression) => expression.collect_variable_names(out),
            Self::Assignment {
                variable,
                expression,
            } => {
                out.insert(variable.clone());
                expression.collect_variable_names(out);
            }
            Self::ActionCall { args, returns, .. } => {
                for arg in args {
                    arg.collect_variable_names(out);
                }
                for ret in returns {
                    out.insert(ret.clone());
                }
            }
            Self::BeliefAction { literal, .. }
            | Self::AchievementGoal { literal }
            | Self::TestGoal { literal }
            | Self::RuleCall { literal } => {
                for var in literal.variables() {
                    out.insert(var.name().clone());
                }
            }
            Self::Unify(unify) => {
                for var in unify.target.variables() {
                    out.insert(var.name().clone());
                }
                unify.constraint.collect_variable_names(out);
            }
            Self::RepairChain(elements) => {
                for element in elements {
                    element.collect_variable_names(out);
                }
            }
            Self::Ternary {
                condition,
                on_true,
                on_false,
            } => {
                condition.collect_variable_names(out);
                on_true.collect_variable_names(out);
                on_false.collect_variable_names(out);
            }
            Self::Barrier { condition, .. } => condition.collect_variable_names(out),
            Self::Lambda(lambda) => {
                match &lambda.source {
                    LambdaSource::Range { from, to } => {
                        from.collect_variable_names(out);
                        to.collect_variable_names(out);
                    }
                    LambdaSource::Value(expression) => expression.collect_variable_names(out),
                }
                out.insert(lambda.element.clone());
                for element in &lambda.body {
                    element.collect_variable_names(out);
                }
            }
        }
    }
}

impl fmt::Display for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(true) => write!(f, "success"),
            Self::Constant(false) => write!(f, "fail"),
            Self::Proof(expression) => write!(f, "{expression}"),
            Self::Assignment {
                variable,
                expression,
            } => write!(f, "{variable} = {expression}"),
            Self::ActionCall { name, args, .. } => {
                write!(f, "{name}(")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Self::BeliefAction { kind, literal } => match kind {
                BeliefActionKind::Add => write!(f, "+{literal}"),
                BeliefActionKind::Delete => write!(f, "-{literal}"),
            },
            Self::AchievementGoal { literal } => write!(f, "!{literal}"),
            Self::TestGoal { literal } => write!(f, "?{literal}"),
            Self::RuleCall { literal } => write!(f, "${literal}"),
            Self::Unify(unify) => {
                write!(f, "{}>>{}", if unify.parallel { "@" } else { "" }, unify.target)
            }
            Self::RepairChain(elements) => {
                for (idx, element) in elements.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " << ")?;
                    }
                    write!(f, "{element}")?;
                }
                Ok(())
            }
            Self::Ternary { condition, .. } => write!(f, "{condition} ? _ : _"),
            Self::Barrier { condition, .. } => write!(f, "< {condition} >"),
            Self::Lambda(lambda) => write!(f, "({}) -> {}", lambda.element, lambda.body.len()),
        }
    }
}

/// Executes one body element against a context.
///
/// Every outcome is a fuzzy value; faults below this boundary never reach
/// the reasoning cycle as errors.
#[must_use]
pub fn execute(node: &Execution, ctx: &Context, parallel: bool) -> FuzzyValue<bool> {
    match node {
        Execution::Constant(value) => FuzzyValue::truth(*value),
        Execution::Proof(expression) => expression.evaluate_bool(&|name| ctx.resolve(name)),
        Execution::Assignment {
            variable,
            expression,
        } => execute_assignment(variable, expression, ctx),
        Execution::ActionCall {
            name,
            args,
            returns,
        } => execute_action(name, args, returns, ctx, parallel),
        Execution::BeliefAction { kind, literal } => execute_belief_action(*kind, literal, ctx),
        Execution::AchievementGoal { literal } => execute_achievement_goal(literal, ctx),
        Execution::TestGoal { literal } => execute_test_goal(literal, ctx),
        Execution::RuleCall { literal } => execute_rule_call(literal, ctx, parallel),
        Execution::Unify(unify) => Unifier::unify_constraint(
            ctx,
            &unify.target,
            unify.expected,
            &unify.constraint,
            unify.parallel,
        ),
        Execution::RepairChain(elements) => execute_repair_chain(elements, ctx, parallel),
        Execution::Ternary {
            condition,
            on_true,
            on_false,
        } => {
            if condition.evaluate_bool(&|name| ctx.resolve(name)).value() {
                execute(on_true, ctx, parallel)
            } else {
                execute(on_false, ctx, parallel)
            }
        }
        Execution::Barrier { condition, timeout } => execute_barrier(condition, *timeout, ctx),
        Execution::Lambda(lambda) => execute_lambda(lambda, ctx),
    }
}

/// Runs a body list with the all-must-succeed rule: every element executes
/// regardless of earlier failures, and the results intersect.
#[must_use]
pub fn execute_all(elements: &[Execution], ctx: &Context, parallel: bool) -> FuzzyValue<bool> {
    Intersection.collect(elements.iter().map(|element| execute(element, ctx, parallel)))
}

fn execute_assignment(variable: &Path, expression: &Expression, ctx: &Context) -> FuzzyValue<bool> {
    match expression
        .evaluate(&|name| ctx.resolve(name))
        .and_then(|value| ctx.bind(variable, value))
    {
        Ok(()) => FuzzyValue::truth(true),
        Err(error) => {
            tracing::debug!(%variable, %error, "assignment failed");
            FuzzyValue::truth(false)
        }
    }
}

fn execute_action(
    name: &Path,
    args: &[Expression],
    returns: &[Path],
    ctx: &Context,
    parallel: bool,
) -> FuzzyValue<bool> {
    let mut evaluated = Vec::with_capacity(args.len());
    for arg in args {
        match arg.evaluate(&|n| ctx.resolve(n)) {
            Ok(term) => evaluated.push(term),
            Err(error) => {
                tracing::debug!(action = %name, %error, "action argument fault");
                return FuzzyValue::truth(false);
            }
        }
    }

    let mut results = Vec::new();
    let outcome = ctx
        .agent()
        .actions()
        .invoke(name, parallel, ctx, &evaluated, &mut results);

    for (target, value) in returns.iter().zip(results) {
        if ctx.bind(target, value).is_err() {
            return FuzzyValue::truth(false);
        }
    }
    outcome
}

fn execute_belief_action(
    kind: BeliefActionKind,
    literal: &Literal,
    ctx: &Context,
) -> FuzzyValue<bool> {
    let allocated = literal.allocate(&|name| ctx.resolve(name));
    match kind {
        BeliefActionKind::Add => ctx.agent().believe(allocated),
        BeliefActionKind::Delete => ctx.agent().disbelieve(&allocated),
    }
    FuzzyValue::truth(true)
}

fn execute_achievement_goal(literal: &Literal, ctx: &Context) -> FuzzyValue<bool> {
    let allocated = literal.allocate(&|name| ctx.resolve(name));
    ctx.agent().raise_goal(allocated);
    FuzzyValue::truth(true)
}

fn execute_test_goal(literal: &Literal, ctx: &Context) -> FuzzyValue<bool> {
    let allocated = literal.allocate(&|name| ctx.resolve(name));
    let exists = ctx
        .agent()
        .belief_candidates(&allocated.signature())
        .iter()
        .any(|candidate| Unifier::try_unify(candidate, &allocated).is_some());
    FuzzyValue::truth(exists)
}

fn execute_rule_call(literal: &Literal, ctx: &Context, parallel: bool) -> FuzzyValue<bool> {
    let call = literal.allocate(&|name| ctx.resolve(name));
    let signature = call.signature();

    let Some(entry) = ctx.agent().rules().get(&signature).cloned() else {
        tracing::warn!(rule = %signature, "rule call without a library entry");
        return FuzzyValue::truth(false);
    };

    let rule = match entry {
        crate::rule::RuleEntry::Resolved(rule) => rule,
        crate::rule::RuleEntry::Placeholder(_) => {
            // An unresolved placeholder must fail, never execute.
            tracing::warn!(rule = %signature, "rule call hit an unresolved placeholder");
            return FuzzyValue::truth(false);
        }
    };

    let Some(bound) = Unifier::try_unify(&call, rule.identifier()) else {
        return FuzzyValue::truth(false);
    };

    // Isolated scope: call bindings win, the rest of the rule's scope
    // starts fresh.
    let rule_ctx = Context::new(
        ctx.agent().clone(),
        Instantiable::Rule(Arc::clone(&rule)),
        bound.into_iter().chain(rule.variables()),
    );

    execute_all(rule.body(), &rule_ctx, parallel)
}

fn execute_repair_chain(
    elements: &[Execution],
    ctx: &Context,
    parallel: bool,
) -> FuzzyValue<bool> {
    let mut last = FuzzyValue::truth(false);
    for element in elements {
        last = execute(element, ctx, parallel);
        if last.value() {
            return last;
        }
    }
    last
}

fn execute_barrier(
    condition: &Expression,
    timeout: Option<Duration>,
    ctx: &Context,
) -> FuzzyValue<bool> {
    if let Instantiable::Plan(plan) = ctx.instance() {
        plan.set_state(PlanState::Suspend);
    }

    let poll = ctx.agent().config().barrier_poll_interval;
    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        if condition.evaluate_bool(&|name| ctx.resolve(name)).value() {
            return FuzzyValue::truth(true);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return FuzzyValue::truth(false);
        }
        thread::sleep(poll);
    }
}

fn execute_lambda(lambda: &LambdaExecution, ctx: &Context) -> FuzzyValue<bool> {
    let items = match &lambda.source {
        LambdaSource::Range { from, to } => {
            let bounds = from
                .evaluate(&|n| ctx.resolve(n))
                .and_then(|f| to.evaluate(&|n| ctx.resolve(n)).map(|t| (f, t)));
            match bounds {
                Ok((f, t)) => match (f.as_number(), t.as_number()) {
                    (Ok(f), Ok(t)) => crate::lambda::range_stream(f, t),
                    _ => return FuzzyValue::truth(false),
                },
                Err(_) => return FuzzyValue::truth(false),
            }
        }
        LambdaSource::Value(expression) => {
            let Ok(term) = expression.evaluate(&|n| ctx.resolve(n)) else {
                return FuzzyValue::truth(false);
            };
            match ctx.agent().lambdas().stream_of(&term) {
                Some(items) => items,
                None => return FuzzyValue::truth(false),
            }
        }
    };

    let round = |item: Term| -> FuzzyValue<bool> {
        let cell = Variable::shared(lambda.element.clone());
        if cell.bind(item).is_err() {
            return FuzzyValue::truth(false);
        }
        let round_ctx = ctx.duplicate(vec![cell]);
        execute_all(&lambda.body, &round_ctx, lambda.parallel)
    };

    if lambda.parallel {
        let round = &round;
        let results: Vec<FuzzyValue<bool>> = thread::scope(|scope| {
            let handles: Vec<_> = items
                .into_iter()
                .map(|item| scope.spawn(move || round(item)))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(FuzzyValue::truth(false)))
                .collect()
        });
        Intersection.collect(results)
    } else {
        Intersection.collect(items.into_iter().map(round))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    #[test]
    fn test_unify_execution_rejects_ground_target() {
        let err = UnifyExecution::new(false, Literal::new("g", vec![Term::from(1.0)]), None)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::NoVariables));
    }

    #[test]
    fn test_unify_execution_rejects_repeated_variable() {
        let x = Variable::shared(Path::from("X"));
        let target = Literal::new(
            "f",
            vec![
                Term::Variable(Arc::clone(&x)),
                Term::Variable(Arc::clone(&x)),
            ],
        );
        let err = UnifyExecution::new(false, target, None).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateVariable { .. }));
    }

    #[test]
    fn test_unify_execution_counts_expected() {
        let target = Literal::new(
            "f",
            vec![
                Term::Variable(Variable::shared(Path::from("X"))),
                Term::Variable(Variable::shared(Path::from("Y"))),
            ],
        );
        let unify = UnifyExecution::new(false, target, None).unwrap();
        assert_eq!(unify.expected(), 2);
    }

    #[test]
    fn test_collect_variable_names() {
        let mut names = BTreeSet::new();
        Execution::Assignment {
            variable: Path::from("X"),
            expression: Expression::var("Y"),
        }
        .collect_variable_names(&mut names);
        assert!(names.contains(&Path::from("X")));
        assert!(names.contains(&Path::from("Y")));

        let mut names = BTreeSet::new();
        Execution::Lambda(LambdaExecution {
            parallel: false,
            source: LambdaSource::Value(Expression::var("Items")),
            element: Path::from("I"),
            body: vec![Execution::Proof(Expression::var("Flag"))],
        })
        .collect_variable_names(&mut names);
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Execution::Constant(true)), "success");
        assert_eq!(format!("{}", Execution::Constant(false)), "fail");

        let chain = Execution::RepairChain(vec![
            Execution::Constant(false),
            Execution::Constant(true),
        ]);
        assert_eq!(format!("{chain}"), "fail << success");
    }
}
