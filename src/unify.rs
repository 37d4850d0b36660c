//! Structural unification and constraint-driven candidate search.
//!
//! The unifier binds the free variables of a *target* literal (a template)
//! to the corresponding positions of a *source* literal (data). There is no
//! backtracking: first binding wins, which is why unification targets must
//! not repeat a non-wildcard variable - that property is enforced when the
//! unify execution node is built, never at call time.
//!
//! The search form enumerates belief candidates matching the template
//! signature and re-evaluates a constraint expression per candidate. The
//! parallel mode races candidates across threads and commits the first
//! satisfying result it observes; when several candidates are equally
//! valid the winner is non-deterministic by design.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;

use crate::context::Context;
use crate::error::ConfigurationError;
use crate::expression::Expression;
use crate::fuzzy::FuzzyValue;
use crate::literal::Literal;
use crate::path::Path;
use crate::term::Term;
use crate::variable::Variable;

/// The unification algorithm. Stateless; agents share one value.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unifier;

impl Unifier {
    /// Unifies a data literal against a variable-containing template.
    ///
    /// Returns the set of freshly-bound variable cells (shallow copies of
    /// the template's variables), or an empty set when functor, arity,
    /// negation, or any position fails to match. Callers compare the
    /// binding count against the expected free-variable count; a partial
    /// binding is never returned.
    #[must_use]
    pub fn unify(source: &Literal, target: &Literal) -> Vec<Arc<Variable>> {
        Self::try_unify(source, target).unwrap_or_default()
    }

    /// Like [`Unifier::unify`], but keeps success distinguishable from an
    /// empty binding set: `None` is a mismatch, `Some(vec![])` is a ground
    /// match. Plan selection and rule calls use this form.
    #[must_use]
    pub fn try_unify(source: &Literal, target: &Literal) -> Option<Vec<Arc<Variable>>> {
        let mut bound = Vec::new();
        unify_parts(source, target, &mut bound).then_some(bound)
    }

    /// Unifies and commits the resulting bindings into the context's
    /// same-named cells. Fuzzy false when the binding count does not reach
    /// `expected`.
    #[must_use]
    pub fn unify_into_context(
        ctx: &Context,
        source: &Literal,
        target: &Literal,
        expected: usize,
    ) -> FuzzyValue<bool> {
        let bound = Self::unify(source, target);
        if count_distinct(&bound) != expected {
            return FuzzyValue::truth(false);
        }
        ctx.commit_bindings(&bound);
        FuzzyValue::truth(true)
    }

    /// Searches the agent's belief candidates for one that unifies with
    /// the template *and* satisfies the constraint expression.
    ///
    /// Sequential mode stops at the first satisfying candidate in stream
    /// order. Parallel mode evaluates candidates concurrently and the
    /// first true result observed wins; callers must not depend on
    /// candidate order. Fuzzy false when no candidate satisfies.
    #[must_use]
    pub fn unify_constraint(
        ctx: &Context,
        target: &Literal,
        expected: usize,
        constraint: &Expression,
        parallel: bool,
    ) -> FuzzyValue<bool> {
        let candidates = ctx.agent().belief_candidates(&target.signature());
        if candidates.is_empty() {
            return FuzzyValue::truth(false);
        }

        if parallel {
            Self::search_parallel(ctx, target, expected, constraint, &candidates)
        } else {
            Self::search_sequential(ctx, target, expected, constraint, &candidates)
        }
    }

    fn search_sequential(
        ctx: &Context,
        target: &Literal,
        expected: usize,
        constraint: &Expression,
        candidates: &[Literal],
    ) -> FuzzyValue<bool> {
        for candidate in candidates {
            if let Some(bound) = probe(ctx, candidate, target, expected, constraint) {
                ctx.commit_bindings(&bound);
                return FuzzyValue::truth(true);
            }
        }
        FuzzyValue::truth(false)
    }

    fn search_parallel(
        ctx: &Context,
        target: &Literal,
        expected: usize,
        constraint: &Expression,
        candidates: &[Literal],
    ) -> FuzzyValue<bool> {
        let fanout = ctx.agent().config().parallel_fanout.max(1);
        let (tx, rx) = bounded::<Vec<Arc<Variable>>>(1);

        // Candidates race in rounds of `fanout`; the first satisfying
        // result fits the one-slot channel and later winners are dropped.
        for chunk in candidates.chunks(fanout) {
            thread::scope(|scope| {
                for candidate in chunk {
                    let tx = tx.clone();
                    scope.spawn(move || {
                        if let Some(bound) = probe(ctx, candidate, target, expected, constraint) {
                            let _ = tx.try_send(bound);
                        }
                    });
                }
            });

            if let Ok(bound) = rx.try_recv() {
                ctx.commit_bindings(&bound);
                return FuzzyValue::truth(true);
            }
        }
        FuzzyValue::truth(false)
    }

    /// Validates a unification target at construction time and returns its
    /// distinct-variable count.
    ///
    /// # Errors
    ///
    /// `NoVariables` when the template is ground; `DuplicateVariable` when
    /// a non-wildcard variable occurs more than once (first-binding-wins
    /// semantics make repeated variables ambiguous).
    pub fn check_target(target: &Literal) -> Result<usize, ConfigurationError> {
        let mut frequency: HashMap<Path, usize> = HashMap::new();
        let mut wildcard = false;
        for var in target.variables() {
            if var.is_wildcard() {
                wildcard = true;
                continue;
            }
            *frequency.entry(var.name().clone()).or_insert(0) += 1;
        }

        if frequency.is_empty() && !wildcard {
            return Err(ConfigurationError::NoVariables);
        }

        if let Some((name, _)) = frequency.iter().find(|(_, count)| **count > 1) {
            return Err(ConfigurationError::DuplicateVariable {
                variable: name.clone(),
            });
        }

        Ok(frequency.len() + usize::from(wildcard))
    }
}

/// Duplicates the context, unifies the candidate into it, and evaluates
/// the constraint there. Returns the binding set on success.
fn probe(
    ctx: &Context,
    candidate: &Literal,
    target: &Literal,
    expected: usize,
    constraint: &Expression,
) -> Option<Vec<Arc<Variable>>> {
    let bound = Unifier::unify(candidate, target);
    if count_distinct(&bound) != expected {
        return None;
    }

    let scratch = ctx.duplicate(std::iter::empty());
    scratch.commit_bindings(&bound);
    constraint
        .evaluate_bool(&|name| scratch.resolve(name))
        .value()
        .then_some(bound)
}

fn count_distinct(bound: &[Arc<Variable>]) -> usize {
    let mut names: Vec<&Path> = bound.iter().map(|v| v.name()).collect();
    names.sort_unstable();
    names.dedup();
    names.len()
}

fn unify_parts(source: &Literal, target: &Literal, bound: &mut Vec<Arc<Variable>>) -> bool {
    if !source.unify_compatible(target) {
        return false;
    }

    let args_ok = source
        .args()
        .iter()
        .zip(target.args().iter())
        .all(|(s, t)| unify_terms(s, t, bound));
    if !args_ok {
        return false;
    }

    // Annotated arguments participate pairwise; a template cannot demand
    // more annotations than the data carries.
    if target.annotations().len() > source.annotations().len() {
        return false;
    }
    source
        .annotations()
        .iter()
        .zip(target.annotations().iter())
        .all(|(s, t)| unify_parts(s, t, bound))
}

fn unify_terms(source: &Term, target: &Term, bound: &mut Vec<Arc<Variable>>) -> bool {
    let source = source.flattened();
    match target {
        Term::Variable(var) => {
            let copy = var.shallow_copy_shared();
            if copy.bind(source).is_err() {
                return false;
            }
            bound.push(copy);
            true
        }
        Term::Literal(template) => match source {
            Term::Literal(data) => unify_parts(&data, template, bound),
            _ => false,
        },
        Term::List(template_items) => match source {
            Term::List(data_items) if data_items.len() == template_items.len() => data_items
                .iter()
                .zip(template_items.iter())
                .all(|(s, t)| unify_terms(s, t, bound)),
            _ => false,
        },
        // Ground positions (sets included) require structural equality.
        other => source == *other,
    }
}
