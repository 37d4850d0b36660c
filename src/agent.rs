//! Agents and the reasoning cycle.
//!
//! An agent is a handle over shared state: a belief-view arena, a plan
//! library indexed by trigger signature, a rule library, an action
//! registry, and a bounded queue of pending triggers. One cycle drains the
//! queue, selects plans by trigger signature plus head unification plus
//! guard, executes the first matching plan per trigger, and defuzzifies the
//! aggregated result into the running-plan table. The cycle itself is
//! single-threaded per agent; fan-out happens only inside plan bodies and
//! parallel unification search.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::Serialize;
use uuid::Uuid;

use crate::action::ActionRegistry;
use crate::beliefbase::{MemoryStorage, Storage, ViewArena};
use crate::config::RuntimeConfig;
use crate::error::{ExecutionError, NoemaError, NoemaResult};
use crate::lambda::LambdaRegistry;
use crate::literal::{Literal, LiteralSignature};
use crate::plan::Plan;
use crate::rule::{Rule, RuleLibrary};
use crate::trigger::{Trigger, TriggerSignature};
use crate::unify::Unifier;

/// Unique identifier of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AgentId(Uuid);

impl AgentId {
    /// Creates a new random agent ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Agent run states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Triggers are processed each cycle.
    Running,
    /// Belief updates still run, plan selection is skipped.
    Suspended,
}

/// What a cloned agent does with the belief base.
pub enum CloneBeliefs {
    /// Alias the original arena.
    Share,
    /// Start from a caller-supplied arena.
    Replace(ViewArena),
}

/// Per-trigger bookkeeping surviving reactivations.
#[derive(Debug, Clone)]
pub struct RunningPlanRecord {
    /// The trigger that last activated the entry.
    pub trigger: Trigger,
    /// Crisp outcome of the most recent execution.
    pub last_success: bool,
    /// Total activations.
    pub runs: u64,
    /// Failed activations.
    pub fails: u64,
}

/// Counters describing one reasoning cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleReport {
    /// Triggers drained from the queue this cycle.
    pub triggers: usize,
    /// Plans actually executed.
    pub executed: usize,
}

struct AgentInner {
    id: AgentId,
    state: RwLock<RunState>,
    beliefs: Arc<RwLock<ViewArena>>,
    plans: Vec<Arc<Plan>>,
    plan_index: HashMap<TriggerSignature, Vec<usize>>,
    rules: Arc<RuleLibrary>,
    actions: Arc<ActionRegistry>,
    lambdas: Arc<LambdaRegistry>,
    config: Arc<RuntimeConfig>,
    pending_tx: Sender<Trigger>,
    pending_rx: Receiver<Trigger>,
    dropped_triggers: AtomicU64,
    cycle: AtomicU64,
    running: RwLock<HashMap<u64, RunningPlanRecord>>,
}

/// A cheaply-cloneable handle to one agent.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> AgentBuilder {
        AgentBuilder::default()
    }

    /// The agent id.
    #[must_use]
    pub fn id(&self) -> AgentId {
        self.inner.id
    }

    /// Current run state.
    #[must_use]
    pub fn state(&self) -> RunState {
        *self
            .inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Completed cycle count.
    #[must_use]
    pub fn cycle_count(&self) -> u64 {
        self.inner.cycle.load(Ordering::Relaxed)
    }

    /// The runtime configuration.
    #[must_use]
    pub fn config(&self) -> Arc<RuntimeConfig> {
        Arc::clone(&self.inner.config)
    }

    /// The action registry.
    #[must_use]
    pub fn actions(&self) -> Arc<ActionRegistry> {
        Arc::clone(&self.inner.actions)
    }

    /// The lambda-stream registry.
    #[must_use]
    pub fn lambdas(&self) -> Arc<LambdaRegistry> {
        Arc::clone(&self.inner.lambdas)
    }

    /// The rule library.
    #[must_use]
    pub fn rules(&self) -> Arc<RuleLibrary> {
        Arc::clone(&self.inner.rules)
    }

    /// The belief-view arena.
    #[must_use]
    pub fn beliefs(&self) -> Arc<RwLock<ViewArena>> {
        Arc::clone(&self.inner.beliefs)
    }

    /// Plans in declaration order.
    #[must_use]
    pub fn plans(&self) -> &[Arc<Plan>] {
        &self.inner.plans
    }

    /// Triggers dropped on queue overflow so far.
    #[must_use]
    pub fn dropped_triggers(&self) -> u64 {
        self.inner.dropped_triggers.load(Ordering::Relaxed)
    }

    /// The running-plan record for a triggering literal, if any.
    #[must_use]
    pub fn running_plan(&self, literal: &Literal) -> Option<RunningPlanRecord> {
        self.inner
            .running
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&literal.structural_hash())
            .cloned()
    }

    /// Injects an event trigger; it is processed on the next cycle.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::QueueFull` when the pending queue is at
    /// capacity; the trigger is dropped and counted.
    pub fn trigger(&self, trigger: Trigger) -> NoemaResult<()> {
        match self.inner.pending_tx.try_send(trigger) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.inner.dropped_triggers.fetch_add(1, Ordering::Relaxed);
                Err(NoemaError::Execution(ExecutionError::QueueFull {
                    capacity: self.inner.config.trigger_queue_capacity,
                }))
            }
            Err(TrySendError::Disconnected(_)) => Err(NoemaError::Execution(
                ExecutionError::Disconnected {
                    context: "agent trigger queue",
                },
            )),
        }
    }

    /// Adds a belief: the literal lands in the view named by its functor
    /// prefix (views are created on demand), and exactly one add trigger
    /// per changed literal is enqueued.
    pub fn believe(&self, literal: Literal) {
        let parent = literal.functor().parent();
        let triggers = {
            let mut arena = self
                .inner
                .beliefs
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let generate = |_: &str| -> Arc<dyn Storage> { Arc::new(MemoryStorage::new()) };
            let root = arena.root();
            let visited = arena.walk(root, &parent, Some(&generate));
            let leaf = *visited.last().unwrap_or(&root);
            arena.add_literal(leaf, literal)
        };
        self.enqueue_all(triggers);
    }

    /// Removes a belief; one delete trigger per literal actually removed.
    pub fn disbelieve(&self, literal: &Literal) {
        let parent = literal.functor().parent();
        let triggers = {
            let mut arena = self
                .inner
                .beliefs
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let root = arena.root();
            let visited = arena.walk(root, &parent, None);
            match visited.last() {
                Some(leaf) if !leaf.is_empty_view() => arena.remove_literal(*leaf, literal),
                _ => Vec::new(),
            }
        };
        self.enqueue_all(triggers);
    }

    /// Raises an achievement goal for the next cycle.
    pub fn raise_goal(&self, literal: Literal) {
        self.enqueue_all(std::iter::once(Trigger::add_goal(literal)));
    }

    /// Drops a goal for the next cycle.
    pub fn drop_goal(&self, literal: Literal) {
        self.enqueue_all(std::iter::once(Trigger::delete_goal(literal)));
    }

    fn enqueue_all(&self, triggers: impl IntoIterator<Item = Trigger>) {
        for trigger in triggers {
            if let Err(error) = self.trigger(trigger) {
                tracing::warn!(agent = %self.id(), %error, "dropping trigger");
            }
        }
    }

    /// Belief candidates matching a literal signature, resolved through
    /// the view named by the functor prefix.
    #[must_use]
    pub fn belief_candidates(&self, signature: &LiteralSignature) -> Vec<Literal> {
        let parent = signature.functor.parent();
        let mut arena = self
            .inner
            .beliefs
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let root = arena.root();
        let visited = arena.walk(root, &parent, None);
        let Some(leaf) = visited.last().copied() else {
            return Vec::new();
        };
        if leaf.is_empty_view() {
            return Vec::new();
        }

        arena
            .stream(leaf, Some(&signature.functor), None)
            .into_iter()
            .filter(|l| l.functor() == &signature.functor && l.arity() == signature.arity)
            .collect()
    }

    /// Suspends the agent: a best-effort `+!sleep` plan runs first, then
    /// plan selection stops while belief updates keep running each cycle.
    pub fn suspend(&self) {
        if self.state() == RunState::Suspended {
            return;
        }
        let _ = self.process_trigger(&Trigger::add_goal(Literal::atom("sleep")));
        *self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = RunState::Suspended;
    }

    /// Resumes the agent and fires a best-effort `+!wakeup` plan.
    pub fn resume(&self) {
        if self.state() == RunState::Running {
            return;
        }
        *self
            .inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner) = RunState::Running;
        let _ = self.process_trigger(&Trigger::add_goal(Literal::atom("wakeup")));
    }

    /// Runs one reasoning cycle.
    ///
    /// Belief `update` always runs. When running, pending triggers are
    /// drained and each one selects and executes at most one plan. The
    /// cycle counter advances unconditionally.
    pub fn cycle(&self) -> CycleReport {
        let cycle_no = self.inner.cycle.load(Ordering::Relaxed);

        // Storage synchronization runs in every state.
        let sync_triggers = {
            let mut arena = self
                .inner
                .beliefs
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            arena.update(cycle_no)
        };
        self.enqueue_all(sync_triggers);

        let mut report = CycleReport::default();
        if self.state() == RunState::Running {
            let drained: Vec<Trigger> = self.inner.pending_rx.try_iter().collect();
            report.triggers = drained.len();
            for trigger in &drained {
                if self.process_trigger(trigger).is_some() {
                    report.executed += 1;
                }
            }
        }

        self.inner.cycle.fetch_add(1, Ordering::Relaxed);
        report
    }

    /// Selects and executes a plan for one trigger.
    ///
    /// Candidates are filed under the trigger signature; the first one (in
    /// declaration order) whose head unifies and whose guard holds is
    /// executed. Returns the crisp outcome, or `None` when no plan fired.
    pub fn process_trigger(&self, trigger: &Trigger) -> Option<bool> {
        let indices = self.inner.plan_index.get(&trigger.signature())?;

        for &idx in indices {
            let plan = &self.inner.plans[idx];
            let Some(bound) = Unifier::try_unify(trigger.literal(), plan.head()) else {
                continue;
            };

            let ctx = Plan::instantiate(plan, self.clone(), bound);
            let guard_holds = plan
                .guard()
                .is_none_or(|g| g.evaluate_bool(&|name| ctx.resolve(name)).value());
            if !guard_holds {
                continue;
            }

            let result = plan.execute(&ctx);
            let crisp = self.inner.config.defuzzifier().crisp(result);

            let mut running = self
                .inner
                .running
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let record = running
                .entry(trigger.literal().structural_hash())
                .or_insert_with(|| RunningPlanRecord {
                    trigger: trigger.clone(),
                    last_success: crisp,
                    runs: 0,
                    fails: 0,
                });
            record.runs += 1;
            if !crisp {
                record.fails += 1;
            }
            record.last_success = crisp;
            return Some(crisp);
        }
        None
    }

    /// Clones the agent into an independent copy with a fresh identity,
    /// fresh plan counters, an empty trigger queue, and - as directed -
    /// a shared or replaced belief base. Variable state is never aliased:
    /// activations always start from fresh contexts.
    #[must_use]
    pub fn clone_agent(&self, beliefs: CloneBeliefs) -> Self {
        let beliefs = match beliefs {
            CloneBeliefs::Share => Arc::clone(&self.inner.beliefs),
            CloneBeliefs::Replace(arena) => Arc::new(RwLock::new(arena)),
        };

        let plans: Vec<Arc<Plan>> = self
            .inner
            .plans
            .iter()
            .map(|p| Arc::new(p.clone_fresh()))
            .collect();

        let capacity = self.inner.config.trigger_queue_capacity.max(1);
        let (pending_tx, pending_rx) = bounded(capacity);

        Self {
            inner: Arc::new(AgentInner {
                id: AgentId::new(),
                state: RwLock::new(self.state()),
                beliefs,
                plan_index: self.inner.plan_index.clone(),
                plans,
                rules: Arc::clone(&self.inner.rules),
                actions: Arc::clone(&self.inner.actions),
                lambdas: Arc::clone(&self.inner.lambdas),
                config: Arc::clone(&self.inner.config),
                pending_tx,
                pending_rx,
                dropped_triggers: AtomicU64::new(0),
                cycle: AtomicU64::new(self.cycle_count()),
                running: RwLock::new(HashMap::new()),
            }),
        }
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("plans", &self.inner.plans.len())
            .field("cycle", &self.cycle_count())
            .finish()
    }
}

/// Builder assembling an agent; configuration errors abort the build.
#[derive(Default)]
pub struct AgentBuilder {
    beliefs: Option<ViewArena>,
    plans: Vec<Plan>,
    rules: RuleLibrary,
    actions: ActionRegistry,
    lambdas: LambdaRegistry,
    config: Option<RuntimeConfig>,
}

impl AgentBuilder {
    /// Seeds the belief arena.
    #[must_use]
    pub fn beliefs(mut self, arena: ViewArena) -> Self {
        self.beliefs = Some(arena);
        self
    }

    /// Adds a plan; declaration order is selection order.
    #[must_use]
    pub fn plan(mut self, plan: Plan) -> Self {
        self.plans.push(plan);
        self
    }

    /// Adds a rule.
    #[must_use]
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.add_rule(rule);
        self
    }

    /// Replaces the rule library wholesale.
    #[must_use]
    pub fn rules(mut self, rules: RuleLibrary) -> Self {
        self.rules = rules;
        self
    }

    /// Replaces the action registry.
    #[must_use]
    pub fn actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    /// Replaces the lambda registry.
    #[must_use]
    pub fn lambdas(mut self, lambdas: LambdaRegistry) -> Self {
        self.lambdas = lambdas;
        self
    }

    /// Sets the runtime configuration.
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the agent.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the rule library still contains
    /// unresolved placeholders.
    pub fn build(self) -> NoemaResult<Agent> {
        self.rules.resolve_placeholders()?;

        let config = self.config.unwrap_or_default();
        let capacity = config.trigger_queue_capacity.max(1);
        let (pending_tx, pending_rx) = bounded(capacity);

        let plans: Vec<Arc<Plan>> = self.plans.into_iter().map(Arc::new).collect();
        let mut plan_index: HashMap<TriggerSignature, Vec<usize>> = HashMap::new();
        for (idx, plan) in plans.iter().enumerate() {
            plan_index
                .entry(plan.trigger().signature())
                .or_default()
                .push(idx);
        }

        Ok(Agent {
            inner: Arc::new(AgentInner {
                id: AgentId::new(),
                state: RwLock::new(RunState::Running),
                beliefs: Arc::new(RwLock::new(self.beliefs.unwrap_or_default())),
                plans,
                plan_index,
                rules: Arc::new(self.rules),
                actions: Arc::new(self.actions),
                lambdas: Arc::new(self.lambdas),
                config: Arc::new(config),
                pending_tx,
                pending_rx,
                dropped_triggers: AtomicU64::new(0),
                cycle: AtomicU64::new(0),
                running: RwLock::new(HashMap::new()),
            }),
        })
    }
}
