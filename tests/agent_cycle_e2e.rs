use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use noema::{
    ActionRegistry, Agent, Annotation, Execution, Expression, FnAction, FuzzyValue,
    LambdaExecution, LambdaSource, Literal, Path, Plan, Rule, RuleLibrary, RuntimeConfig, Term,
    Trigger, Variable,
};

fn goal_head(functor: &str) -> Literal {
    Literal::new(
        functor,
        vec![Term::Variable(Variable::shared(Path::from("X")))],
    )
}

/// Registers an action that bumps a counter and reports the given outcome.
fn counting_action(
    registry: &mut ActionRegistry,
    name: &str,
    counter: &Arc<AtomicUsize>,
    outcome: bool,
) {
    let counter = Arc::clone(counter);
    registry.register(Arc::new(FnAction::new(name, 0, move |_, _, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        vec![FuzzyValue::truth(outcome)]
    })));
}

fn call(name: &str) -> Execution {
    Execution::ActionCall {
        name: Path::from(name),
        args: Vec::new(),
        returns: Vec::new(),
    }
}

#[test]
fn guarded_plans_select_by_declaration_order() {
    // +!goal(X) : X > 5 <- success.
    // +!goal(X) : X <= 5 <- fail.
    let high = Plan::builder()
        .trigger(Trigger::add_goal(goal_head("goal")))
        .guard(Expression::gt(
            Expression::var("X"),
            Expression::atom(Term::from(5.0)),
        ))
        .element(Execution::Constant(true))
        .build()
        .unwrap();
    let low = Plan::builder()
        .trigger(Trigger::add_goal(goal_head("goal")))
        .guard(Expression::le(
            Expression::var("X"),
            Expression::atom(Term::from(5.0)),
        ))
        .element(Execution::Constant(false))
        .build()
        .unwrap();

    let agent = Agent::builder().plan(high).plan(low).build().unwrap();

    agent.raise_goal(Literal::new("goal", vec![Term::from(8.0)]));
    let _ = agent.cycle();
    let record = agent
        .running_plan(&Literal::new("goal", vec![Term::from(8.0)]))
        .unwrap();
    assert!(record.last_success);

    agent.raise_goal(Literal::new("goal", vec![Term::from(2.0)]));
    let _ = agent.cycle();
    let record = agent
        .running_plan(&Literal::new("goal", vec![Term::from(2.0)]))
        .unwrap();
    assert!(!record.last_success);
}

#[test]
fn parallel_body_fails_but_side_effects_remain() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut registry = ActionRegistry::new();
    counting_action(&mut registry, "a", &counter, true);
    counting_action(&mut registry, "b", &counter, false);
    counting_action(&mut registry, "c", &counter, true);

    let plan = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("work")))
        .annotation(Annotation::Parallel)
        .element(call("a"))
        .element(call("b"))
        .element(call("c"))
        .build()
        .unwrap();

    let agent = Agent::builder()
        .plan(plan)
        .actions(registry)
        .build()
        .unwrap();

    let crisp = agent
        .process_trigger(&Trigger::add_goal(Literal::atom("work")))
        .unwrap();

    // One failing element fails the whole parallel body, yet all three
    // actions ran and their side effects stay.
    assert!(!crisp);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[test]
fn sequential_body_runs_every_element_despite_failure() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut registry = ActionRegistry::new();
    counting_action(&mut registry, "first", &counter, true);
    counting_action(&mut registry, "failing", &counter, false);
    counting_action(&mut registry, "last", &counter, true);

    let plan = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("work")))
        .element(call("first"))
        .element(call("failing"))
        .element(call("last"))
        .build()
        .unwrap();

    let agent = Agent::builder()
        .plan(plan)
        .actions(registry)
        .build()
        .unwrap();

    let crisp = agent
        .process_trigger(&Trigger::add_goal(Literal::atom("work")))
        .unwrap();

    // No short-circuit: the element after the failure still executed.
    assert!(!crisp);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[test]
fn repair_chain_accepts_first_success() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut registry = ActionRegistry::new();
    counting_action(&mut registry, "broken1", &counter, false);
    counting_action(&mut registry, "broken2", &counter, false);
    counting_action(&mut registry, "works", &counter, true);
    counting_action(&mut registry, "never", &counter, true);

    // fail << fail << success: ordered alternatives, first success wins.
    let plan = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("repair")))
        .element(Execution::RepairChain(vec![
            call("broken1"),
            call("broken2"),
            call("works"),
            call("never"),
        ]))
        .build()
        .unwrap();

    let agent = Agent::builder()
        .plan(plan)
        .actions(registry)
        .build()
        .unwrap();

    let crisp = agent
        .process_trigger(&Trigger::add_goal(Literal::atom("repair")))
        .unwrap();

    assert!(crisp);
    // The element after the first success was never tried.
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[test]
fn atomic_body_short_circuits_to_success() {
    let plan = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("critical")))
        .annotation(Annotation::Atomic)
        .element(Execution::Constant(false))
        .build()
        .unwrap();

    let agent = Agent::builder().plan(plan).build().unwrap();
    let crisp = agent
        .process_trigger(&Trigger::add_goal(Literal::atom("critical")))
        .unwrap();
    assert!(crisp);
}

#[test]
fn fuzzy_weight_defuzzifies_below_threshold_to_failure() {
    let plan = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("weak")))
        .annotation(Annotation::FuzzyWeight(0.4))
        .element(Execution::Constant(true))
        .build()
        .unwrap();

    let agent = Agent::builder().plan(plan).build().unwrap();
    let crisp = agent
        .process_trigger(&Trigger::add_goal(Literal::atom("weak")))
        .unwrap();

    // true@0.4 is below the default 0.5 threshold.
    assert!(!crisp);
    let record = agent.running_plan(&Literal::atom("weak")).unwrap();
    assert_eq!(record.fails, 1);
}

#[test]
fn ternary_branches_on_condition() {
    let plan = Plan::builder()
        .trigger(Trigger::add_goal(goal_head("check")))
        .element(Execution::Ternary {
            condition: Expression::gt(Expression::var("X"), Expression::atom(Term::from(0.0))),
            on_true: Box::new(Execution::Constant(true)),
            on_false: Box::new(Execution::Constant(false)),
        })
        .build()
        .unwrap();

    let agent = Agent::builder().plan(plan).build().unwrap();
    assert_eq!(
        agent.process_trigger(&Trigger::add_goal(Literal::new(
            "check",
            vec![Term::from(1.0)]
        ))),
        Some(true)
    );
    assert_eq!(
        agent.process_trigger(&Trigger::add_goal(Literal::new(
            "check",
            vec![Term::from(-1.0)]
        ))),
        Some(false)
    );
}

#[test]
fn barrier_timeout_is_failure_not_error() {
    let plan = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("wait")))
        .element(Execution::Barrier {
            condition: Expression::truth(false),
            timeout: Some(Duration::from_millis(30)),
        })
        .build()
        .unwrap();

    let agent = Agent::builder()
        .config(RuntimeConfig {
            barrier_poll_interval: Duration::from_millis(5),
            ..RuntimeConfig::default()
        })
        .plan(plan)
        .build()
        .unwrap();

    let started = std::time::Instant::now();
    let crisp = agent
        .process_trigger(&Trigger::add_goal(Literal::atom("wait")))
        .unwrap();
    assert!(!crisp);
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[test]
fn barrier_with_satisfied_condition_passes() {
    let plan = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("ready")))
        .element(Execution::Barrier {
            condition: Expression::truth(true),
            timeout: None,
        })
        .build()
        .unwrap();

    let agent = Agent::builder().plan(plan).build().unwrap();
    assert_eq!(
        agent.process_trigger(&Trigger::add_goal(Literal::atom("ready"))),
        Some(true)
    );
}

#[test]
fn achievement_goal_defers_to_the_next_cycle() {
    let starter = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("start")))
        .element(Execution::AchievementGoal {
            literal: Literal::atom("next"),
        })
        .build()
        .unwrap();
    let follower = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("next")))
        .element(Execution::Constant(true))
        .build()
        .unwrap();

    let agent = Agent::builder().plan(starter).plan(follower).build().unwrap();

    agent.raise_goal(Literal::atom("start"));
    let first = agent.cycle();
    assert_eq!(first.executed, 1);
    assert!(agent.running_plan(&Literal::atom("next")).is_none());

    let second = agent.cycle();
    assert_eq!(second.executed, 1);
    assert!(agent.running_plan(&Literal::atom("next")).unwrap().last_success);
}

#[test]
fn test_goal_checks_current_beliefs() {
    let plan = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("verify")))
        .element(Execution::TestGoal {
            literal: Literal::new(
                "temperature",
                vec![Term::Variable(Variable::shared(Path::from("T")))],
            ),
        })
        .build()
        .unwrap();

    let agent = Agent::builder().plan(plan).build().unwrap();
    assert_eq!(
        agent.process_trigger(&Trigger::add_goal(Literal::atom("verify"))),
        Some(false)
    );

    agent.believe(Literal::new("temperature", vec![Term::from(20.0)]));
    assert_eq!(
        agent.process_trigger(&Trigger::add_goal(Literal::atom("verify"))),
        Some(true)
    );
}

#[test]
fn action_results_bind_return_variables() {
    let mut registry = ActionRegistry::new();
    registry.register(Arc::new(FnAction::new("measure", 0, |_, _, _, returns| {
        returns.push(Term::from(42.0));
        vec![FuzzyValue::truth(true)]
    })));

    let plan = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("sample")))
        .element(Execution::ActionCall {
            name: Path::from("measure"),
            args: Vec::new(),
            returns: vec![Path::from("Y")],
        })
        .element(Execution::Proof(Expression::eq(
            Expression::var("Y"),
            Expression::atom(Term::from(42.0)),
        )))
        .build()
        .unwrap();

    let agent = Agent::builder()
        .plan(plan)
        .actions(registry)
        .build()
        .unwrap();
    assert_eq!(
        agent.process_trigger(&Trigger::add_goal(Literal::atom("sample"))),
        Some(true)
    );
}

#[test]
fn panicking_action_becomes_plain_failure() {
    let mut registry = ActionRegistry::new();
    registry.register(Arc::new(FnAction::new("explode", 0, |_, _, _, _| {
        panic!("runtime fault inside the action library")
    })));

    let plan = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("risky")))
        .element(call("explode"))
        .build()
        .unwrap();

    let agent = Agent::builder()
        .plan(plan)
        .actions(registry)
        .build()
        .unwrap();

    // The panic is confined to the action boundary.
    assert_eq!(
        agent.process_trigger(&Trigger::add_goal(Literal::atom("risky"))),
        Some(false)
    );
}

#[test]
fn lambda_iterates_each_element_in_isolated_scopes() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut registry = ActionRegistry::new();
    {
        let counter = Arc::clone(&counter);
        registry.register(Arc::new(FnAction::new("observe", 1, move |_, _, args, _| {
            assert!(args[0].as_number().is_ok());
            counter.fetch_add(1, Ordering::SeqCst);
            vec![FuzzyValue::truth(true)]
        })));
    }

    let plan = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("scan")))
        .element(Execution::Lambda(LambdaExecution {
            parallel: false,
            source: LambdaSource::Range {
                from: Expression::atom(Term::from(0.0)),
                to: Expression::atom(Term::from(3.0)),
            },
            element: Path::from("I"),
            body: vec![Execution::ActionCall {
                name: Path::from("observe"),
                args: vec![Expression::var("I")],
                returns: Vec::new(),
            }],
        }))
        .build()
        .unwrap();

    let agent = Agent::builder()
        .plan(plan)
        .actions(registry)
        .build()
        .unwrap();
    assert_eq!(
        agent.process_trigger(&Trigger::add_goal(Literal::atom("scan"))),
        Some(true)
    );
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[test]
fn recursive_rule_through_placeholder_resolution() {
    // countdown(X) :- X <= 0 ? success : (Y = X - 1, $countdown(Y)).
    let identifier = Literal::new(
        "countdown",
        vec![Term::Variable(Variable::shared(Path::from("X")))],
    );

    // The decrement has to land in Y before the recursive call.
    let body = vec![
        Execution::Assignment {
            variable: Path::from("Y"),
            expression: Expression::binary(
                noema::BinaryOp::Sub,
                Expression::var("X"),
                Expression::atom(Term::from(1.0)),
            ),
        },
        Execution::Ternary {
            condition: Expression::le(Expression::var("X"), Expression::atom(Term::from(0.0))),
            on_true: Box::new(Execution::Constant(true)),
            on_false: Box::new(Execution::RuleCall {
                literal: Literal::new(
                    "countdown",
                    vec![Term::Variable(Variable::shared(Path::from("Y")))],
                ),
            }),
        },
    ];
    let mut rules = RuleLibrary::new();
    rules.add_placeholder(identifier.clone());
    rules.add_rule(Rule::new(identifier, body));
    assert!(rules.resolve_placeholders().is_ok());

    let plan = Plan::builder()
        .trigger(Trigger::add_goal(goal_head("count")))
        .element(Execution::RuleCall {
            literal: Literal::new(
                "countdown",
                vec![Term::Variable(Variable::shared(Path::from("X")))],
            ),
        })
        .build()
        .unwrap();

    let agent = Agent::builder().plan(plan).rules(rules).build().unwrap();
    assert_eq!(
        agent.process_trigger(&Trigger::add_goal(Literal::new(
            "count",
            vec![Term::from(3.0)]
        ))),
        Some(true)
    );
}

#[test]
fn suspend_and_resume_fire_sleep_and_wakeup_plans() {
    let sleep_plan = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("sleep")))
        .element(Execution::Constant(true))
        .build()
        .unwrap();
    let wakeup_plan = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("wakeup")))
        .element(Execution::Constant(true))
        .build()
        .unwrap();
    let goal_plan = Plan::builder()
        .trigger(Trigger::add_goal(Literal::atom("task")))
        .element(Execution::Constant(true))
        .build()
        .unwrap();

    let agent = Agent::builder()
        .plan(sleep_plan)
        .plan(wakeup_plan)
        .plan(goal_plan)
        .build()
        .unwrap();

    agent.suspend();
    assert!(agent.running_plan(&Literal::atom("sleep")).unwrap().last_success);

    // While suspended, goals queue up but plan selection is skipped.
    agent.raise_goal(Literal::atom("task"));
    let report = agent.cycle();
    assert_eq!(report.executed, 0);
    assert!(agent.running_plan(&Literal::atom("task")).is_none());

    agent.resume();
    assert!(agent.running_plan(&Literal::atom("wakeup")).unwrap().last_success);

    // The queued goal is processed now.
    let report = agent.cycle();
    assert_eq!(report.executed, 1);
    assert!(agent.running_plan(&Literal::atom("task")).unwrap().last_success);
}

#[test]
fn run_and_fail_counters_survive_reactivation() {
    let plan = Plan::builder()
        .trigger(Trigger::add_goal(goal_head("flaky")))
        .guard(Expression::gt(
            Expression::var("X"),
            Expression::atom(Term::from(0.0)),
        ))
        .element(Execution::Proof(Expression::gt(
            Expression::var("X"),
            Expression::atom(Term::from(10.0)),
        )))
        .build()
        .unwrap();

    let agent = Agent::builder().plan(plan).build().unwrap();

    let _ = agent.process_trigger(&Trigger::add_goal(Literal::new(
        "flaky",
        vec![Term::from(20.0)],
    )));
    let _ = agent.process_trigger(&Trigger::add_goal(Literal::new(
        "flaky",
        vec![Term::from(5.0)],
    )));
    let _ = agent.process_trigger(&Trigger::add_goal(Literal::new(
        "flaky",
        vec![Term::from(30.0)],
    )));

    let plan = &agent.plans()[0];
    assert_eq!(plan.runs(), 3);
    assert_eq!(plan.fails(), 1);
}
