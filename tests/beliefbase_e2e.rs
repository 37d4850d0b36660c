use std::sync::Arc;

use noema::{
    Agent, Execution, Literal, MemoryStorage, Path, Plan, Storage, Term, Trigger, TriggerKind,
    Variable, ViewArena,
};

fn temp(value: f64) -> Literal {
    Literal::new("temperature", vec![Term::from(value)])
}

fn reactive_plan(kind: TriggerKind, functor: &str) -> Plan {
    Plan::builder()
        .trigger(Trigger::new(
            kind,
            Literal::new(
                functor,
                vec![Term::Variable(Variable::shared(Path::from("X")))],
            ),
        ))
        .element(Execution::Constant(true))
        .build()
        .unwrap()
}

#[test]
fn belief_add_emits_exactly_one_add_trigger() {
    let mut arena = ViewArena::default();
    let root = arena.root();

    let triggers = arena.add_literal(root, temp(21.0));
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].kind(), TriggerKind::AddBelief);
    assert_eq!(triggers[0].literal(), &temp(21.0));
    assert_eq!(
        triggers[0].literal().structural_hash(),
        temp(21.0).structural_hash()
    );
}

#[test]
fn belief_add_drives_plan_selection_through_the_cycle() {
    let agent = Agent::builder()
        .plan(reactive_plan(TriggerKind::AddBelief, "temperature"))
        .build()
        .unwrap();

    agent.believe(temp(21.0));
    let report = agent.cycle();
    assert_eq!(report.triggers, 1);
    assert_eq!(report.executed, 1);

    let record = agent.running_plan(&temp(21.0)).unwrap();
    assert!(record.last_success);
    assert_eq!(record.trigger.kind(), TriggerKind::AddBelief);
}

#[test]
fn belief_removal_drives_delete_plans() {
    let agent = Agent::builder()
        .plan(reactive_plan(TriggerKind::DeleteBelief, "temperature"))
        .build()
        .unwrap();

    agent.believe(temp(21.0));
    let _ = agent.cycle();

    agent.disbelieve(&temp(21.0));
    let report = agent.cycle();
    assert_eq!(report.executed, 1);

    // Removing a literal that is gone emits nothing.
    agent.disbelieve(&temp(21.0));
    let report = agent.cycle();
    assert_eq!(report.triggers, 0);
}

#[test]
fn bulk_add_produces_one_trigger_per_literal() {
    let agent = Agent::builder()
        .plan(reactive_plan(TriggerKind::AddBelief, "temperature"))
        .build()
        .unwrap();

    agent.believe(temp(1.0));
    agent.believe(temp(2.0));
    agent.believe(temp(3.0));

    let report = agent.cycle();
    assert_eq!(report.triggers, 3);
    assert_eq!(report.executed, 3);
}

#[test]
fn nested_functor_paths_create_views_on_demand() {
    let agent = Agent::builder().build().unwrap();
    agent.believe(Literal::new("env.sensors.humidity", vec![Term::from(40.0)]));

    let arena = agent.beliefs();
    let arena = arena.read().unwrap();
    // root -> env -> sensors
    assert_eq!(arena.len(), 3);

    let stream = arena.stream(arena.root(), Some(&Path::from("env.sensors")), None);
    assert_eq!(stream.len(), 1);
    assert_eq!(stream[0].functor(), &Path::from("env.sensors.humidity"));
}

#[test]
fn seeded_arena_serves_candidates_without_mutation() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    storage.put_multi("temperature", temp(17.0));
    let arena = ViewArena::new(storage);

    let agent = Agent::builder().beliefs(arena).build().unwrap();
    let candidates = agent.belief_candidates(&temp(17.0).signature());
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0], temp(17.0));
}

#[test]
fn update_runs_while_suspended() {
    let agent = Agent::builder().build().unwrap();
    agent.suspend();

    let before = agent.cycle_count();
    let _ = agent.cycle();
    let _ = agent.cycle();
    assert_eq!(agent.cycle_count(), before + 2);
}
