use std::sync::Arc;

use loopscope_config::PlaybackConfig;
use loopscope_core::prelude::*;
use loopscope_engine::{Outcome, StepDispatcher};
use loopscope_simulator::replay::run_to_end;
use loopscope_simulator::validation::{check, validate};
use loopscope_simulator::{replay, Catalog, ValidationMode};

fn catalog() -> Catalog {
    Catalog::builtin().expect("built-in catalog loads")
}

fn loaded(id: &str) -> StepDispatcher {
    let mut dispatcher = StepDispatcher::new(Environment::Browser, PlaybackConfig::default());
    dispatcher.load_scenario(catalog().get(id).unwrap());
    dispatcher
}

fn stepped(id: &str, steps: usize) -> StepDispatcher {
    let mut dispatcher = loaded(id);
    for _ in 0..steps {
        assert_eq!(dispatcher.step_forward(), Outcome::Applied);
    }
    dispatcher
}

#[test]
fn every_builtin_replays_to_its_expected_output() {
    for scenario in catalog().iter() {
        let report = replay(Arc::clone(scenario), Environment::Browser, None);
        let verification = report.verify(scenario);
        assert!(
            verification.passed(),
            "{}: expected {:?}, got {:?}",
            scenario.id,
            verification.expected,
            verification.actual
        );
        assert_eq!(report.steps_applied, scenario.len() as u64, "{}", scenario.id);
        assert_eq!(report.final_status, Status::Paused, "{}", scenario.id);
    }
}

#[test]
fn every_builtin_drains_its_stack_and_queues() {
    for scenario in catalog().iter() {
        let mut dispatcher = loaded(&scenario.id);
        run_to_end(&mut dispatcher);
        let sim = &dispatcher.state().sim;
        assert!(sim.call_stack.is_empty(), "{} left frames", scenario.id);
        assert!(sim.microtask_queue.is_empty(), "{}", scenario.id);
        assert!(sim.macrotask_queue.is_empty(), "{}", scenario.id);
        assert!(sim.priority_queue.is_empty(), "{}", scenario.id);
        assert!(sim.pending_operations.is_empty(), "{}", scenario.id);
        assert!(dispatcher.is_finished());

        assert_eq!(dispatcher.step_forward(), Outcome::Finished);
        assert_eq!(dispatcher.status(), Status::Completed);
    }
}

#[test]
fn builtins_pass_strict_validation() {
    for scenario in catalog().iter() {
        let environment = scenario.environment.resolve(Environment::Browser);
        assert!(
            validate(scenario, environment).is_empty(),
            "{}: {:?}",
            scenario.id,
            validate(scenario, environment)
        );
        assert!(check(scenario, environment, true).is_ok());
    }
}

#[test]
fn microtask_runs_before_timeout() {
    let mut dispatcher = loaded("settimeout-vs-promise");
    run_to_end(&mut dispatcher);
    let state = dispatcher.state();

    let console: Vec<_> = state.sim.console_output.iter().cloned().collect();
    assert_eq!(console, vec!["start", "end", "promise", "timeout"]);

    let dequeues: Vec<_> = state
        .event_log
        .iter()
        .filter(|entry| entry.action == EventAction::Dequeue)
        .map(|entry| entry.target)
        .collect();
    assert_eq!(
        dequeues,
        vec![EventTarget::MicrotaskQueue, EventTarget::MacrotaskQueue]
    );
}

#[test]
fn microtasks_starve_the_timer() {
    let report = replay(
        catalog().get("promise-race-condition").unwrap(),
        Environment::Browser,
        None,
    );
    assert_eq!(
        report.console_output,
        vec!["sync", "microtask 3", "microtask 2", "microtask 1", "timeout"]
    );
}

#[test]
fn server_scenarios_ignore_the_active_environment() {
    let report = replay(
        catalog().get("nexttick-vs-promise").unwrap(),
        Environment::Browser,
        None,
    );
    assert_eq!(report.environment, Environment::Server);

    let dispatcher = loaded("raf-vs-timeout");
    assert_eq!(dispatcher.environment(), Environment::Browser);
}

#[test]
fn digests_are_stable_and_distinguish_scenarios() {
    let catalog = catalog();
    let first = replay(catalog.get("mixed-async").unwrap(), Environment::Browser, None);
    let second = replay(catalog.get("mixed-async").unwrap(), Environment::Browser, None);
    assert_eq!(first.digest, second.digest);

    let other = replay(catalog.get("microtask-chain").unwrap(), Environment::Browser, None);
    assert_ne!(first.digest, other.digest);
}

#[test]
fn undo_restores_the_previous_step() {
    let reference = stepped("mixed-async", 7);
    let mut dispatcher = stepped("mixed-async", 8);
    let log_len = dispatcher.state().event_log.len();

    assert_eq!(dispatcher.undo(), Outcome::Applied);
    assert_eq!(dispatcher.state().sim, reference.state().sim);
    assert_eq!(dispatcher.state().history.len(), 7);
    assert_eq!(dispatcher.state().event_log.len(), log_len);
}

#[test]
fn seek_matches_a_fresh_run_to_that_step() {
    let reference = stepped("async-await-basics", 10);
    let mut dispatcher = loaded("async-await-basics");
    run_to_end(&mut dispatcher);

    assert_eq!(dispatcher.seek(10), Outcome::Applied);
    assert_eq!(dispatcher.state().sim, reference.state().sim);
    assert_eq!(dispatcher.state().event_log, reference.state().event_log);
    assert_eq!(dispatcher.state().history.len(), 10);
    assert!(dispatcher.state().event_log.iter().all(|entry| entry.step <= 10));

    run_to_end(&mut dispatcher);
    let expected = &catalog().get("async-await-basics").unwrap().expected_output;
    let console: Vec<_> = dispatcher.state().sim.console_output.iter().cloned().collect();
    assert_eq!(&console, expected);
}

#[test]
fn scenario_directory_loads_in_file_name_order() {
    let mut catalog = Catalog::empty(ValidationMode::Strict, Environment::Browser);
    let loaded = catalog
        .load_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/../scenarios"))
        .unwrap();
    assert_eq!(loaded, 14);

    let ids = catalog.ids();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

#[test]
fn report_serializes_in_camel_case() {
    let report = replay(catalog().get("hello-sync").unwrap(), Environment::Browser, None);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["scenarioId"], "hello-sync");
    assert_eq!(json["finalStatus"], "paused");
    assert!(json["digest"].as_str().unwrap().len() == 64);
}
