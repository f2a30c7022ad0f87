// tests/trigger_rules.rs

mod common;

use dagflow::dag::{Graph, GraphBuilder, Readiness, evaluate_trigger_rule};
use dagflow::engine::TaskOutcome;
use dagflow::state::RunInstance;
use dagflow::types::{TaskState, TriggerRule};
use dagflow_test_utils::builders::empty_task;

use common::{date, key, scheduler_for};

fn ok() -> TaskOutcome {
    TaskOutcome::Success(None)
}

fn fail() -> TaskOutcome {
    TaskOutcome::Failed("exit 1".to_string())
}

#[test]
fn all_done_runs_after_a_failure() {
    let graph = GraphBuilder::new("g")
        .task(empty_task("a"))
        .task(empty_task("cleanup").after("a").trigger_rule(TriggerRule::AllDone))
        .build()
        .unwrap();
    let mut scheduler = scheduler_for(vec![graph], 4);

    scheduler.step_start("g", date()).unwrap();
    let step = scheduler.step_completion(&key("g"), "a", 1, fail()).unwrap();
    assert_eq!(step.scheduled_names(), vec!["cleanup"]);

    let step = scheduler
        .step_completion(&key("g"), "cleanup", 1, ok())
        .unwrap();
    assert!(step.run_just_finished);
    assert!(!scheduler.report().unwrap().is_successful());
}

#[test]
fn one_failed_fires_on_the_first_failure_and_skips_otherwise() {
    let graph = GraphBuilder::new("g")
        .task(empty_task("a"))
        .task(empty_task("b"))
        .task(
            empty_task("alert")
                .after("a")
                .after("b")
                .trigger_rule(TriggerRule::OneFailed),
        )
        .task(empty_task("alert_a").after("a").trigger_rule(TriggerRule::OneFailed))
        .build()
        .unwrap();
    let mut scheduler = scheduler_for(vec![graph], 4);

    scheduler.step_start("g", date()).unwrap();

    let step = scheduler.step_completion(&key("g"), "a", 1, ok()).unwrap();
    assert_eq!(step.newly_skipped, vec!["alert_a"]);
    assert!(step.newly_scheduled.is_empty());

    let step = scheduler.step_completion(&key("g"), "b", 1, fail()).unwrap();
    assert_eq!(step.scheduled_names(), vec!["alert"]);

    let report = scheduler.report().unwrap();
    assert_eq!(
        report.task("alert_a").unwrap().reason.as_deref(),
        Some("no upstream task failed")
    );
}

#[test]
fn skipped_upstream_propagates_per_rule() {
    // `gate` is skipped once `a` succeeds; its dependents react by rule.
    let graph = GraphBuilder::new("g")
        .task(empty_task("a"))
        .task(empty_task("gate").after("a").trigger_rule(TriggerRule::OneFailed))
        .task(empty_task("x").after("gate"))
        .task(empty_task("y").after("gate").trigger_rule(TriggerRule::NoneFailed))
        .task(empty_task("z").after("gate").trigger_rule(TriggerRule::NoneSkipped))
        .task(empty_task("w").after("gate").trigger_rule(TriggerRule::AllDone))
        .build()
        .unwrap();
    let mut scheduler = scheduler_for(vec![graph], 4);

    scheduler.step_start("g", date()).unwrap();
    let step = scheduler.step_completion(&key("g"), "a", 1, ok()).unwrap();

    assert_eq!(step.newly_skipped, vec!["gate", "x", "z"]);
    assert_eq!(step.scheduled_names(), vec!["w", "y"]);

    scheduler.step_completion(&key("g"), "w", 1, ok()).unwrap();
    let step = scheduler.step_completion(&key("g"), "y", 1, ok()).unwrap();
    assert!(step.run_just_finished);

    let report = scheduler.report().unwrap();
    assert!(report.is_successful(), "skipped tasks count as success");
    assert_eq!(report.state_of("x"), Some(TaskState::Skipped));
    assert_eq!(
        report.task("x").unwrap().reason.as_deref(),
        Some("upstream task 'gate' skipped")
    );
}

#[test]
fn all_failed_waits_for_every_upstream() {
    let graph = GraphBuilder::new("g")
        .task(empty_task("a"))
        .task(empty_task("b"))
        .task(empty_task("c"))
        .task(
            empty_task("both_failed")
                .after("a")
                .after("b")
                .trigger_rule(TriggerRule::AllFailed),
        )
        .task(
            empty_task("mixed")
                .after("a")
                .after("c")
                .trigger_rule(TriggerRule::AllFailed),
        )
        .build()
        .unwrap();
    let mut scheduler = scheduler_for(vec![graph], 4);

    scheduler.step_start("g", date()).unwrap();

    let step = scheduler.step_completion(&key("g"), "a", 1, fail()).unwrap();
    assert!(step.newly_scheduled.is_empty());
    assert!(step.newly_skipped.is_empty());

    let step = scheduler.step_completion(&key("g"), "b", 1, fail()).unwrap();
    assert_eq!(step.scheduled_names(), vec!["both_failed"]);

    let step = scheduler.step_completion(&key("g"), "c", 1, ok()).unwrap();
    assert_eq!(step.newly_skipped, vec!["mixed"]);
}

#[test]
fn one_success_does_not_wait_for_the_rest() {
    let graph = GraphBuilder::new("g")
        .task(empty_task("a"))
        .task(empty_task("b"))
        .task(empty_task("c"))
        .task(
            empty_task("first_wins")
                .after("a")
                .after("b")
                .trigger_rule(TriggerRule::OneSuccess),
        )
        .task(
            empty_task("none_won")
                .after("b")
                .after("c")
                .trigger_rule(TriggerRule::OneSuccess),
        )
        .build()
        .unwrap();
    let mut scheduler = scheduler_for(vec![graph], 4);

    scheduler.step_start("g", date()).unwrap();

    let step = scheduler.step_completion(&key("g"), "a", 1, ok()).unwrap();
    assert_eq!(step.scheduled_names(), vec!["first_wins"]);
    assert_eq!(scheduler.run_state_of("b"), Some(TaskState::Running));

    let step = scheduler.step_completion(&key("g"), "b", 1, fail()).unwrap();
    assert!(step.newly_failed.iter().all(|t| t != "none_won"));

    let step = scheduler.step_completion(&key("g"), "c", 1, fail()).unwrap();
    assert!(step.newly_failed.contains(&"none_won".to_string()));

    let report = scheduler.report().unwrap();
    assert_eq!(report.state_of("none_won"), Some(TaskState::UpstreamFailed));
    assert_eq!(
        report.task("none_won").unwrap().reason.as_deref(),
        Some("upstream task 'b' failed")
    );
}

#[test]
fn always_runs_on_the_first_pass() {
    let graph = GraphBuilder::new("g")
        .task(empty_task("a"))
        .task(empty_task("heartbeat").after("a").trigger_rule(TriggerRule::Always))
        .build()
        .unwrap();
    let mut scheduler = scheduler_for(vec![graph], 4);

    let step = scheduler.step_start("g", date()).unwrap();
    assert_eq!(step.scheduled_names(), vec!["a", "heartbeat"]);
}

#[test]
fn none_failed_is_upstream_failed_by_a_failure() {
    let graph = GraphBuilder::new("g")
        .task(empty_task("a"))
        .task(empty_task("t").after("a").trigger_rule(TriggerRule::NoneFailed))
        .build()
        .unwrap();
    let mut scheduler = scheduler_for(vec![graph], 4);

    scheduler.step_start("g", date()).unwrap();
    let step = scheduler.step_completion(&key("g"), "a", 1, fail()).unwrap();
    assert_eq!(step.newly_failed, vec!["a", "t"]);
}

fn two_parents(rule: TriggerRule) -> Graph {
    GraphBuilder::new("g")
        .task(empty_task("p"))
        .task(empty_task("q"))
        .task(empty_task("t").after("p").after("q").trigger_rule(rule))
        .build()
        .unwrap()
}

fn readiness(rule: TriggerRule, p: TaskState, q: TaskState) -> Readiness {
    let graph = two_parents(rule);
    let mut run = RunInstance::new(&graph, date());
    run.tasks.get_mut("p").unwrap().state = p;
    run.tasks.get_mut("q").unwrap().state = q;
    evaluate_trigger_rule(&graph, &run, graph.node("t").unwrap())
}

#[test]
fn rule_table() {
    use TaskState::*;
    use TriggerRule::*;

    assert_eq!(readiness(AllSuccess, Success, Success), Readiness::Ready);
    assert_eq!(readiness(AllSuccess, Success, Running), Readiness::Wait);
    assert!(matches!(
        readiness(AllSuccess, Failed, Running),
        Readiness::UpstreamFailed(_)
    ));
    assert!(matches!(
        readiness(AllSuccess, Skipped, Success),
        Readiness::Skip(_)
    ));

    assert_eq!(readiness(AllFailed, Failed, UpstreamFailed), Readiness::Ready);
    assert_eq!(readiness(AllDone, Skipped, Failed), Readiness::Ready);
    assert_eq!(readiness(AllDone, Skipped, Pending), Readiness::Wait);
    assert_eq!(readiness(OneSuccess, Success, Pending), Readiness::Ready);
    assert_eq!(readiness(OneFailed, UpstreamFailed, Running), Readiness::Ready);
    assert_eq!(readiness(NoneFailed, Success, Skipped), Readiness::Ready);
    assert_eq!(readiness(NoneSkipped, Success, Failed), Readiness::Ready);
    assert_eq!(readiness(Always, Pending, Pending), Readiness::Ready);
}

#[test]
fn upstream_failure_reason_names_the_root_cause() {
    let graph = two_parents(TriggerRule::AllSuccess);
    let mut run = RunInstance::new(&graph, date());
    let p = run.tasks.get_mut("p").unwrap();
    p.state = TaskState::UpstreamFailed;
    p.reason = Some("upstream task 'root' failed".to_string());
    run.tasks.get_mut("q").unwrap().state = TaskState::Success;

    assert_eq!(
        evaluate_trigger_rule(&graph, &run, graph.node("t").unwrap()),
        Readiness::UpstreamFailed("upstream task 'root' failed".to_string())
    );
}
