// tests/scheduler_steps.rs

mod common;

use std::time::Duration;

use dagflow::dag::{CANCELLED_REASON, GraphBuilder};
use dagflow::engine::TaskOutcome;
use dagflow::errors::DagflowError;
use dagflow::report::RunOutcome;
use dagflow::types::TaskState;
use dagflow_test_utils::builders::{empty_task, graph_of};
use dagflow_test_utils::logical_date;

use common::{date, key, names, scheduler_for};

fn ok() -> TaskOutcome {
    TaskOutcome::Success(None)
}

fn fail(reason: &str) -> TaskOutcome {
    TaskOutcome::Failed(reason.to_string())
}

#[test]
fn zero_dependency_tasks_are_dispatched_on_the_first_pass() {
    let graph = graph_of("g", &[("c", &["a"]), ("b", &[]), ("a", &[])]);
    let mut scheduler = scheduler_for(vec![graph], 4);

    let step = scheduler.step_start("g", date()).unwrap();

    assert_eq!(step.scheduled_names(), vec!["a", "b"]);
    assert!(step.newly_scheduled.iter().all(|t| t.try_number() == 1));
    assert_eq!(scheduler.run_state_of("a"), Some(TaskState::Running));
    assert_eq!(scheduler.run_state_of("c"), Some(TaskState::Pending));
    assert!(!scheduler.is_idle());
}

#[test]
fn failure_marks_every_descendant_upstream_failed() {
    let graph = graph_of(
        "g",
        &[("A", &[]), ("B", &["A"]), ("C", &["B"]), ("D", &[])],
    );
    let mut scheduler = scheduler_for(vec![graph], 4);

    let start = scheduler.step_start("g", date()).unwrap();
    assert_eq!(start.scheduled_names(), vec!["A", "D"]);

    let step = scheduler
        .step_completion(&key("g"), "A", 1, fail("boom"))
        .unwrap();
    assert!(step.newly_scheduled.is_empty());
    assert_eq!(step.newly_failed, vec!["A", "B", "C"]);
    assert!(!step.run_just_finished);

    let step = scheduler.step_completion(&key("g"), "D", 1, ok()).unwrap();
    assert!(step.newly_scheduled.is_empty());
    assert!(step.run_just_finished);
    assert!(scheduler.is_idle());

    let report = scheduler.report().unwrap();
    assert_eq!(report.outcome(), RunOutcome::Failed);
    assert_eq!(report.state_of("A"), Some(TaskState::Failed));
    assert_eq!(report.task("A").unwrap().reason.as_deref(), Some("boom"));
    for task in ["B", "C"] {
        let t = report.task(task).unwrap();
        assert_eq!(t.state, TaskState::UpstreamFailed);
        assert_eq!(t.try_number, 0, "{task} must never be dispatched");
        assert_eq!(t.reason.as_deref(), Some("upstream task 'A' failed"));
    }
    assert_eq!(report.state_of("D"), Some(TaskState::Success));
}

#[test]
fn retries_two_fail_fail_succeed_ends_in_success() {
    let graph = GraphBuilder::new("g")
        .task(empty_task("A").retries(2).retry_delay(Duration::from_millis(10)))
        .build()
        .unwrap();
    let mut scheduler = scheduler_for(vec![graph], 1);

    let start = scheduler.step_start("g", date()).unwrap();
    assert_eq!(start.newly_scheduled[0].try_number(), 1);
    assert_eq!(start.newly_scheduled[0].delay, Duration::ZERO);

    let step = scheduler
        .step_completion(&key("g"), "A", 1, fail("first"))
        .unwrap();
    assert_eq!(step.retried, vec!["A"]);
    assert_eq!(step.newly_scheduled.len(), 1);
    assert_eq!(step.newly_scheduled[0].try_number(), 2);
    assert_eq!(step.newly_scheduled[0].delay, Duration::from_millis(10));

    let step = scheduler
        .step_completion(&key("g"), "A", 2, fail("second"))
        .unwrap();
    assert_eq!(step.newly_scheduled[0].try_number(), 3);

    let step = scheduler.step_completion(&key("g"), "A", 3, ok()).unwrap();
    assert!(step.run_just_finished);

    let report = scheduler.report().unwrap();
    assert!(report.is_successful());
    let a = report.task("A").unwrap();
    assert_eq!(a.state, TaskState::Success);
    assert_eq!(a.try_number, 3);
    assert_eq!(a.reason, None);
}

#[test]
fn retries_two_failing_three_times_ends_in_failed() {
    let graph = GraphBuilder::new("g")
        .task(empty_task("A").retries(2))
        .task(empty_task("B").after("A"))
        .build()
        .unwrap();
    let mut scheduler = scheduler_for(vec![graph], 1);

    scheduler.step_start("g", date()).unwrap();
    scheduler
        .step_completion(&key("g"), "A", 1, fail("first"))
        .unwrap();
    scheduler
        .step_completion(&key("g"), "A", 2, fail("second"))
        .unwrap();
    let step = scheduler
        .step_completion(&key("g"), "A", 3, fail("third"))
        .unwrap();

    assert!(step.retried.is_empty());
    assert_eq!(step.newly_failed, vec!["A", "B"]);
    assert!(step.run_just_finished);

    let report = scheduler.report().unwrap();
    let a = report.task("A").unwrap();
    assert_eq!(a.state, TaskState::Failed);
    assert_eq!(a.try_number, 3);
    assert_eq!(a.reason.as_deref(), Some("third"));
    assert_eq!(report.state_of("B"), Some(TaskState::UpstreamFailed));
}

#[test]
fn timeout_is_treated_as_a_failure() {
    let graph = graph_of("g", &[("slow", &[])]);
    let mut scheduler = scheduler_for(vec![graph], 1);

    scheduler.step_start("g", date()).unwrap();
    scheduler
        .step_completion(
            &key("g"),
            "slow",
            1,
            TaskOutcome::TimedOut(Duration::from_millis(100)),
        )
        .unwrap();

    let report = scheduler.report().unwrap();
    let slow = report.task("slow").unwrap();
    assert_eq!(slow.state, TaskState::Failed);
    assert_eq!(slow.reason.as_deref(), Some("timed out after 100ms"));
}

#[test]
fn re_evaluation_without_state_change_dispatches_nothing() {
    let graph = graph_of("g", &[("a", &[]), ("b", &["a"]), ("c", &[])]);
    let mut scheduler = scheduler_for(vec![graph], 4);

    let start = scheduler.step_start("g", date()).unwrap();
    assert_eq!(start.scheduled_names(), vec!["a", "c"]);

    for _ in 0..3 {
        let step = scheduler.step_evaluate().unwrap();
        assert!(step.newly_scheduled.is_empty());
        assert!(step.newly_failed.is_empty());
        assert!(!step.run_just_finished);
    }

    let step = scheduler.step_completion(&key("g"), "a", 1, ok()).unwrap();
    assert_eq!(step.scheduled_names(), vec!["b"]);
    assert!(scheduler.step_evaluate().unwrap().newly_scheduled.is_empty());
}

#[test]
fn fan_out_after_a_single_root() {
    // A; B after A; C after A.
    let graph = graph_of("g", &[("A", &[]), ("B", &["A"]), ("C", &["A"])]);
    let mut scheduler = scheduler_for(vec![graph], 4);

    assert_eq!(
        scheduler.step_start("g", date()).unwrap().scheduled_names(),
        vec!["A"]
    );

    let step = scheduler.step_completion(&key("g"), "A", 1, ok()).unwrap();
    assert_eq!(step.scheduled_names(), vec!["B", "C"]);

    let step = scheduler.step_completion(&key("g"), "B", 1, ok()).unwrap();
    assert!(!step.run_just_finished);

    let step = scheduler.step_completion(&key("g"), "C", 1, ok()).unwrap();
    assert!(step.run_just_finished);
    assert!(scheduler.report().unwrap().is_successful());
}

#[test]
fn fan_out_run_fails_when_one_branch_fails() {
    let graph = graph_of("g", &[("A", &[]), ("B", &["A"]), ("C", &["A"])]);
    let mut scheduler = scheduler_for(vec![graph], 4);

    scheduler.step_start("g", date()).unwrap();
    scheduler.step_completion(&key("g"), "A", 1, ok()).unwrap();
    scheduler.step_completion(&key("g"), "B", 1, ok()).unwrap();
    let step = scheduler
        .step_completion(&key("g"), "C", 1, fail("exit 1"))
        .unwrap();

    assert!(step.run_just_finished);
    let report = scheduler.report().unwrap();
    assert!(!report.is_successful());
    assert_eq!(report.outcome(), RunOutcome::Failed);
}

#[test]
fn parallelism_width_is_never_exceeded() {
    let graph = graph_of(
        "wide",
        &[("a", &[]), ("b", &[]), ("c", &[]), ("d", &[]), ("e", &[])],
    );
    let mut scheduler = scheduler_for(vec![graph], 2);

    let start = scheduler.step_start("wide", date()).unwrap();
    assert_eq!(start.scheduled_names(), vec!["a", "b"]);

    let mut running = names(&start.newly_scheduled);
    let mut order = running.clone();
    while let Some(done) = running.first().cloned() {
        running.remove(0);
        let step = scheduler
            .step_completion(&key("wide"), &done, 1, ok())
            .unwrap();
        running.extend(names(&step.newly_scheduled));
        order.extend(names(&step.newly_scheduled));

        let snapshot = scheduler.snapshot().unwrap();
        assert!(snapshot.count_in(TaskState::Running) <= 2);
        assert_eq!(snapshot.count_in(TaskState::Running), running.len());
    }

    assert_eq!(order, vec!["a", "b", "c", "d", "e"]);
    assert!(scheduler.report().unwrap().is_successful());
}

#[test]
fn stale_completions_are_ignored() {
    let graph = graph_of("g", &[("a", &[]), ("b", &["a"])]);
    let mut scheduler = scheduler_for(vec![graph], 4);
    scheduler.step_start("g", date()).unwrap();

    // Wrong try number.
    let step = scheduler.step_completion(&key("g"), "a", 2, ok()).unwrap();
    assert!(step.newly_scheduled.is_empty());
    assert_eq!(scheduler.run_state_of("a"), Some(TaskState::Running));

    // Task that is not running.
    let step = scheduler.step_completion(&key("g"), "b", 1, ok()).unwrap();
    assert!(step.newly_scheduled.is_empty());
    assert_eq!(scheduler.run_state_of("b"), Some(TaskState::Pending));

    // Unknown task.
    let step = scheduler.step_completion(&key("g"), "zzz", 1, ok()).unwrap();
    assert!(step.newly_scheduled.is_empty());

    // Another run.
    let other = dagflow::state::RunKey::new("g", logical_date(1999, 1, 1));
    let step = scheduler.step_completion(&other, "a", 1, ok()).unwrap();
    assert!(step.newly_scheduled.is_empty());
    assert_eq!(scheduler.run_state_of("a"), Some(TaskState::Running));

    // The real completion still works, and a duplicate of it is stale.
    let step = scheduler.step_completion(&key("g"), "a", 1, ok()).unwrap();
    assert_eq!(step.scheduled_names(), vec!["b"]);
    let step = scheduler.step_completion(&key("g"), "a", 1, ok()).unwrap();
    assert!(step.newly_scheduled.is_empty());
}

#[test]
fn cancel_stops_dispatch_and_never_retries() {
    let graph = GraphBuilder::new("g")
        .task(empty_task("a").retries(3))
        .task(empty_task("b").after("a"))
        .task(empty_task("c").after("b"))
        .task(empty_task("d"))
        .build()
        .unwrap();
    let mut scheduler = scheduler_for(vec![graph], 1);

    let start = scheduler.step_start("g", date()).unwrap();
    assert_eq!(start.scheduled_names(), vec!["a"]);

    let step = scheduler.cancel().unwrap();
    assert!(step.newly_scheduled.is_empty());
    assert_eq!(step.newly_failed, vec!["b", "c", "d"]);
    assert!(!step.run_just_finished);
    assert_eq!(scheduler.run_state_of("a"), Some(TaskState::Running));

    // The running task's outcome is still recorded, without a retry.
    let step = scheduler
        .step_completion(&key("g"), "a", 1, fail("interrupted"))
        .unwrap();
    assert!(step.retried.is_empty());
    assert!(step.newly_scheduled.is_empty());
    assert!(step.run_just_finished);

    let report = scheduler.report().unwrap();
    assert!(report.cancelled);
    assert_eq!(report.state_of("a"), Some(TaskState::Failed));
    for task in ["b", "c", "d"] {
        let t = report.task(task).unwrap();
        assert_eq!(t.state, TaskState::UpstreamFailed);
        assert_eq!(t.reason.as_deref(), Some(CANCELLED_REASON));
    }

    // Cancelling an idle scheduler does nothing.
    let step = scheduler.cancel().unwrap();
    assert!(step.newly_failed.is_empty());
}

#[test]
fn start_errors() {
    let graph = graph_of("g", &[("a", &[])]);
    let mut scheduler = scheduler_for(vec![graph], 1);

    assert!(matches!(
        scheduler.step_start("missing", date()),
        Err(DagflowError::UnknownDag(_))
    ));

    scheduler.step_start("g", date()).unwrap();
    assert!(matches!(
        scheduler.step_start("g", logical_date(2024, 1, 2)),
        Err(DagflowError::RunInProgress(_))
    ));

    scheduler.step_completion(&key("g"), "a", 1, ok()).unwrap();
    assert!(scheduler.is_idle());
    assert!(matches!(
        scheduler.step_start("g", date()),
        Err(DagflowError::RunAlreadyExists { .. })
    ));

    // A new logical date is a new run.
    let step = scheduler.step_start("g", logical_date(2024, 1, 2)).unwrap();
    assert_eq!(step.scheduled_names(), vec!["a"]);
}

#[test]
fn context_carries_upstream_outputs_and_params() {
    let graph = GraphBuilder::new("g")
        .task(empty_task("extract"))
        .task(empty_task("other"))
        .task(
            empty_task("load")
                .after("extract")
                .after("other")
                .param("location", "europe-west1")
                .param("batch", 500),
        )
        .build()
        .unwrap();
    let mut scheduler = scheduler_for(vec![graph], 4);

    scheduler.step_start("g", date()).unwrap();
    scheduler
        .step_completion(
            &key("g"),
            "extract",
            1,
            TaskOutcome::Success(Some("rows.csv".to_string())),
        )
        .unwrap();
    let step = scheduler
        .step_completion(&key("g"), "other", 1, ok())
        .unwrap();

    let load = &step.newly_scheduled[0];
    assert_eq!(load.name, "load");
    let ctx = &load.context;
    assert_eq!(ctx.dag_id, "g");
    assert_eq!(ctx.task_id, "load");
    assert_eq!(ctx.logical_date, date());
    assert_eq!(ctx.try_number, 1);
    assert_eq!(ctx.upstream_output("extract"), Some("rows.csv"));
    assert_eq!(ctx.upstream_output("other"), None);
    assert_eq!(
        ctx.param("location").and_then(|v| v.as_str()),
        Some("europe-west1")
    );
    assert_eq!(ctx.param("batch").and_then(|v| v.as_integer()), Some(500));
}
