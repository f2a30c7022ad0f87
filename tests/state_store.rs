// tests/state_store.rs

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use dagflow::errors::DagflowError;
use dagflow::fs::RealFileSystem;
use dagflow::fs::mock::MockFileSystem;
use dagflow::state::{FileStateStore, MemoryStateStore, RunKey, StateStore, TaskInstance};
use dagflow::types::TaskState;
use dagflow_test_utils::builders::graph_of;
use dagflow_test_utils::logical_date;
use tempfile::TempDir;

use common::{date, key};

fn running(try_number: u32) -> TaskInstance {
    TaskInstance {
        state: TaskState::Running,
        try_number,
        output: None,
        reason: None,
    }
}

/// Exercise the store contract shared by every implementation.
fn check_store_contract(store: &mut dyn StateStore) {
    let graph = graph_of("etl", &[("extract", &[]), ("load", &["extract"])]);

    let run = store.create(&graph, date()).unwrap();
    assert_eq!(run.key, key("etl"));
    assert!(!run.cancelled);
    assert!(run.tasks.values().all(|t| *t == TaskInstance::pending()));

    // Same key twice.
    assert!(matches!(
        store.create(&graph, date()),
        Err(DagflowError::RunAlreadyExists { .. })
    ));

    assert_eq!(store.get(&key("etl"), "extract").unwrap(), TaskState::Pending);

    store.set(&key("etl"), "extract", running(1)).unwrap();
    let mut done = running(1).with_state(TaskState::Success);
    done.output = Some("rows.csv".to_string());
    store.set(&key("etl"), "extract", done).unwrap();

    let loaded = store.load(&key("etl")).unwrap();
    assert_eq!(loaded.tasks["extract"].state, TaskState::Success);
    assert_eq!(loaded.tasks["extract"].try_number, 1);
    assert_eq!(loaded.tasks["extract"].output.as_deref(), Some("rows.csv"));

    // Terminal states are immutable.
    match store.set(&key("etl"), "extract", running(2)) {
        Err(DagflowError::InvalidTransition { task, from, to }) => {
            assert_eq!(task, "extract");
            assert_eq!(from, TaskState::Success);
            assert_eq!(to, TaskState::Running);
        }
        other => panic!("expected InvalidTransition, got {other:?}"),
    }

    // Pending cannot jump straight to Success.
    assert!(matches!(
        store.set(&key("etl"), "load", TaskInstance::pending().with_state(TaskState::Success)),
        Err(DagflowError::InvalidTransition { .. })
    ));

    assert!(matches!(
        store.get(&key("etl"), "nope"),
        Err(DagflowError::TaskNotFound(_))
    ));
    assert!(matches!(
        store.load(&RunKey::new("etl", logical_date(2030, 1, 1))),
        Err(DagflowError::RunNotFound { .. })
    ));

    store.mark_cancelled(&key("etl")).unwrap();
    assert!(store.load(&key("etl")).unwrap().cancelled);

    let other = graph_of("alpha", &[("only", &[])]);
    store.create(&other, logical_date(2024, 2, 1)).unwrap();
    store.create(&graph, logical_date(2023, 12, 31)).unwrap();
    assert_eq!(
        store.runs().unwrap(),
        vec![
            RunKey::new("alpha", logical_date(2024, 2, 1)),
            RunKey::new("etl", logical_date(2023, 12, 31)),
            RunKey::new("etl", date()),
        ]
    );
}

#[test]
fn memory_store_contract() {
    let mut store = MemoryStateStore::new();
    check_store_contract(&mut store);
}

#[test]
fn file_store_contract_on_mock_fs() {
    let mut store = FileStateStore::new(Arc::new(MockFileSystem::new()), PathBuf::from("state"));
    check_store_contract(&mut store);
}

#[test]
fn file_store_contract_on_disk() {
    let dir = TempDir::new().unwrap();
    let mut store = FileStateStore::new(Arc::new(RealFileSystem), dir.path().join("state"));
    check_store_contract(&mut store);
}

#[test]
fn file_store_writes_one_toml_document_per_run() {
    let fs = MockFileSystem::new();
    let mut store = FileStateStore::new(Arc::new(fs.clone()), PathBuf::from("state"));
    let graph = graph_of("etl", &[("extract", &[])]);

    store.create(&graph, date()).unwrap();
    store.set(&key("etl"), "extract", running(1)).unwrap();

    let path = store.run_path(&key("etl"));
    assert_eq!(
        path,
        PathBuf::from("state/etl/20240101T000000Z_000000000.toml")
    );

    let contents = fs.contents(&path).expect("run document written");
    assert!(contents.contains("[tasks.extract]"));
    assert!(contents.contains("state = \"running\""));
    assert!(contents.contains("try_number = 1"));

    // The temporary file is renamed away.
    assert!(fs.contents(path.with_extension("toml.tmp")).is_none());
}

#[test]
fn file_store_state_survives_a_new_store_instance() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("state");
    let graph = graph_of("etl", &[("extract", &[]), ("load", &["extract"])]);

    {
        let mut store = FileStateStore::new(Arc::new(RealFileSystem), root.clone());
        store.create(&graph, date()).unwrap();
        store.set(&key("etl"), "extract", running(1)).unwrap();
    }

    let mut reopened = FileStateStore::new(Arc::new(RealFileSystem), root);
    assert_eq!(reopened.get(&key("etl"), "extract").unwrap(), TaskState::Running);
    assert!(matches!(
        reopened.create(&graph, date()),
        Err(DagflowError::RunAlreadyExists { .. })
    ));
    assert_eq!(reopened.runs().unwrap(), vec![key("etl")]);
}

#[test]
fn unreadable_run_documents_are_skipped_when_listing() {
    let fs = MockFileSystem::new();
    fs.add_file("state/etl/garbage.toml", "not = [valid");
    let mut store = FileStateStore::new(Arc::new(fs), PathBuf::from("state"));
    store
        .create(&graph_of("etl", &[("a", &[])]), date())
        .unwrap();

    assert_eq!(store.runs().unwrap(), vec![key("etl")]);
}

#[test]
fn retry_re_enqueue_is_the_only_way_back_to_pending() {
    assert!(TaskState::Running.can_transition_to(TaskState::Pending));
    assert!(!TaskState::Pending.can_transition_to(TaskState::Pending));
    for terminal in [
        TaskState::Success,
        TaskState::Failed,
        TaskState::Skipped,
        TaskState::UpstreamFailed,
    ] {
        assert!(terminal.is_terminal());
        assert!(!terminal.can_transition_to(TaskState::Pending));
        assert!(!terminal.can_transition_to(TaskState::Running));
    }
}
