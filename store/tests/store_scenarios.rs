//! End-to-end scenarios driving the store, the diff pipeline, and the
//! fanout coordinator together, the way an agent runtime would.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{Value, json};

use store::agent::{AgentState, AgentsView, RecordHistory, record_history, update_should_act};
use store::container::Store;
use store::diff::Delta;
use store::error::Error;
use store::fanout::{FanoutResult, TaskResult};
use store::mutation::Mutation;
use store::path::PathScope;
use store::test_support::{agents, message};

#[derive(Debug, Serialize)]
struct AppState {
    agents: BTreeMap<String, AgentState>,
    scratch: BTreeMap<String, Value>,
}

impl AgentsView for AppState {
    fn agents(&self) -> &BTreeMap<String, AgentState> {
        &self.agents
    }

    fn agents_mut(&mut self) -> &mut BTreeMap<String, AgentState> {
        &mut self.agents
    }
}

fn app_store() -> Store<AppState> {
    Store::builder()
        .mutation(update_should_act())
        .mutation(record_history())
        .build(AppState {
            agents: agents(&["planner", "worker_a", "worker_b"]),
            scratch: BTreeMap::new(),
        })
        .expect("build")
}

fn record_deltas(store: &mut Store<AppState>) -> Arc<Mutex<Vec<Delta>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store.subscribe(move |delta: &Delta| {
        sink.lock().expect("lock").push(delta.clone());
    });
    seen
}

/// Full handoff lifecycle: the planner fans work out to two workers,
/// each worker resolves its task, and the aggregate outcome is written
/// back into the planner's history.
///
/// Sequence:
/// 1. Create a fanout over `worker_a` / `worker_b`; hand out resolvers.
/// 2. `worker_a` succeeds → no completion yet.
/// 3. `worker_b` fails → `on_complete` fires once with 1/1 accounting,
///    the registration is purged.
/// 4. The runtime records the aggregate into planner history and wakes
///    the planner via `update_should_act`.
#[test]
fn fanout_handoff_feeds_the_planner() {
    store::logging::init();
    let mut store = app_store();
    let deltas = record_deltas(&mut store);

    let completed: Arc<Mutex<Vec<FanoutResult>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&completed);
    store
        .fanouts()
        .create(
            "handoff_1",
            "planner delegates research",
            ["worker_a", "worker_b"],
            move |result| {
                sink.lock().expect("lock").push(result);
            },
        )
        .expect("create");

    let resolve_a = store
        .fanouts()
        .make_resolver("handoff_1", "worker_a")
        .expect("resolver");
    let resolve_b = store
        .fanouts()
        .make_resolver("handoff_1", "worker_b")
        .expect("resolver");

    resolve_a
        .resolve(TaskResult::success(json!({"summary": "found 3 sources"})))
        .expect("resolve a");
    assert!(completed.lock().expect("lock").is_empty());

    resolve_b
        .resolve(TaskResult::failure(json!("rate limited")))
        .expect("resolve b");

    let result = {
        let completed = completed.lock().expect("lock");
        assert_eq!(completed.len(), 1);
        completed[0].clone()
    };
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 1);
    assert_eq!(result.success_count + result.failure_count, 2);
    assert!(!result.all_succeeded);
    assert_eq!(store.fanouts().active().expect("active"), 0);

    // The runtime reacts to completion by updating the planner.
    store
        .dispatch(
            "record_history",
            RecordHistory {
                agent_name: "planner".to_string(),
                messages: vec![message(
                    "user",
                    &format!(
                        "handoff '{}' finished: {} succeeded, {} failed",
                        result.fanout_id, result.success_count, result.failure_count
                    ),
                )],
            },
        )
        .expect("record");
    store
        .dispatch(
            "update_should_act",
            store::agent::UpdateShouldAct {
                agent_name: "planner".to_string(),
                should_act: true,
            },
        )
        .expect("wake planner");

    assert!(store.state().agents()["planner"].should_act);
    assert_eq!(store.state().agents()["planner"].history.len(), 1);

    let deltas = deltas.lock().expect("lock");
    assert_eq!(deltas.len(), 2);
    assert!(deltas.iter().all(|delta| delta.affects("agents.planner")));
    assert!(deltas.iter().all(|delta| !delta.affects("agents.worker_a")));
}

/// Verifies a second resolution attempt fails loudly without re-firing
/// the completed callback.
#[test]
fn double_resolution_never_refires_completion() {
    let store = app_store();
    let fired = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&fired);
    store
        .fanouts()
        .create("batch", "exactly once", ["only"], move |_| {
            *counter.lock().expect("lock") += 1;
        })
        .expect("create");

    let resolver = store
        .fanouts()
        .make_resolver("batch", "only")
        .expect("resolver");
    resolver
        .resolve(TaskResult::success(Value::Null))
        .expect("resolve");
    let err = resolver
        .resolve(TaskResult::success(Value::Null))
        .expect_err("second resolve");

    assert!(matches!(err, Error::UnknownFanout { .. }));
    assert_eq!(*fired.lock().expect("lock"), 1);
}

/// The store works over an arbitrary JSON tree: scoped dispatch diffs
/// only the declared subtree of a deeply nested document.
#[test]
fn scoped_dispatch_over_a_raw_json_tree() {
    let set_theme = Mutation::new("set_theme", |state: &mut Value, theme: String| {
        state["config"]["ui"]["theme"] = json!(theme);
        state["stats"]["writes"] = json!(99);
        Ok(PathScope::paths(["config.ui"]))
    });

    let mut store = Store::builder()
        .mutation(set_theme)
        .build(json!({
            "config": {"ui": {"theme": "light", "lang": "en"}},
            "stats": {"writes": 0},
        }))
        .expect("build");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    store.subscribe(move |delta: &Delta| {
        sink.lock().expect("lock").push(delta.clone());
    });

    store.dispatch("set_theme", "dark").expect("dispatch");

    assert_eq!(store.state()["config"]["ui"]["theme"], json!("dark"));
    let seen = seen.lock().expect("lock");
    assert_eq!(seen.len(), 1);
    assert!(seen[0].affects("config.ui.theme"));
    assert!(!seen[0].affects("config.ui.lang"));
    // The undeclared write happened but stays invisible to observers.
    assert!(!seen[0].affects("stats.writes"));
    assert_eq!(store.state()["stats"]["writes"], json!(99));
}
