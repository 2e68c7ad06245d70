//! Snapshotting and structural diffing of serialized state trees.
//!
//! The canonical tree is the `serde_json::Value` form of the state type.
//! A snapshot is taken before a mutation handler runs; the delta between
//! the snapshot and the post-mutation tree, restricted to the handler's
//! declared scope, is what subscribers observe.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::path::{PathScope, related};

/// How a leaf differs between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

/// One differing position, with its full dot-separated path.
///
/// Added and removed subtrees are reported as a single change at the
/// subtree root, carrying the whole subtree as the value.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub path: String,
    pub kind: ChangeKind,
    /// Value before the mutation (`None` for additions).
    pub before: Option<Value>,
    /// Value after the mutation (`None` for removals).
    pub after: Option<Value>,
}

/// The scope-filtered set of changes produced by one dispatch.
///
/// An empty delta means no observable change and suppresses notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    changes: Vec<Change>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().map(|change| change.path.as_str())
    }

    /// Segment-aware change query.
    ///
    /// True if any changed position lies at, under, or above `path`:
    /// `affects("users.alice")` holds when `users.alice.name` changed, and
    /// `affects("users.alice.name")` holds when all of `users.alice` was
    /// replaced. Matching is by whole segments, never by substring.
    pub fn affects(&self, path: &str) -> bool {
        self.changes.iter().any(|change| related(&change.path, path))
    }
}

/// Serialize the state into the canonical tree used for diffing.
pub(crate) fn snapshot<S: Serialize>(state: &S) -> Result<Value, serde_json::Error> {
    serde_json::to_value(state)
}

/// Compute the scope-filtered structural delta between two snapshots.
///
/// Declared paths that exist in neither tree are tolerated: they simply
/// contribute nothing to the delta (traced at debug level).
pub(crate) fn diff_trees(before: &Value, after: &Value, scope: &PathScope) -> Delta {
    if let PathScope::Paths(declared) = scope {
        for path in declared {
            if !contains_path(before, path) && !contains_path(after, path) {
                debug!(path = %path, "scope path not present in state tree");
            }
        }
    }
    let mut changes = Vec::new();
    walk(before, after, &mut Vec::new(), scope, &mut changes);
    Delta { changes }
}

fn walk(
    before: &Value,
    after: &Value,
    path: &mut Vec<String>,
    scope: &PathScope,
    out: &mut Vec<Change>,
) {
    if !path.is_empty() && !scope.admits(&path.join(".")) {
        return;
    }
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => {
            let keys: BTreeSet<&str> = b.keys().chain(a.keys()).map(String::as_str).collect();
            for key in keys {
                path.push(key.to_string());
                match (b.get(key), a.get(key)) {
                    (Some(bv), Some(av)) => walk(bv, av, path, scope, out),
                    (Some(bv), None) => record(ChangeKind::Removed, Some(bv), None, path, scope, out),
                    (None, Some(av)) => record(ChangeKind::Added, None, Some(av), path, scope, out),
                    (None, None) => {}
                }
                path.pop();
            }
        }
        (Value::Array(b), Value::Array(a)) => {
            for index in 0..b.len().max(a.len()) {
                path.push(index.to_string());
                match (b.get(index), a.get(index)) {
                    (Some(bv), Some(av)) => walk(bv, av, path, scope, out),
                    (Some(bv), None) => record(ChangeKind::Removed, Some(bv), None, path, scope, out),
                    (None, Some(av)) => record(ChangeKind::Added, None, Some(av), path, scope, out),
                    (None, None) => {}
                }
                path.pop();
            }
        }
        _ => {
            if before != after {
                record(ChangeKind::Changed, Some(before), Some(after), path, scope, out);
            }
        }
    }
}

fn record(
    kind: ChangeKind,
    before: Option<&Value>,
    after: Option<&Value>,
    path: &[String],
    scope: &PathScope,
    out: &mut Vec<Change>,
) {
    let here = path.join(".");
    if !scope.admits(&here) {
        return;
    }
    out.push(Change {
        path: here,
        kind,
        before: before.cloned(),
        after: after.cloned(),
    });
}

/// Walk `tree` down a dot-separated path, treating numeric segments as
/// sequence indices.
fn contains_path(tree: &Value, path: &str) -> bool {
    let mut current = tree;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn equal_trees_produce_empty_delta() {
        let tree = json!({"count": 1, "items": [1, 2]});
        let delta = diff_trees(&tree, &tree, &PathScope::full());
        assert!(delta.is_empty());
    }

    #[test]
    fn changed_leaf_is_recorded_with_before_and_after() {
        let before = json!({"count": 0});
        let after = json!({"count": 5});
        let delta = diff_trees(&before, &after, &PathScope::full());

        assert_eq!(delta.len(), 1);
        let change = &delta.changes()[0];
        assert_eq!(change.path, "count");
        assert_eq!(change.kind, ChangeKind::Changed);
        assert_eq!(change.before, Some(json!(0)));
        assert_eq!(change.after, Some(json!(5)));
    }

    #[test]
    fn added_and_removed_keys_are_recorded_at_the_subtree_root() {
        let before = json!({"old": {"a": 1}});
        let after = json!({"new": {"b": 2}});
        let delta = diff_trees(&before, &after, &PathScope::full());

        assert_eq!(delta.len(), 2);
        assert!(delta.changes().iter().any(
            |c| c.path == "new" && c.kind == ChangeKind::Added && c.after == Some(json!({"b": 2}))
        ));
        assert!(delta.changes().iter().any(
            |c| c.path == "old" && c.kind == ChangeKind::Removed && c.before == Some(json!({"a": 1}))
        ));
    }

    #[test]
    fn sequence_growth_is_recorded_by_index() {
        let before = json!({"items": ["a"]});
        let after = json!({"items": ["a", "b"]});
        let delta = diff_trees(&before, &after, &PathScope::full());

        assert_eq!(delta.len(), 1);
        assert_eq!(delta.changes()[0].path, "items.1");
        assert_eq!(delta.changes()[0].kind, ChangeKind::Added);
    }

    /// Verifies scope filtering: changes outside every declared path are
    /// excluded even though they exist in the trees.
    #[test]
    fn scoped_diff_excludes_unrelated_changes() {
        let before = json!({"data": {"user": "alice"}, "heavy": {"k": 1}});
        let after = json!({"data": {"user": "bob"}, "heavy": {"k": 2}});
        let scope = PathScope::paths(["data.user"]);
        let delta = diff_trees(&before, &after, &scope);

        assert_eq!(delta.len(), 1);
        assert_eq!(delta.changes()[0].path, "data.user");
        assert!(!delta.affects("heavy"));
    }

    /// Verifies the full-tree marker yields a superset of any narrow scope
    /// for the same underlying change.
    #[test]
    fn full_diff_is_a_superset_of_scoped_diff() {
        let before = json!({"data": {"user": "alice"}, "heavy": {"k": 1}});
        let after = json!({"data": {"user": "bob"}, "heavy": {"k": 2}});

        let scoped = diff_trees(&before, &after, &PathScope::paths(["data.user"]));
        let full = diff_trees(&before, &after, &PathScope::full());

        for path in scoped.paths() {
            assert!(full.affects(path));
        }
        assert!(full.len() > scoped.len());
    }

    #[test]
    fn nested_scope_path_excludes_sibling_leaves() {
        let before = json!({"users": {"alice": {"name": "Alice", "age": 30}}});
        let after = json!({"users": {"alice": {"name": "Alicia", "age": 31}}});
        let delta = diff_trees(&before, &after, &PathScope::paths(["users.alice.name"]));

        assert!(delta.affects("users.alice.name"));
        assert!(!delta.affects("users.alice.age"));
    }

    #[test]
    fn affects_matches_whole_segments_in_both_directions() {
        let before = json!({"users": {"alice": {"name": "Alice"}}});
        let after = json!({"users": {"alice": {"name": "Bob"}}});
        let delta = diff_trees(&before, &after, &PathScope::full());

        assert!(delta.affects("users.alice"));
        assert!(delta.affects("users.alice.name.anything"));
        assert!(!delta.affects("users.ali"));
    }

    #[test]
    fn scope_path_absent_from_both_trees_is_tolerated() {
        let before = json!({"count": 0});
        let after = json!({"count": 1});
        let delta = diff_trees(&before, &after, &PathScope::paths(["missing.path"]));
        assert!(delta.is_empty());
    }
}
