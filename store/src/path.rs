//! Dot-separated scope paths and the containment rules used for diffing.
//!
//! Paths address positions in the serialized state tree: object keys and
//! sequence indices joined with `.` (`agents.planner.history.0.content`).
//! Segments must be non-empty and must not themselves contain `.`.
//! Containment is always segment-wise: `data.user` lies inside
//! `data.user.id` but has nothing to do with `data.username`.

use std::collections::BTreeSet;

/// Marker accepted by [`PathScope::paths`] to request a full-tree diff.
pub const FULL_DIFF_MARKER: &str = ".";

/// The set of paths a mutation declares it touched.
///
/// The declared scope is a promise: the dispatch pipeline diffs only
/// inside it, so changes to leaves outside the scope are invisible to
/// subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathScope {
    /// No observable change: the dispatch skips the diff and notification.
    NoOp,
    /// Diff the entire state tree.
    Full,
    /// Diff only the subtrees at these dot-separated paths.
    Paths(BTreeSet<String>),
}

impl PathScope {
    pub fn no_op() -> Self {
        PathScope::NoOp
    }

    pub fn full() -> Self {
        PathScope::Full
    }

    /// Build a scope from dot-separated paths.
    ///
    /// An empty iterator yields [`PathScope::NoOp`]; the
    /// [`FULL_DIFF_MARKER`] anywhere in the input yields
    /// [`PathScope::Full`]. The marker is accepted here so callers that
    /// receive path sets over a stringly boundary (tool payloads) need no
    /// special casing.
    pub fn paths<I, T>(paths: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut set = BTreeSet::new();
        for path in paths {
            let path = path.into();
            if path == FULL_DIFF_MARKER {
                return PathScope::Full;
            }
            set.insert(path);
        }
        if set.is_empty() {
            PathScope::NoOp
        } else {
            PathScope::Paths(set)
        }
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self, PathScope::NoOp)
    }

    pub fn is_full(&self) -> bool {
        matches!(self, PathScope::Full)
    }

    /// True if `path` may hold changes this scope claims.
    ///
    /// A path is admitted when it equals, lies under, or lies above any
    /// declared path. Ancestors are admitted so the diff can traverse down
    /// to a declared subtree; descendants are admitted so leaves inside it
    /// are recorded.
    pub fn admits(&self, path: &str) -> bool {
        match self {
            PathScope::NoOp => false,
            PathScope::Full => true,
            PathScope::Paths(declared) => declared.iter().any(|scope| related(scope, path)),
        }
    }
}

/// True if one path is a segment-wise prefix of the other, or they are
/// equal.
pub(crate) fn related(a: &str, b: &str) -> bool {
    is_segment_prefix(a, b) || is_segment_prefix(b, a)
}

/// Segment-aware prefix test: `data.user` prefixes `data.user.id` but not
/// `data.username`. The empty path is the root and prefixes everything.
fn is_segment_prefix(prefix: &str, path: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    let mut path_segments = path.split('.');
    prefix
        .split('.')
        .all(|expected| path_segments.next() == Some(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_normalizes_empty_input_to_no_op() {
        let scope = PathScope::paths(Vec::<String>::new());
        assert_eq!(scope, PathScope::NoOp);
    }

    #[test]
    fn paths_accepts_full_diff_marker() {
        assert_eq!(PathScope::paths([FULL_DIFF_MARKER]), PathScope::Full);
        assert_eq!(PathScope::paths(["count", "."]), PathScope::Full);
    }

    #[test]
    fn segment_prefix_does_not_match_substrings() {
        assert!(!related("data.user", "data.username"));
        assert!(related("data.user", "data.user.id"));
        assert!(related("data.user.id", "data.user"));
        assert!(related("data.user", "data.user"));
    }

    #[test]
    fn admits_ancestors_and_descendants_of_declared_paths() {
        let scope = PathScope::paths(["users.alice.name"]);
        assert!(scope.admits("users"));
        assert!(scope.admits("users.alice.name"));
        assert!(scope.admits("users.alice.name.first"));
        assert!(!scope.admits("users.bob"));
        assert!(!scope.admits("settings"));
    }

    #[test]
    fn admits_root_path() {
        let scope = PathScope::paths(["count"]);
        assert!(scope.admits(""));
    }

    #[test]
    fn no_op_admits_nothing_and_full_admits_everything() {
        assert!(!PathScope::no_op().admits("count"));
        assert!(PathScope::full().admits("count"));
    }
}
