//! Append-only labeled history of the values a traverser has taken.
//!
//! Paths are persistent: every extension allocates one node that points at the
//! previous head, so forked traversers share their common prefix and can never
//! observe each other's extensions.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::traversal::Value;

struct PathNode {
    labels: BTreeSet<String>,
    value: Value,
    prev: Option<Arc<PathNode>>,
}

/// Ordered `(labels, value)` history.
#[derive(Clone, Default)]
pub struct Path {
    head: Option<Arc<PathNode>>,
    len: usize,
}

impl Path {
    /// Creates an empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when no entry has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns a new path with one more entry; `self` is left untouched.
    pub fn extend<I, S>(&self, value: Value, labels: I) -> Path
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Path {
            head: Some(Arc::new(PathNode {
                labels: labels.into_iter().map(Into::into).collect(),
                value,
                prev: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// Returns a path whose most recent entry additionally carries `labels`.
    ///
    /// Only the head node is copied. An empty path is returned unchanged.
    pub fn add_labels<'a, I>(&self, labels: I) -> Path
    where
        I: IntoIterator<Item = &'a String>,
    {
        let Some(head) = &self.head else {
            return self.clone();
        };
        let mut merged = head.labels.clone();
        let before = merged.len();
        merged.extend(labels.into_iter().cloned());
        if merged.len() == before {
            return self.clone();
        }
        Path {
            head: Some(Arc::new(PathNode {
                labels: merged,
                value: head.value.clone(),
                prev: head.prev.clone(),
            })),
            len: self.len,
        }
    }

    /// Returns `true` if any entry carries `label`.
    pub fn has_label(&self, label: &str) -> bool {
        self.nodes_newest_first().any(|node| node.labels.contains(label))
    }

    /// Value of the most recently appended entry labeled `label`.
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.nodes_newest_first()
            .find(|node| node.labels.contains(label))
            .map(|node| &node.value)
    }

    /// Value of the oldest entry labeled `label`.
    pub fn first(&self, label: &str) -> Option<&Value> {
        self.get_all(label).into_iter().next()
    }

    /// Every value labeled `label`, oldest first.
    pub fn get_all(&self, label: &str) -> Vec<&Value> {
        let mut values: Vec<&Value> = self
            .nodes_newest_first()
            .filter(|node| node.labels.contains(label))
            .map(|node| &node.value)
            .collect();
        values.reverse();
        values
    }

    /// Most recent value, if any.
    pub fn head(&self) -> Option<&Value> {
        self.head.as_deref().map(|node| &node.value)
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (&BTreeSet<String>, &Value)> {
        let mut nodes: Vec<&PathNode> = self.nodes_newest_first().collect();
        nodes.reverse();
        nodes.into_iter().map(|node| (&node.labels, &node.value))
    }

    /// Union of every label on the path.
    pub fn labels(&self) -> BTreeSet<String> {
        self.nodes_newest_first()
            .flat_map(|node| node.labels.iter().cloned())
            .collect()
    }

    /// Rebuilds the path keeping only labeled entries.
    pub fn retain_labeled(&self) -> Path {
        self.iter()
            .filter(|(labels, _)| !labels.is_empty())
            .fold(Path::new(), |path, (labels, value)| {
                path.extend(value.clone(), labels.iter().cloned())
            })
    }

    fn nodes_newest_first(&self) -> impl Iterator<Item = &PathNode> {
        std::iter::successors(self.head.as_deref(), |node| node.prev.as_deref())
    }
}

impl Drop for Path {
    fn drop(&mut self) {
        // Unlink uniquely owned nodes one at a time so long paths do not
        // recurse through nested `Arc` drops.
        let mut next = self.head.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.prev.take(),
                Err(_) => break,
            }
        }
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len
            && self
                .nodes_newest_first()
                .zip(other.nodes_newest_first())
                .all(|(a, b)| a.labels == b.labels && a.value == b.value)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|(labels, value)| (labels, value)))
            .finish()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("path[")?;
        for (idx, (_, value)) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled(label: &str, value: i64) -> Path {
        Path::new().extend(Value::Int(value), [label])
    }

    #[test]
    fn get_returns_most_recent_match() {
        let path = labeled("x", 1)
            .extend(Value::Int(2), Vec::<String>::new())
            .extend(Value::Int(3), ["x"]);
        assert_eq!(path.get("x"), Some(&Value::Int(3)));
        assert_eq!(path.first("x"), Some(&Value::Int(1)));
        assert_eq!(path.get_all("x"), vec![&Value::Int(1), &Value::Int(3)]);
        assert_eq!(path.get("y"), None);
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn forks_do_not_see_sibling_extensions() {
        let base = labeled("a", 1);
        let left = base.extend(Value::Int(2), ["b"]);
        let right = base.extend(Value::Int(3), ["c"]);
        assert!(left.has_label("b") && !left.has_label("c"));
        assert!(right.has_label("c") && !right.has_label("b"));
        assert_eq!(base.len(), 1);
    }

    #[test]
    fn add_labels_copies_only_the_head() {
        let base = labeled("a", 1);
        let relabeled = base.add_labels(&["z".to_owned()]);
        assert!(relabeled.has_label("z"));
        assert!(!base.has_label("z"));
        assert_eq!(relabeled.len(), 1);
        assert!(Path::new().add_labels(&["z".to_owned()]).is_empty());
    }

    #[test]
    fn retain_labeled_drops_anonymous_entries() {
        let path = Path::new()
            .extend(Value::Int(1), Vec::<String>::new())
            .extend(Value::Int(2), ["k"]);
        let reduced = path.retain_labeled();
        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced.get("k"), Some(&Value::Int(2)));
    }

    #[test]
    fn long_paths_drop_without_overflow() {
        let mut path = Path::new();
        for i in 0..200_000 {
            path = path.extend(Value::Int(i), Vec::<String>::new());
        }
        assert_eq!(path.len(), 200_000);
        drop(path);
    }
}
