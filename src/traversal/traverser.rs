//! Execution token carried from step to step.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::traversal::requirements::{PathTracking, TraverserShape};
use crate::traversal::{Path, SideEffects, Value};

/// Current value plus the bookkeeping the traversal's requirements asked for.
///
/// Cloning a traverser is cheap: the path shares its prefix and the
/// side-effect table is the execution's shared instance.
#[derive(Clone)]
pub struct Traverser {
    value: Value,
    path: Path,
    // Whether the path head records the current value.
    path_at_value: bool,
    side_effects: Arc<SideEffects>,
    bulk: u64,
    shape: TraverserShape,
}

impl Traverser {
    /// Creates a start traverser for `value`, labeled with the source step's
    /// labels.
    pub fn start(
        value: Value,
        labels: &BTreeSet<String>,
        side_effects: Arc<SideEffects>,
        shape: TraverserShape,
    ) -> Self {
        let mut traverser = Self {
            value,
            path: Path::new(),
            path_at_value: false,
            side_effects,
            bulk: 1,
            shape,
        };
        traverser.record(labels);
        traverser
    }

    /// Current value.
    pub fn get(&self) -> &Value {
        &self.value
    }

    /// Consumes the traverser and returns its value.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Path history; empty when the shape does not track paths.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Side-effect table of the execution this traverser belongs to.
    pub fn side_effects(&self) -> &Arc<SideEffects> {
        &self.side_effects
    }

    /// Shortcut for reading one side-effect.
    pub fn side_effect(&self, key: &str) -> Option<Value> {
        self.side_effects.get(key)
    }

    /// Repetition count represented by this traverser.
    pub fn bulk(&self) -> u64 {
        self.bulk
    }

    /// Sets the bulk. Values below one are clamped, and shapes that do not
    /// honor bulk keep one.
    pub fn set_bulk(&mut self, bulk: u64) {
        self.bulk = if self.shape.bulk { bulk.max(1) } else { 1 };
    }

    /// Bookkeeping shape chosen for the execution.
    pub fn shape(&self) -> TraverserShape {
        self.shape
    }

    /// Produces the traverser for the next step with `value` as its current
    /// value. The receiver is unchanged.
    pub fn split(&self, value: Value, labels: &BTreeSet<String>) -> Traverser {
        let mut next = Traverser {
            value,
            path: self.path.clone(),
            path_at_value: false,
            side_effects: Arc::clone(&self.side_effects),
            bulk: self.bulk,
            shape: self.shape,
        };
        next.record(labels);
        next
    }

    /// Attaches `labels` to the current value's path entry.
    pub fn add_labels(&mut self, labels: &BTreeSet<String>) {
        if labels.is_empty() || self.shape.path == PathTracking::None {
            return;
        }
        if self.path_at_value {
            self.path = self.path.add_labels(labels);
        } else {
            self.record(labels);
        }
    }

    fn record(&mut self, labels: &BTreeSet<String>) {
        let append = match self.shape.path {
            PathTracking::None => false,
            PathTracking::Labeled => !labels.is_empty(),
            PathTracking::Full => true,
        };
        if append {
            self.path = self.path.extend(self.value.clone(), labels.iter().cloned());
            self.path_at_value = true;
        }
    }
}

impl fmt::Display for Traverser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl fmt::Debug for Traverser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traverser")
            .field("value", &self.value)
            .field("path", &self.path)
            .field("bulk", &self.bulk)
            .field("shape", &self.shape)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    fn shape(path: PathTracking) -> TraverserShape {
        TraverserShape { path, bulk: true }
    }

    #[test]
    fn full_tracking_records_every_step() {
        let start = Traverser::start(
            Value::Int(1),
            &labels(&["a"]),
            Arc::new(SideEffects::new()),
            shape(PathTracking::Full),
        );
        let next = start.split(Value::Int(2), &BTreeSet::new());
        assert_eq!(next.path().len(), 2);
        assert_eq!(start.path().len(), 1);
        assert_eq!(next.path().get("a"), Some(&Value::Int(1)));
    }

    #[test]
    fn labeled_tracking_skips_unlabeled_steps() {
        let start = Traverser::start(
            Value::Int(1),
            &BTreeSet::new(),
            Arc::new(SideEffects::new()),
            shape(PathTracking::Labeled),
        );
        assert!(start.path().is_empty());
        let mut next = start.split(Value::Int(2), &BTreeSet::new());
        next.add_labels(&labels(&["b"]));
        assert_eq!(next.path().len(), 1);
        assert_eq!(next.path().get("b"), Some(&Value::Int(2)));
        next.add_labels(&labels(&["c"]));
        assert_eq!(next.path().len(), 1);
    }

    #[test]
    fn untracked_paths_stay_empty() {
        let start = Traverser::start(
            Value::Int(1),
            &labels(&["a"]),
            Arc::new(SideEffects::new()),
            TraverserShape::default(),
        );
        assert!(start.path().is_empty());
    }

    #[test]
    fn bulk_is_pinned_when_not_honored() {
        let mut t = Traverser::start(
            Value::Null,
            &BTreeSet::new(),
            Arc::new(SideEffects::new()),
            TraverserShape::default(),
        );
        t.set_bulk(5);
        assert_eq!(t.bulk(), 1);

        let mut t = t.split(Value::Null, &BTreeSet::new());
        t.shape.bulk = true;
        t.set_bulk(0);
        assert_eq!(t.bulk(), 1);
        t.set_bulk(3);
        assert_eq!(t.bulk(), 3);
    }
}
