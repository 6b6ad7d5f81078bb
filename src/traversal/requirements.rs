//! Traverser capability requirements declared by steps.
//!
//! A traversal's effective requirement set is decided once, before execution,
//! and determines the [`TraverserShape`] of every traverser it generates.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Capability a step needs the traversers flowing through it to support.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Requirement {
    /// Only the current value is read.
    Object,
    /// Bulk counts must be honored.
    Bulk,
    /// Every traverser is treated as bulk one.
    OneBulk,
    /// The full path history must be tracked.
    Path,
    /// Labeled path entries must be tracked.
    LabeledPath,
    /// The side-effect table must be visible.
    SideEffects,
}

impl Requirement {
    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Requirement::Object => "OBJECT",
            Requirement::Bulk => "BULK",
            Requirement::OneBulk => "ONE_BULK",
            Requirement::Path => "PATH",
            Requirement::LabeledPath => "LABELED_PATH",
            Requirement::SideEffects => "SIDE_EFFECTS",
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, duplicate-free set of [`Requirement`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Requirements(BTreeSet<Requirement>);

impl Requirements {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set containing exactly `requirement`.
    pub fn of(requirement: Requirement) -> Self {
        Self(BTreeSet::from([requirement]))
    }

    /// Adds `requirement`; returns `true` if it was not present.
    pub fn insert(&mut self, requirement: Requirement) -> bool {
        self.0.insert(requirement)
    }

    /// Adds every requirement in `other`.
    pub fn extend_from(&mut self, other: &Requirements) {
        self.0.extend(other.0.iter().copied());
    }

    /// Union of `self` and `other`.
    pub fn union(&self, other: &Requirements) -> Requirements {
        let mut out = self.clone();
        out.extend_from(other);
        out
    }

    /// Returns `true` if `requirement` is present.
    pub fn contains(&self, requirement: Requirement) -> bool {
        self.0.contains(&requirement)
    }

    /// Returns `true` if every requirement of `other` is present.
    pub fn is_superset(&self, other: &Requirements) -> bool {
        self.0.is_superset(&other.0)
    }

    /// Number of requirements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when nothing is required.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Requirements in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Requirement> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Requirement> for Requirements {
    fn from_iter<T: IntoIterator<Item = Requirement>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Requirement; N]> for Requirements {
    fn from(value: [Requirement; N]) -> Self {
        value.into_iter().collect()
    }
}

impl fmt::Display for Requirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, requirement) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{requirement}")?;
        }
        f.write_str("]")
    }
}

/// How much path history a traverser keeps.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum PathTracking {
    /// No history is recorded.
    #[default]
    None,
    /// Only entries that carry at least one label are recorded.
    Labeled,
    /// Every step appends an entry.
    Full,
}

/// Bookkeeping every traverser of one execution carries, derived from the
/// traversal's effective [`Requirements`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TraverserShape {
    /// Path history retained per traverser.
    pub path: PathTracking,
    /// Whether bulk counts above one are preserved.
    pub bulk: bool,
}

impl TraverserShape {
    /// Chooses the cheapest shape satisfying `requirements`.
    pub fn for_requirements(requirements: &Requirements) -> Self {
        let path = if requirements.contains(Requirement::Path) {
            PathTracking::Full
        } else if requirements.contains(Requirement::LabeledPath) {
            PathTracking::Labeled
        } else {
            PathTracking::None
        };
        let bulk = requirements.contains(Requirement::Bulk)
            && !requirements.contains(Requirement::OneBulk);
        Self { path, bulk }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_is_idempotent() {
        let a = Requirements::from([Requirement::Object, Requirement::Path]);
        let b = Requirements::of(Requirement::Path);
        assert_eq!(a.union(&b), a);
        assert_eq!(a.union(&b).union(&b), a);
    }

    #[test]
    fn display_lists_canonical_names() {
        let reqs = Requirements::from([Requirement::SideEffects, Requirement::Object]);
        assert_eq!(reqs.to_string(), "[OBJECT, SIDE_EFFECTS]");
    }

    #[test]
    fn shape_prefers_full_path_over_labeled() {
        let shape = TraverserShape::for_requirements(&Requirements::from([
            Requirement::LabeledPath,
            Requirement::Path,
        ]));
        assert_eq!(shape.path, PathTracking::Full);

        let shape =
            TraverserShape::for_requirements(&Requirements::of(Requirement::LabeledPath));
        assert_eq!(shape.path, PathTracking::Labeled);

        let shape = TraverserShape::for_requirements(&Requirements::of(Requirement::Object));
        assert_eq!(shape, TraverserShape::default());
    }

    #[test]
    fn one_bulk_disables_bulk() {
        let shape = TraverserShape::for_requirements(&Requirements::from([
            Requirement::Bulk,
            Requirement::OneBulk,
        ]));
        assert!(!shape.bulk);
    }
}
