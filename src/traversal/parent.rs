//! Capability of steps that own child traversals.

use tracing::trace;

use crate::error::{Result, WeftError};
use crate::traversal::requirements::Requirements;
use crate::traversal::step::Step;
use crate::traversal::Traversal;

/// A step that embeds nested traversals.
///
/// Local children run per traverser against the traverser's value; global
/// children run against the traverser itself. Children are owned outright:
/// cloning the parent deep-clones them.
pub trait TraversalParent: Step {
    /// Children applied to the current value, in order.
    fn local_children(&self) -> Vec<&Traversal> {
        Vec::new()
    }

    /// Children applied to the whole traverser, in order.
    fn global_children(&self) -> Vec<&Traversal> {
        Vec::new()
    }

    /// Attaches a local child.
    fn add_local_child(&mut self, _child: Traversal) -> Result<()> {
        Err(WeftError::Invalid(format!(
            "{} does not accept local children",
            self.name()
        )))
    }

    /// Attaches a global child.
    fn add_global_child(&mut self, _child: Traversal) -> Result<()> {
        Err(WeftError::Invalid(format!(
            "{} does not accept global children",
            self.name()
        )))
    }

    /// Mutable access to every child, global children first.
    fn children_mut(&mut self) -> Vec<&mut Traversal>;

    /// Every child, global children first.
    fn children(&self) -> Vec<&Traversal> {
        let mut children = self.global_children();
        children.extend(self.local_children());
        children
    }

    /// Marks `child` as owned by this step.
    ///
    /// The child is reset to the assembling state so its requirements are
    /// recomputed under the parent's lifecycle.
    fn integrate_child(&self, mut child: Traversal) -> Traversal {
        trace!(parent = %self.id(), steps = child.len(), "traversal.integrate_child");
        child.attach_to(self.id());
        child
    }

    /// `own` unioned with the effective requirements of every child.
    fn self_and_child_requirements(&self, own: Requirements) -> Requirements {
        self.children()
            .into_iter()
            .fold(own, |acc, child| acc.union(&child.requirements()))
    }
}
