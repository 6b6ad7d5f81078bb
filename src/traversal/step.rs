//! The unit of pipeline composition.

use std::collections::BTreeSet;

use smallvec::SmallVec;

use crate::error::{Result, StepId};
use crate::traversal::executor::ExecutionContext;
use crate::traversal::explain::ExplainProp;
use crate::traversal::parent::TraversalParent;
use crate::traversal::requirements::Requirements;
use crate::traversal::scope::Scoping;
use crate::traversal::{Traverser, Value};

/// Traversers emitted by one step for one input, in emission order.
pub type StepOutput = SmallVec<[Traverser; 1]>;

/// Label set used by steps that do not label their output.
pub(crate) static NO_LABELS: BTreeSet<String> = BTreeSet::new();

/// Attributes every step carries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepCore {
    pub(crate) id: StepId,
    pub(crate) labels: BTreeSet<String>,
}

/// A step that generates the start values of a traversal.
pub trait SourceStep {
    /// Values emitted, in order, when the traversal executes.
    fn start_values(&self) -> Vec<Value>;
}

/// One stage of a traversal.
///
/// Steps are immutable while executing: `process` takes `&self`, and any
/// per-execution state lives in the [`ExecutionContext`].
pub trait Step: Send + Sync {
    /// Identifier assigned when the step joins a traversal.
    fn id(&self) -> StepId;

    /// Assigns the identifier; called by the owning traversal.
    fn set_id(&mut self, id: StepId);

    /// Name used in explain output, e.g. `SelectOneStep`.
    fn name(&self) -> &'static str;

    /// Labels attached to the path entries of this step's output.
    fn labels(&self) -> &BTreeSet<String>;

    /// Adds a path label.
    fn add_label(&mut self, label: String);

    /// Requirements of this step alone, excluding children.
    fn intrinsic_requirements(&self) -> Requirements {
        Requirements::new()
    }

    /// Effective requirements: intrinsic plus every child traversal's.
    fn requirements(&self) -> Requirements {
        match self.as_parent() {
            Some(parent) => parent.self_and_child_requirements(self.intrinsic_requirements()),
            None => self.intrinsic_requirements(),
        }
    }

    /// Transforms one traverser into zero or more traversers.
    fn process(&self, traverser: Traverser, ctx: &ExecutionContext) -> Result<StepOutput>;

    /// Deep copy, including child traversals.
    fn box_clone(&self) -> Box<dyn Step>;

    /// Configuration rendered in explain output and compared for equality.
    fn props(&self) -> Vec<ExplainProp> {
        Vec::new()
    }

    /// Child-owning capability.
    fn as_parent(&self) -> Option<&dyn TraversalParent> {
        None
    }

    /// Mutable child-owning capability.
    fn as_parent_mut(&mut self) -> Option<&mut dyn TraversalParent> {
        None
    }

    /// Scoped-resolution capability.
    fn as_scoping(&self) -> Option<&dyn Scoping> {
        None
    }

    /// Mutable scoped-resolution capability.
    fn as_scoping_mut(&mut self) -> Option<&mut dyn Scoping> {
        None
    }

    /// Source capability.
    fn as_source(&self) -> Option<&dyn SourceStep> {
        None
    }
}

impl Clone for Box<dyn Step> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

impl std::fmt::Debug for dyn Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(self.name())
            .field("id", &self.id())
            .field("labels", self.labels())
            .field("props", &self.props())
            .finish()
    }
}
