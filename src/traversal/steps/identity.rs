//! Pass-through step.

use std::collections::BTreeSet;

use smallvec::smallvec;

use crate::error::{Result, StepId};
use crate::traversal::executor::ExecutionContext;
use crate::traversal::step::{Step, StepCore, StepOutput};
use crate::traversal::Traverser;

/// Emits its input unchanged. Default child of parent steps.
#[derive(Clone, Debug, Default)]
pub struct IdentityStep {
    core: StepCore,
}

impl IdentityStep {
    /// Creates the step.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Step for IdentityStep {
    fn id(&self) -> StepId {
        self.core.id
    }

    fn set_id(&mut self, id: StepId) {
        self.core.id = id;
    }

    fn name(&self) -> &'static str {
        "IdentityStep"
    }

    fn labels(&self) -> &BTreeSet<String> {
        &self.core.labels
    }

    fn add_label(&mut self, label: String) {
        self.core.labels.insert(label);
    }

    fn process(&self, traverser: Traverser, _ctx: &ExecutionContext) -> Result<StepOutput> {
        Ok(smallvec![traverser])
    }

    fn box_clone(&self) -> Box<dyn Step> {
        Box::new(self.clone())
    }
}
