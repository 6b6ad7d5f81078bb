//! Source step that seeds a traversal with literal values.

use std::collections::BTreeSet;

use smallvec::smallvec;

use crate::error::{Result, StepId};
use crate::traversal::executor::ExecutionContext;
use crate::traversal::explain::ExplainProp;
use crate::traversal::step::{SourceStep, Step, StepCore, StepOutput};
use crate::traversal::{Traverser, Value};

/// Source step emitting a fixed list of values.
#[derive(Clone, Debug)]
pub struct InjectStep {
    core: StepCore,
    values: Vec<Value>,
}

impl InjectStep {
    /// Creates a source for `values`, emitted in order.
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            core: StepCore::default(),
            values,
        }
    }
}

impl Step for InjectStep {
    fn id(&self) -> StepId {
        self.core.id
    }

    fn set_id(&mut self, id: StepId) {
        self.core.id = id;
    }

    fn name(&self) -> &'static str {
        "InjectStep"
    }

    fn labels(&self) -> &BTreeSet<String> {
        &self.core.labels
    }

    fn add_label(&mut self, label: String) {
        self.core.labels.insert(label);
    }

    // Start traversers are generated by the executor; anything reaching the
    // step afterwards passes through.
    fn process(&self, traverser: Traverser, _ctx: &ExecutionContext) -> Result<StepOutput> {
        Ok(smallvec![traverser])
    }

    fn box_clone(&self) -> Box<dyn Step> {
        Box::new(self.clone())
    }

    fn props(&self) -> Vec<ExplainProp> {
        vec![ExplainProp::values("values", &self.values)]
    }

    fn as_source(&self) -> Option<&dyn SourceStep> {
        Some(self)
    }
}

impl SourceStep for InjectStep {
    fn start_values(&self) -> Vec<Value> {
        self.values.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::steps::IdentityStep;
    use crate::traversal::Traversal;

    fn inject_then_identity(value: Value) -> Traversal {
        let mut traversal = Traversal::new();
        traversal
            .add_step(Box::new(InjectStep::new(vec![value])))
            .expect("add");
        traversal
            .add_step(Box::new(IdentityStep::new()))
            .expect("add");
        traversal
    }

    #[test]
    fn values_of_different_types_are_distinct_plans() {
        let ints = inject_then_identity(Value::Int(1));
        let floats = inject_then_identity(Value::Float(1.0));
        assert_eq!(ints.to_string(), floats.to_string());
        assert_ne!(ints, floats);
        assert_ne!(ints.plan_hash(), floats.plan_hash());
        assert_eq!(ints, inject_then_identity(Value::Int(1)));
        assert_eq!(
            ints.plan_hash(),
            inject_then_identity(Value::Int(1)).plan_hash()
        );
    }
}
