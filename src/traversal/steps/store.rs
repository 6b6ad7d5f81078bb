//! Collects traverser objects into a side-effect list.

use std::collections::BTreeSet;

use smallvec::smallvec;

use crate::error::{Result, StepId, WeftError};
use crate::traversal::executor::ExecutionContext;
use crate::traversal::explain::ExplainProp;
use crate::traversal::requirements::{Requirement, Requirements};
use crate::traversal::side_effects::Operator;
use crate::traversal::step::{Step, StepCore, StepOutput};
use crate::traversal::{Traverser, Value};

/// Appends each traverser's value to a side-effect list, once per unit of
/// bulk, and passes the traverser on.
///
/// Bulks above [`EngineConfig::max_stored_bulk`] are rejected rather than
/// expanded.
///
/// [`EngineConfig::max_stored_bulk`]: crate::config::EngineConfig::max_stored_bulk
#[derive(Clone, Debug)]
pub struct StoreStep {
    core: StepCore,
    key: String,
}

impl StoreStep {
    /// Creates a step writing to `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            core: StepCore::default(),
            key: key.into(),
        }
    }

    /// Side-effect key written by the step.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Step for StoreStep {
    fn id(&self) -> StepId {
        self.core.id
    }

    fn set_id(&mut self, id: StepId) {
        self.core.id = id;
    }

    fn name(&self) -> &'static str {
        "StoreStep"
    }

    fn labels(&self) -> &BTreeSet<String> {
        &self.core.labels
    }

    fn add_label(&mut self, label: String) {
        self.core.labels.insert(label);
    }

    fn intrinsic_requirements(&self) -> Requirements {
        Requirements::from([Requirement::SideEffects, Requirement::Bulk])
    }

    fn process(&self, traverser: Traverser, ctx: &ExecutionContext) -> Result<StepOutput> {
        let bulk = traverser.bulk();
        let limit = ctx.config().max_stored_bulk;
        let copies = usize::try_from(bulk)
            .ok()
            .filter(|_| bulk <= limit)
            .ok_or_else(|| {
                WeftError::Invalid(format!(
                    "bulk {bulk} stored into '{}' exceeds max_stored_bulk {limit}",
                    self.key
                ))
            })?;
        let items = Value::List(vec![traverser.get().clone(); copies]);
        ctx.side_effects()
            .add_or_register(&self.key, items, Operator::AddAll)?;
        Ok(smallvec![traverser])
    }

    fn box_clone(&self) -> Box<dyn Step> {
        Box::new(self.clone())
    }

    fn props(&self) -> Vec<ExplainProp> {
        vec![ExplainProp::plain("key", self.key.clone())]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::EngineConfig;
    use crate::traversal::requirements::{PathTracking, TraverserShape};
    use crate::traversal::step::NO_LABELS;
    use crate::traversal::SideEffects;

    const BULK: TraverserShape = TraverserShape {
        path: PathTracking::None,
        bulk: true,
    };

    fn ctx(config: EngineConfig) -> ExecutionContext {
        ExecutionContext::new(Arc::new(SideEffects::new()), BULK, Arc::new(config), None)
    }

    fn traverser(ctx: &ExecutionContext, value: Value, bulk: u64) -> Traverser {
        let mut traverser =
            Traverser::start(value, &NO_LABELS, Arc::clone(ctx.side_effects()), BULK);
        traverser.set_bulk(bulk);
        traverser
    }

    #[test]
    fn bulk_expands_into_repeated_entries() {
        let ctx = ctx(EngineConfig::default());
        let step = StoreStep::new("seen");
        step.process(traverser(&ctx, Value::Int(4), 2), &ctx)
            .expect("store");
        step.process(traverser(&ctx, Value::Int(5), 1), &ctx)
            .expect("store");
        assert_eq!(
            ctx.side_effects().get("seen"),
            Some(Value::List(vec![Value::Int(4), Value::Int(4), Value::Int(5)]))
        );
    }

    #[test]
    fn oversized_bulk_is_rejected_without_touching_the_slot() {
        let ctx = ctx(EngineConfig {
            max_stored_bulk: 4,
            ..EngineConfig::default()
        });
        let step = StoreStep::new("seen");
        step.process(traverser(&ctx, Value::Int(1), 4), &ctx)
            .expect("at the limit");
        for bulk in [5, u64::MAX] {
            let err = step
                .process(traverser(&ctx, Value::Int(2), bulk), &ctx)
                .unwrap_err();
            assert_eq!(err.code(), "Invalid");
            assert!(err.to_string().contains("max_stored_bulk 4"), "{err}");
        }
        assert_eq!(
            ctx.side_effects().get("seen"),
            Some(Value::List(vec![Value::Int(1); 4]))
        );
    }
}
