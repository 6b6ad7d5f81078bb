//! Named closure mapping step.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use smallvec::smallvec;

use crate::error::{Result, StepId, WeftError};
use crate::traversal::executor::ExecutionContext;
use crate::traversal::explain::ExplainProp;
use crate::traversal::requirements::{Requirement, Requirements};
use crate::traversal::step::{Step, StepCore, StepOutput, NO_LABELS};
use crate::traversal::{Traverser, Value};

/// User function mapping one value to another.
pub type LambdaFn = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Maps each traverser's value through a named function.
///
/// A function failing with [`WeftError::Invalid`] is reported as
/// [`WeftError::Lambda`] under the step's name; other errors pass through.
/// Lambdas are opaque, so two steps are considered equal when their names
/// match.
#[derive(Clone)]
pub struct LambdaMapStep {
    core: StepCore,
    name: String,
    function: LambdaFn,
}

impl LambdaMapStep {
    /// Wraps `function` under `name`.
    pub fn new<F>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            core: StepCore::default(),
            name: name.into(),
            function: Arc::new(function),
        }
    }

    /// Name the function was registered under.
    pub fn lambda_name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for LambdaMapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaMapStep")
            .field("core", &self.core)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Step for LambdaMapStep {
    fn id(&self) -> StepId {
        self.core.id
    }

    fn set_id(&mut self, id: StepId) {
        self.core.id = id;
    }

    fn name(&self) -> &'static str {
        "LambdaMapStep"
    }

    fn labels(&self) -> &BTreeSet<String> {
        &self.core.labels
    }

    fn add_label(&mut self, label: String) {
        self.core.labels.insert(label);
    }

    fn intrinsic_requirements(&self) -> Requirements {
        Requirements::of(Requirement::Object)
    }

    fn process(&self, traverser: Traverser, _ctx: &ExecutionContext) -> Result<StepOutput> {
        let mapped = (self.function)(traverser.get()).map_err(|err| match err {
            WeftError::Invalid(message) => WeftError::Lambda {
                name: self.name.clone(),
                message,
            },
            other => other,
        })?;
        Ok(smallvec![traverser.split(mapped, &NO_LABELS)])
    }

    fn box_clone(&self) -> Box<dyn Step> {
        Box::new(self.clone())
    }

    fn props(&self) -> Vec<ExplainProp> {
        vec![ExplainProp::plain("fn", self.name.clone())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::traversal::requirements::TraverserShape;
    use crate::traversal::SideEffects;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(
            Arc::new(SideEffects::new()),
            TraverserShape::default(),
            Arc::new(EngineConfig::default()),
            None,
        )
    }

    fn start(value: Value) -> Traverser {
        Traverser::start(
            value,
            &NO_LABELS,
            Arc::new(SideEffects::new()),
            TraverserShape::default(),
        )
    }

    #[test]
    fn invalid_failures_are_named() {
        let step = LambdaMapStep::new("parse", |_| Err(WeftError::Invalid("bad digit".into())));
        let err = step.process(start(Value::from("x1")), &ctx()).unwrap_err();
        assert_eq!(
            err,
            WeftError::Lambda {
                name: "parse".into(),
                message: "bad digit".into(),
            }
        );
    }

    #[test]
    fn other_failures_pass_through() {
        let step = LambdaMapStep::new("cancel", |_| Err(WeftError::Cancelled));
        let err = step.process(start(Value::Null), &ctx()).unwrap_err();
        assert_eq!(err, WeftError::Cancelled);
    }
}
