//! Fluent traversal construction.

use crate::config::EngineConfig;
use crate::error::{Result, WeftError};
use crate::traversal::scope::Scope;
use crate::traversal::side_effects::Operator;
use crate::traversal::step::Step;
use crate::traversal::steps::{IdentityStep, InjectStep, LambdaMapStep, SelectOneStep, StoreStep};
use crate::traversal::{Traversal, Value};

/// Fluent builder for root and anonymous (child) traversals.
///
/// The first failure is remembered and returned from [`TraversalBuilder::build`];
/// later calls become no-ops.
#[derive(Default)]
pub struct TraversalBuilder {
    traversal: Traversal,
    error: Option<WeftError>,
}

impl TraversalBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry-point for a root traversal.
    pub fn start() -> Self {
        Self::new()
    }

    /// Entry-point for a traversal meant to be attached as a child with
    /// [`TraversalBuilder::by`].
    pub fn anonymous() -> Self {
        Self::new()
    }

    /// Emits `values` as start traversers.
    pub fn inject<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push(InjectStep::new(values))
    }

    /// Pass-through step, useful as a label anchor.
    pub fn identity(self) -> Self {
        self.push(IdentityStep::new())
    }

    /// Maps each value through `function`.
    pub fn map<F>(self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.push(LambdaMapStep::new(name, function))
    }

    /// Resolves `key` under `scope` and emits the bound value.
    pub fn select_one(self, scope: Scope, key: impl Into<String>) -> Self {
        self.push(SelectOneStep::new(scope, key))
    }

    /// Appends each value to the side-effect list `key`.
    pub fn store(self, key: impl Into<String>) -> Self {
        self.push(StoreStep::new(key))
    }

    /// Attaches `child` as the local child of the previous step.
    pub fn by(mut self, child: TraversalBuilder) -> Self {
        if self.error.is_some() {
            return self;
        }
        let child = match child.build() {
            Ok(child) => child,
            Err(err) => {
                self.error = Some(err);
                return self;
            }
        };
        let attached = self.traversal.last_step_mut().and_then(|step| {
            let name = step.name();
            match step.as_parent_mut() {
                Some(parent) => parent.add_local_child(child),
                None => Err(WeftError::Invalid(format!(
                    "by() requires a step that owns child traversals, found {name}"
                ))),
            }
        });
        if let Err(err) = attached {
            self.error = Some(err);
        }
        self
    }

    /// Labels the previous step's output in the path.
    pub fn as_(mut self, label: impl Into<String>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let label = label.into();
        match self.traversal.last_step_mut() {
            Ok(step) => step.add_label(label),
            Err(_) => {
                self.error = Some(WeftError::Invalid(format!(
                    "as('{label}') requires a preceding step"
                )));
            }
        }
        self
    }

    /// Declares a side-effect seeded into every execution.
    pub fn with_side_effect(
        mut self,
        key: impl Into<String>,
        initial: impl Into<Value>,
        operator: Operator,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Err(err) = self
            .traversal
            .with_side_effect(key, initial.into(), operator)
        {
            self.error = Some(err);
        }
        self
    }

    /// Replaces the execution settings.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Err(err) = self.traversal.set_config(config) {
            self.error = Some(err);
        }
        self
    }

    /// Appends an arbitrary step.
    pub fn step(self, step: Box<dyn Step>) -> Self {
        self.push_boxed(step)
    }

    /// Finishes the traversal, returning the first recorded error if any.
    pub fn build(self) -> Result<Traversal> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.traversal),
        }
    }

    fn push<S: Step + 'static>(self, step: S) -> Self {
        self.push_boxed(Box::new(step))
    }

    fn push_boxed(mut self, step: Box<dyn Step>) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Err(err) = self.traversal.add_step(step) {
            self.error = Some(err);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::requirements::Requirement;

    #[test]
    fn builder_attaches_child_to_previous_step() {
        let traversal = TraversalBuilder::start()
            .inject([5])
            .as_("x")
            .select_one(Scope::Global, "x")
            .by(TraversalBuilder::anonymous().map("double", |v| Ok(v.clone())))
            .build()
            .expect("builder should succeed");
        assert_eq!(traversal.len(), 2);
        assert_eq!(
            traversal.to_string(),
            "[InjectStep([5])@[x], SelectOneStep(global,x,[LambdaMapStep(double)])]"
        );
        let child = traversal.steps()[1]
            .as_parent()
            .expect("parent")
            .local_children()[0];
        assert_eq!(child.parent(), Some(traversal.steps()[1].id()));
    }

    #[test]
    fn by_on_non_parent_is_reported_at_build() {
        let err = TraversalBuilder::start()
            .inject([1])
            .by(TraversalBuilder::anonymous())
            .build()
            .unwrap_err();
        assert_eq!(err.code(), "Invalid");
    }

    #[test]
    fn label_without_step_is_reported() {
        let err = TraversalBuilder::start().as_("x").build().unwrap_err();
        assert!(err.to_string().contains("as('x')"));
    }

    #[test]
    fn side_effect_declaration_adds_requirement() {
        let traversal = TraversalBuilder::start()
            .with_side_effect("total", 0, Operator::Sum)
            .identity()
            .build()
            .expect("builder should succeed");
        assert!(traversal
            .requirements()
            .contains(Requirement::SideEffects));
    }
}
