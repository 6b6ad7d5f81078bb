//! Single-binding selection under a local or global scope.

use std::collections::BTreeSet;

use smallvec::smallvec;

use crate::error::{Result, StepId};
use crate::traversal::executor::ExecutionContext;
use crate::traversal::explain::ExplainProp;
use crate::traversal::parent::TraversalParent;
use crate::traversal::pipeline::scope_requirements;
use crate::traversal::requirements::Requirements;
use crate::traversal::scope::{Scope, Scoping};
use crate::traversal::step::{Step, StepCore, StepOutput, NO_LABELS};
use crate::traversal::{Traversal, Traverser};

/// Resolves one binding and maps the traverser to it, optionally passing the
/// resolved value through a local child traversal first.
///
/// Exactly one output is emitted per input.
#[derive(Clone, Debug)]
pub struct SelectOneStep {
    core: StepCore,
    scope: Scope,
    select_key: String,
    select_traversal: Traversal,
}

impl SelectOneStep {
    /// Creates the step with an identity child.
    pub fn new(scope: Scope, select_key: impl Into<String>) -> Self {
        let mut step = Self {
            core: StepCore::default(),
            scope,
            select_key: select_key.into(),
            select_traversal: Traversal::new(),
        };
        step.select_traversal = step.integrate_child(Traversal::identity());
        step
    }

    /// Binding name resolved by the step.
    pub fn select_key(&self) -> &str {
        &self.select_key
    }

    /// Child applied to the resolved value.
    pub fn select_traversal(&self) -> &Traversal {
        &self.select_traversal
    }
}

impl Step for SelectOneStep {
    fn id(&self) -> StepId {
        self.core.id
    }

    fn set_id(&mut self, id: StepId) {
        self.core.id = id;
    }

    fn name(&self) -> &'static str {
        "SelectOneStep"
    }

    fn labels(&self) -> &BTreeSet<String> {
        &self.core.labels
    }

    fn add_label(&mut self, label: String) {
        self.core.labels.insert(label);
    }

    fn intrinsic_requirements(&self) -> Requirements {
        scope_requirements(self.scope)
    }

    fn process(&self, traverser: Traverser, ctx: &ExecutionContext) -> Result<StepOutput> {
        let limit = ctx.config().observed_state_limit;
        let value = self.resolve_binding_with_limit(&self.select_key, &traverser, limit)?;
        let mapped = self.select_traversal.apply(value, ctx, self.core.id)?;
        Ok(smallvec![traverser.split(mapped, &NO_LABELS)])
    }

    fn box_clone(&self) -> Box<dyn Step> {
        Box::new(self.clone())
    }

    fn props(&self) -> Vec<ExplainProp> {
        vec![
            ExplainProp::plain("scope", self.scope.as_str()),
            ExplainProp::plain("key", self.select_key.clone()),
        ]
    }

    fn as_parent(&self) -> Option<&dyn TraversalParent> {
        Some(self)
    }

    fn as_parent_mut(&mut self) -> Option<&mut dyn TraversalParent> {
        Some(self)
    }

    fn as_scoping(&self) -> Option<&dyn Scoping> {
        Some(self)
    }

    fn as_scoping_mut(&mut self) -> Option<&mut dyn Scoping> {
        Some(self)
    }
}

impl TraversalParent for SelectOneStep {
    fn local_children(&self) -> Vec<&Traversal> {
        vec![&self.select_traversal]
    }

    /// Replaces the child; the step only ever holds one.
    fn add_local_child(&mut self, child: Traversal) -> Result<()> {
        self.select_traversal = self.integrate_child(child);
        Ok(())
    }

    fn children_mut(&mut self) -> Vec<&mut Traversal> {
        vec![&mut self.select_traversal]
    }
}

impl Scoping for SelectOneStep {
    fn scope(&self) -> Scope {
        self.scope
    }

    fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    /// A child runs on the freshly resolved value, which is only reachable
    /// through history from then on.
    fn recommend_next_scope(&self) -> Scope {
        Scope::Global
    }

    fn scope_keys(&self) -> Vec<String> {
        vec![self.select_key.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::requirements::Requirement;

    #[test]
    fn requirements_follow_scope() {
        let local = SelectOneStep::new(Scope::Local, "age");
        assert_eq!(local.requirements(), Requirements::of(Requirement::Object));

        let global = SelectOneStep::new(Scope::Global, "x");
        assert_eq!(
            global.requirements(),
            Requirements::from([Requirement::Path, Requirement::SideEffects])
        );
    }

    #[test]
    fn recommends_global_regardless_of_scope() {
        assert_eq!(
            SelectOneStep::new(Scope::Local, "a").recommend_next_scope(),
            Scope::Global
        );
        assert_eq!(
            SelectOneStep::new(Scope::Global, "a").recommend_next_scope(),
            Scope::Global
        );
    }

    #[test]
    fn replacing_child_does_not_accumulate_requirements() {
        let mut step = SelectOneStep::new(Scope::Local, "age");
        let mut child = Traversal::new();
        child
            .add_step(Box::new(SelectOneStep::new(Scope::Global, "x")))
            .expect("add");
        step.add_local_child(child.clone()).expect("first");
        let once = step.requirements();
        step.add_local_child(child).expect("second");
        assert_eq!(step.requirements(), once);
        assert_eq!(step.local_children().len(), 1);
        assert!(once.contains(Requirement::Path));
    }

    #[test]
    fn clone_deep_copies_child() {
        let step = SelectOneStep::new(Scope::Local, "age");
        let mut clone = step.clone();
        let mut child = Traversal::new();
        child
            .add_step(Box::new(SelectOneStep::new(Scope::Global, "x")))
            .expect("add");
        clone.add_local_child(child).expect("replace");
        clone.set_scope(Scope::Global);

        assert_eq!(step.scope(), Scope::Local);
        assert_eq!(step.select_traversal(), &Traversal::identity());
        assert_eq!(clone.select_traversal().len(), 1);
        assert_ne!(step.select_traversal(), clone.select_traversal());
    }
}
