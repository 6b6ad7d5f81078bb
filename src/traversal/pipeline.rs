//! Assembled pipeline of steps.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{Result, StepId, WeftError};
use crate::traversal::explain::{
    build_explain_nodes, hash_explain_nodes, StepListDisplay, TraversalExplain,
};
use crate::traversal::profile::{profile_timer, record_profile_timer, TraversalProfileKind};
use crate::traversal::requirements::{Requirement, Requirements, TraverserShape};
use crate::traversal::scope::Scope;
use crate::traversal::side_effects::{Operator, SideEffectDecl};
use crate::traversal::step::Step;
use crate::traversal::steps::IdentityStep;
use crate::traversal::Value;

/// Lifecycle of a traversal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraversalState {
    /// Steps may still be added or reconfigured.
    Assembling,
    /// Requirements are final; the traversal may execute.
    Locked,
}

/// Linear pipeline of steps, each of which may own nested traversals.
///
/// The steps form an arena addressed by position; [`StepId`]s are assigned in
/// insertion order. Cloning rebuilds the arena step by step, so a clone shares
/// no mutable state with the original.
pub struct Traversal {
    steps: Vec<Box<dyn Step>>,
    side_effect_decls: Vec<SideEffectDecl>,
    config: Arc<EngineConfig>,
    parent: Option<StepId>,
    state: TraversalState,
    requirements: OnceLock<Requirements>,
    next_id: u32,
}

impl Default for Traversal {
    fn default() -> Self {
        Self::new()
    }
}

impl Traversal {
    /// Creates an empty root traversal.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            side_effect_decls: Vec::new(),
            config: Arc::new(EngineConfig::default()),
            parent: None,
            state: TraversalState::Assembling,
            requirements: OnceLock::new(),
            next_id: 0,
        }
    }

    /// Creates a traversal that passes its input through unchanged.
    pub fn identity() -> Self {
        let mut traversal = Self::new();
        traversal.steps.push(Box::new(IdentityStep::new()));
        traversal.next_id = 1;
        traversal
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if no steps were added.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps in pipeline order.
    pub fn steps(&self) -> &[Box<dyn Step>] {
        &self.steps
    }

    /// Looks up a step by identifier.
    pub fn step(&self, id: StepId) -> Option<&dyn Step> {
        self.steps
            .iter()
            .find(|step| step.id() == id)
            .map(|step| step.as_ref())
    }

    /// Mutable access to the step at `index`.
    ///
    /// Fails once the traversal is locked. Any access invalidates the cached
    /// requirements.
    pub fn step_mut(&mut self, index: usize) -> Result<&mut dyn Step> {
        self.ensure_assembling()?;
        self.requirements = OnceLock::new();
        let len = self.steps.len();
        match self.steps.get_mut(index) {
            Some(step) => Ok(step.as_mut()),
            None => Err(WeftError::Invalid(format!(
                "step index {index} out of range for {len} steps"
            ))),
        }
    }

    /// Mutable access to the last step.
    pub fn last_step_mut(&mut self) -> Result<&mut dyn Step> {
        let Some(index) = self.steps.len().checked_sub(1) else {
            return Err(WeftError::Invalid("traversal has no steps".into()));
        };
        self.step_mut(index)
    }

    /// Appends a step and returns its identifier.
    ///
    /// Source steps are only accepted at the head of the traversal.
    pub fn add_step(&mut self, mut step: Box<dyn Step>) -> Result<StepId> {
        self.ensure_assembling()?;
        if step.as_source().is_some() && !self.steps.is_empty() {
            return Err(WeftError::Invalid(format!(
                "{} must be the first step",
                step.name()
            )));
        }
        let id = StepId(self.next_id);
        self.next_id += 1;
        step.set_id(id);
        if let Some(parent) = step.as_parent_mut() {
            for child in parent.children_mut() {
                child.attach_to(id);
            }
        }
        self.steps.push(step);
        self.requirements = OnceLock::new();
        Ok(id)
    }

    /// Sets the scope of the step at `index`.
    pub fn set_scope(&mut self, index: usize, scope: Scope) -> Result<()> {
        let step = self.step_mut(index)?;
        let name = step.name();
        match step.as_scoping_mut() {
            Some(scoping) => {
                scoping.set_scope(scope);
                Ok(())
            }
            None => Err(WeftError::Invalid(format!("{name} is not scoped"))),
        }
    }

    /// Declares a side-effect seeded into every execution.
    pub fn with_side_effect(
        &mut self,
        key: impl Into<String>,
        initial: Value,
        operator: Operator,
    ) -> Result<()> {
        self.ensure_assembling()?;
        let key = key.into();
        self.side_effect_decls.retain(|decl| decl.key != key);
        self.side_effect_decls.push(SideEffectDecl {
            key,
            initial,
            operator,
        });
        self.requirements = OnceLock::new();
        Ok(())
    }

    /// Declared side-effects.
    pub fn side_effect_decls(&self) -> &[SideEffectDecl] {
        &self.side_effect_decls
    }

    /// Execution settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn shared_config(&self) -> Arc<EngineConfig> {
        Arc::clone(&self.config)
    }

    /// Replaces the execution settings.
    pub fn set_config(&mut self, config: EngineConfig) -> Result<()> {
        self.ensure_assembling()?;
        self.config = Arc::new(config);
        Ok(())
    }

    /// Step that owns this traversal, if it is a child.
    pub fn parent(&self) -> Option<StepId> {
        self.parent
    }

    /// Returns `true` unless the traversal is owned by a step.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub(crate) fn attach_to(&mut self, parent: StepId) {
        self.parent = Some(parent);
        self.state = TraversalState::Assembling;
        self.requirements = OnceLock::new();
    }

    /// Lifecycle state.
    pub fn state(&self) -> TraversalState {
        self.state
    }

    /// Returns `true` once [`Traversal::lock`] has run.
    pub fn is_locked(&self) -> bool {
        self.state == TraversalState::Locked
    }

    /// Effective requirements, computed bottom-up on first use and cached
    /// until the traversal is next mutated.
    pub fn requirements(&self) -> Requirements {
        self.requirements
            .get_or_init(|| self.compute_requirements())
            .clone()
    }

    /// Traverser bookkeeping implied by [`Traversal::requirements`].
    pub fn shape(&self) -> TraverserShape {
        TraverserShape::for_requirements(&self.requirements())
    }

    /// Finalizes the traversal and its children for execution.
    ///
    /// Verifies that every scoped step declares what its scope reads, then
    /// freezes the configuration. Locking twice is a no-op.
    pub fn lock(&mut self) -> Result<Requirements> {
        if self.is_locked() {
            return Ok(self.requirements());
        }
        self.verify_tree()?;
        self.lock_tree();
        let requirements = self.requirements();
        debug!(
            steps = self.steps.len(),
            root = self.is_root(),
            requirements = %requirements,
            "traversal.lock"
        );
        Ok(requirements)
    }

    /// Checks every scoped step in this traversal and all nested children.
    fn verify_tree(&self) -> Result<()> {
        for step in &self.steps {
            verify_scoped_requirements(step.as_ref())?;
            if let Some(parent) = step.as_parent() {
                for child in parent.children() {
                    child.verify_tree()?;
                }
            }
        }
        Ok(())
    }

    fn lock_tree(&mut self) {
        for step in &mut self.steps {
            if let Some(parent) = step.as_parent_mut() {
                for child in parent.children_mut() {
                    child.lock_tree();
                }
            }
        }
        self.state = TraversalState::Locked;
    }

    /// Binding names resolved by scoped steps, children included.
    pub fn scope_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for step in &self.steps {
            if let Some(scoping) = step.as_scoping() {
                keys.extend(scoping.scope_keys());
            }
            if let Some(parent) = step.as_parent() {
                for child in parent.children() {
                    keys.extend(child.scope_keys());
                }
            }
        }
        keys.sort();
        keys.dedup();
        keys
    }

    /// Explain tree for the traversal.
    pub fn explain(&self) -> TraversalExplain {
        let steps = build_explain_nodes(self);
        let plan_hash = hash_explain_nodes(&steps);
        TraversalExplain {
            steps,
            requirements: self.requirements(),
            side_effects: self
                .side_effect_decls
                .iter()
                .map(|decl| decl.key.clone())
                .collect(),
            plan_hash,
        }
    }

    /// Deterministic structural hash, stable across clones.
    pub fn plan_hash(&self) -> u64 {
        hash_explain_nodes(&build_explain_nodes(self))
    }

    fn ensure_assembling(&self) -> Result<()> {
        match self.state {
            TraversalState::Assembling => Ok(()),
            TraversalState::Locked => Err(WeftError::TraversalLocked),
        }
    }

    fn compute_requirements(&self) -> Requirements {
        let timer = profile_timer();
        let mut requirements = Requirements::new();
        for step in &self.steps {
            requirements.extend_from(&step.requirements());
        }
        if !self.side_effect_decls.is_empty() {
            requirements.insert(Requirement::SideEffects);
        }
        record_profile_timer(TraversalProfileKind::Requirements, timer);
        debug!(
            steps = self.steps.len(),
            requirements = %requirements,
            "traversal.requirements.computed"
        );
        requirements
    }
}

/// Requirements a step resolving bindings under `scope` must declare.
pub fn scope_requirements(scope: Scope) -> Requirements {
    match scope {
        Scope::Local => Requirements::of(Requirement::Object),
        Scope::Global => Requirements::from([Requirement::Path, Requirement::SideEffects]),
    }
}

fn verify_scoped_requirements(step: &dyn Step) -> Result<()> {
    let Some(scoping) = step.as_scoping() else {
        return Ok(());
    };
    let declared = step.requirements();
    let satisfied = match scoping.scope() {
        Scope::Local => declared.contains(Requirement::Object),
        Scope::Global => {
            declared.contains(Requirement::SideEffects)
                && (declared.contains(Requirement::Path)
                    || declared.contains(Requirement::LabeledPath))
        }
    };
    if satisfied {
        return Ok(());
    }
    Err(WeftError::Invalid(format!(
        "{} ({} scope) declares {declared}, which does not cover {}",
        step.name(),
        scoping.scope(),
        scope_requirements(scoping.scope())
    )))
}

impl Clone for Traversal {
    fn clone(&self) -> Self {
        let requirements = OnceLock::new();
        if let Some(cached) = self.requirements.get() {
            let _ = requirements.set(cached.clone());
        }
        Self {
            steps: self.steps.iter().map(|step| step.box_clone()).collect(),
            side_effect_decls: self.side_effect_decls.clone(),
            config: Arc::new(EngineConfig::clone(&self.config)),
            parent: self.parent,
            state: self.state,
            requirements,
            next_id: self.next_id,
        }
    }
}

impl PartialEq for Traversal {
    fn eq(&self, other: &Self) -> bool {
        self.side_effect_decls == other.side_effect_decls
            && build_explain_nodes(self) == build_explain_nodes(other)
    }
}

impl Hash for Traversal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.plan_hash());
    }
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", StepListDisplay(&build_explain_nodes(self)))
    }
}

impl fmt::Debug for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traversal")
            .field("steps", &self.steps)
            .field("side_effects", &self.side_effect_decls)
            .field("parent", &self.parent)
            .field("state", &self.state)
            .finish()
    }
}
