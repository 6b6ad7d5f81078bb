//! Pull-based execution of traversals.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smallvec::smallvec;
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::error::{observed, Result, StepId, WeftError};
use crate::traversal::profile::{profile_timer, record_profile_timer, TraversalProfileKind};
use crate::traversal::requirements::TraverserShape;
use crate::traversal::step::{StepOutput, NO_LABELS};
use crate::traversal::{SideEffects, Traversal, Traverser, Value};

/// Per-execution state handed to every step.
///
/// Each execution owns a fresh side-effect table; nested child traversals
/// share it with their parent.
#[derive(Clone)]
pub struct ExecutionContext {
    side_effects: Arc<SideEffects>,
    shape: TraverserShape,
    config: Arc<EngineConfig>,
    depth: usize,
    cancel: Option<Arc<AtomicBool>>,
}

impl ExecutionContext {
    /// Creates a root context.
    pub fn new(
        side_effects: Arc<SideEffects>,
        shape: TraverserShape,
        config: Arc<EngineConfig>,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            side_effects,
            shape,
            config,
            depth: 0,
            cancel,
        }
    }

    /// Side-effect table of the execution.
    pub fn side_effects(&self) -> &Arc<SideEffects> {
        &self.side_effects
    }

    /// Traverser shape chosen for the execution.
    pub fn shape(&self) -> TraverserShape {
        self.shape
    }

    /// Execution settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Child traversal nesting level; zero for the root.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn nested(&self) -> Result<ExecutionContext> {
        let depth = self.depth + 1;
        if depth > self.config.max_nesting_depth {
            return Err(WeftError::NestingTooDeep {
                max: self.config.max_nesting_depth,
            });
        }
        Ok(ExecutionContext {
            depth,
            ..self.clone()
        })
    }

    fn check_cancel(&self) -> Result<()> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::SeqCst) {
                return Err(WeftError::Cancelled);
            }
        }
        Ok(())
    }
}

/// Lazy stream of result traversers for one execution.
///
/// Input traversers are pulled one at a time and pushed through every step
/// before the next one is read, so results appear in input order. An error
/// aborts only the traverser that raised it; iteration continues with the next
/// input and the caller decides whether to stop.
pub struct Execution<'t> {
    traversal: &'t Traversal,
    starts: Box<dyn Iterator<Item = (Value, u64)> + 't>,
    start_labels: BTreeSet<String>,
    first_step: usize,
    pending: VecDeque<Traverser>,
    ctx: ExecutionContext,
    finished: bool,
}

impl<'t> Execution<'t> {
    /// Side-effect table of this execution.
    pub fn side_effects(&self) -> &Arc<SideEffects> {
        self.ctx.side_effects()
    }

    /// Traverser shape chosen for this execution.
    pub fn shape(&self) -> TraverserShape {
        self.ctx.shape()
    }

    /// Adapts the stream to traverser values.
    pub fn values(self) -> impl Iterator<Item = Result<Value>> + 't {
        self.map(|result| result.map(Traverser::into_value))
    }

    /// Drains the stream, stopping at the first error.
    pub fn collect_values(self) -> Result<Vec<Value>> {
        self.values().collect()
    }
}

impl Iterator for Execution<'_> {
    type Item = Result<Traverser>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(traverser) = self.pending.pop_front() {
                return Some(Ok(traverser));
            }
            if self.finished {
                return None;
            }
            if let Err(err) = self.ctx.check_cancel() {
                debug!("execution.cancelled");
                self.finished = true;
                return Some(Err(err));
            }
            let Some((value, bulk)) = self.starts.next() else {
                self.finished = true;
                debug!("execution.exhausted");
                return None;
            };
            let mut start = Traverser::start(
                value,
                &self.start_labels,
                Arc::clone(&self.ctx.side_effects),
                self.ctx.shape,
            );
            start.set_bulk(bulk);
            if self.ctx.config.profile {
                trace!(traverser = %start, "execution.start_traverser");
            }
            match self.traversal.run_from(self.first_step, start, &self.ctx) {
                Ok(out) => self.pending.extend(out),
                Err(err) => {
                    debug!(error = %err, "execution.traverser_failed");
                    return Some(Err(err));
                }
            }
        }
    }
}

impl Traversal {
    /// Locks the traversal and executes it from its source step.
    ///
    /// A traversal without a source step yields nothing; use
    /// [`Traversal::execute_with`] to feed backend elements instead.
    pub fn execute(&mut self) -> Result<Execution<'_>> {
        self.execute_with_cancel(None)
    }

    /// Like [`Traversal::execute`], aborting with [`WeftError::Cancelled`]
    /// once `cancel` is set.
    pub fn execute_with_cancel(
        &mut self,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Result<Execution<'_>> {
        self.prepare()?;
        let traversal: &Traversal = self;
        let (starts, start_labels, first_step) = match traversal.steps().first() {
            Some(step) => match step.as_source() {
                Some(source) => (source.start_values(), step.labels().clone(), 1),
                None => (Vec::new(), BTreeSet::new(), 0),
            },
            None => (Vec::new(), BTreeSet::new(), 0),
        };
        let starts = starts.into_iter().map(|value| (value, 1_u64));
        Ok(traversal.begin(Box::new(starts), start_labels, first_step, cancel))
    }

    /// Locks the traversal and executes it over externally supplied values.
    pub fn execute_with<'t, I>(&'t mut self, inputs: I) -> Result<Execution<'t>>
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: 't,
    {
        self.execute_with_bulk(inputs.into_iter().map(|value| (value, 1_u64)))
    }

    /// Like [`Traversal::execute_with`] for inputs that each stand for `bulk`
    /// identical elements. Bulk is ignored unless the traversal requires it.
    pub fn execute_with_bulk<'t, I>(&'t mut self, inputs: I) -> Result<Execution<'t>>
    where
        I: IntoIterator<Item = (Value, u64)>,
        I::IntoIter: 't,
    {
        self.prepare()?;
        let traversal: &Traversal = self;
        if let Some(step) = traversal.steps().first() {
            if step.as_source().is_some() {
                return Err(WeftError::Invalid(format!(
                    "traversal already starts with {}",
                    step.name()
                )));
            }
        }
        Ok(traversal.begin(Box::new(inputs.into_iter()), BTreeSet::new(), 0, None))
    }

    /// Runs this traversal as a child for one value and returns its first
    /// result.
    ///
    /// The child receives a fresh traverser for `value` that shares the
    /// parent's side-effect table. Errors raised inside the child are returned
    /// unchanged.
    pub fn apply(&self, value: Value, ctx: &ExecutionContext, step: StepId) -> Result<Value> {
        let timer = profile_timer();
        let nested = ctx.nested()?;
        let start = Traverser::start(
            value.clone(),
            &NO_LABELS,
            Arc::clone(&nested.side_effects),
            nested.shape,
        );
        let out = self.run_from(0, start, &nested)?;
        record_profile_timer(TraversalProfileKind::ChildApply, timer);
        out.into_iter()
            .next()
            .map(Traverser::into_value)
            .ok_or_else(|| WeftError::EmptyChildResult {
                step,
                observed: observed(&value, nested.config.observed_state_limit),
            })
    }

    fn prepare(&mut self) -> Result<()> {
        if !self.is_root() {
            return Err(WeftError::ChildTraversal);
        }
        self.lock()?;
        Ok(())
    }

    fn begin<'t>(
        &'t self,
        starts: Box<dyn Iterator<Item = (Value, u64)> + 't>,
        start_labels: BTreeSet<String>,
        first_step: usize,
        cancel: Option<Arc<AtomicBool>>,
    ) -> Execution<'t> {
        let side_effects = Arc::new(SideEffects::from_declarations(self.side_effect_decls()));
        let shape = self.shape();
        debug!(
            steps = self.len(),
            path = ?shape.path,
            bulk = shape.bulk,
            "execution.start"
        );
        Execution {
            traversal: self,
            starts,
            start_labels,
            first_step,
            pending: VecDeque::new(),
            ctx: ExecutionContext::new(side_effects, shape, self.shared_config(), cancel),
            finished: false,
        }
    }

    /// Pushes one traverser through `steps[from..]`.
    pub(crate) fn run_from(
        &self,
        from: usize,
        traverser: Traverser,
        ctx: &ExecutionContext,
    ) -> Result<StepOutput> {
        let mut current: StepOutput = smallvec![traverser];
        for step in self.steps().iter().skip(from) {
            let mut next = StepOutput::new();
            for traverser in current {
                let timer = profile_timer();
                let out = step.process(traverser, ctx)?;
                record_profile_timer(TraversalProfileKind::StepProcess, timer);
                for mut emitted in out {
                    emitted.add_labels(step.labels());
                    next.push(emitted);
                }
            }
            if next.is_empty() {
                return Ok(next);
            }
            current = next;
        }
        Ok(current)
    }
}
