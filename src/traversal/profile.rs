use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// A snapshot of traversal execution profiling metrics.
///
/// Profiling is enabled via the `WEFT_PROFILE` environment variable and tracks
/// time spent in step processing, binding resolution, child traversal
/// application, and requirement computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraversalProfileSnapshot {
    /// Total nanoseconds spent inside `Step::process`.
    pub step_process_ns: u64,
    /// Number of traversers processed by steps.
    pub step_process_count: u64,
    /// Total nanoseconds spent resolving scoped bindings.
    pub resolve_binding_ns: u64,
    /// Number of scoped binding resolutions.
    pub resolve_binding_count: u64,
    /// Total nanoseconds spent running child traversals.
    pub child_apply_ns: u64,
    /// Number of child traversal applications.
    pub child_apply_count: u64,
    /// Total nanoseconds spent computing requirement sets.
    pub requirements_ns: u64,
    /// Number of requirement computations (cache misses).
    pub requirements_count: u64,
}

#[derive(Default)]
struct TraversalProfileCounters {
    step_process_ns: AtomicU64,
    step_process_count: AtomicU64,
    resolve_binding_ns: AtomicU64,
    resolve_binding_count: AtomicU64,
    child_apply_ns: AtomicU64,
    child_apply_count: AtomicU64,
    requirements_ns: AtomicU64,
    requirements_count: AtomicU64,
}

static PROFILE_ENABLED: OnceLock<bool> = OnceLock::new();
static PROFILE_COUNTERS: OnceLock<TraversalProfileCounters> = OnceLock::new();

fn profiling_enabled() -> bool {
    *PROFILE_ENABLED.get_or_init(|| std::env::var_os("WEFT_PROFILE").is_some())
}

fn counters() -> Option<&'static TraversalProfileCounters> {
    profiling_enabled().then(|| PROFILE_COUNTERS.get_or_init(TraversalProfileCounters::default))
}

pub(crate) fn profile_timer() -> Option<Instant> {
    profiling_enabled().then(Instant::now)
}

pub(crate) enum TraversalProfileKind {
    StepProcess,
    ResolveBinding,
    ChildApply,
    Requirements,
}

pub(crate) fn record_profile_timer(kind: TraversalProfileKind, start: Option<Instant>) {
    let Some(start) = start else {
        return;
    };
    let Some(counters) = counters() else {
        return;
    };
    let nanos = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
    let (ns, count) = match kind {
        TraversalProfileKind::StepProcess => {
            (&counters.step_process_ns, &counters.step_process_count)
        }
        TraversalProfileKind::ResolveBinding => {
            (&counters.resolve_binding_ns, &counters.resolve_binding_count)
        }
        TraversalProfileKind::ChildApply => (&counters.child_apply_ns, &counters.child_apply_count),
        TraversalProfileKind::Requirements => {
            (&counters.requirements_ns, &counters.requirements_count)
        }
    };
    ns.fetch_add(nanos, Ordering::Relaxed);
    count.fetch_add(1, Ordering::Relaxed);
}

/// Retrieves a snapshot of current traversal profiling metrics.
///
/// Returns `None` unless `WEFT_PROFILE` was set when the first timer was
/// taken. With `reset`, counters are zeroed after being read.
///
/// ```no_run
/// use weft::traversal::profile::profile_snapshot;
///
/// if let Some(snapshot) = profile_snapshot(true) {
///     println!("resolutions: {}", snapshot.resolve_binding_count);
/// }
/// ```
pub fn profile_snapshot(reset: bool) -> Option<TraversalProfileSnapshot> {
    let counters = counters()?;
    let load = |counter: &AtomicU64| {
        if reset {
            counter.swap(0, Ordering::Relaxed)
        } else {
            counter.load(Ordering::Relaxed)
        }
    };
    Some(TraversalProfileSnapshot {
        step_process_ns: load(&counters.step_process_ns),
        step_process_count: load(&counters.step_process_count),
        resolve_binding_ns: load(&counters.resolve_binding_ns),
        resolve_binding_count: load(&counters.resolve_binding_count),
        child_apply_ns: load(&counters.child_apply_ns),
        child_apply_count: load(&counters.child_apply_count),
        requirements_ns: load(&counters.requirements_ns),
        requirements_count: load(&counters.requirements_count),
    })
}
