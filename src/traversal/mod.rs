#![forbid(unsafe_code)]

//! Traversal assembly and execution core.
//!
//! A traversal is a linear pipeline of steps through which traversers flow.
//! Steps may own child traversals, declare what traverser bookkeeping they
//! need, and resolve named bindings from the current value or from history.

/// Fluent traversal construction.
pub mod builder;

/// Pull-based execution engine.
///
/// Streams result traversers and runs child traversals on behalf of parent steps.
pub mod executor;

/// Structural explain trees and plan hashing.
pub mod explain;

/// Child traversal ownership for composite steps.
pub mod parent;

/// Persistent labeled history of traverser values.
pub mod path;

/// The step arena, its lifecycle and requirement propagation.
pub mod pipeline;

/// Performance profiling for traversal operations.
///
/// Collects timing and count statistics when `WEFT_PROFILE` is set.
pub mod profile;

/// Traverser capability requirements.
pub mod requirements;

/// Local/global binding resolution.
pub mod scope;

/// Per-execution shared state.
pub mod side_effects;

/// The step contract.
pub mod step;

/// Built-in steps.
pub mod steps;

/// Execution tokens.
pub mod traverser;

/// Dynamically typed traverser values.
pub mod value;

pub use builder::TraversalBuilder;
pub use executor::{Execution, ExecutionContext};
pub use explain::{ExplainNode, ExplainProp, TraversalExplain};
pub use parent::TraversalParent;
pub use path::Path;
pub use pipeline::{scope_requirements, Traversal, TraversalState};
pub use requirements::{PathTracking, Requirement, Requirements, TraverserShape};
pub use scope::{resolve_scoped, Scope, Scoping};
pub use side_effects::{Operator, SideEffectDecl, SideEffects};
pub use step::{SourceStep, Step, StepCore, StepOutput};
pub use traverser::Traverser;
pub use value::{ElementId, Value};
