//! Crate error type.

use std::fmt;

use thiserror::Error;

use crate::traversal::Scope;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, WeftError>;

/// Identifier of a step within its traversal.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StepId(pub u32);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors surfaced while assembling or executing a traversal.
///
/// Resolution errors carry the scope and binding name of the offending step
/// plus the string form of the traverser value. Failures raised inside a child
/// traversal are returned as-is by the parent, so the original variant
/// survives any number of nesting levels.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WeftError {
    /// A named binding could not be resolved under the given scope.
    #[error("{scope}-scoped binding '{name}' not found in {observed}")]
    BindingNotFound {
        /// Binding that was requested.
        name: String,
        /// Scope the step was configured with.
        scope: Scope,
        /// String form of the traverser at the time of the lookup.
        observed: String,
    },
    /// Local resolution was attempted on a value that is not a map.
    #[error("local-scoped binding '{name}' requires a map value, found {found}: {observed}")]
    ShapeMismatch {
        /// Binding that was requested.
        name: String,
        /// Type name of the traverser value.
        found: &'static str,
        /// String form of the traverser at the time of the lookup.
        observed: String,
    },
    /// A child traversal finished without emitting a value.
    #[error("child traversal of step {step} produced no value for {observed}")]
    EmptyChildResult {
        /// Parent step that applied the child.
        step: StepId,
        /// String form of the value handed to the child.
        observed: String,
    },
    /// The traversal was mutated after it was locked for execution.
    #[error("traversal is locked; steps cannot be reconfigured once execution has begun")]
    TraversalLocked,
    /// A child traversal was executed directly instead of through its parent.
    #[error("child traversals execute through their parent step")]
    ChildTraversal,
    /// Child traversals were nested deeper than the configured limit.
    #[error("child traversal nesting exceeds {max} levels")]
    NestingTooDeep {
        /// Configured limit.
        max: usize,
    },
    /// A side-effect write targeted a key that was never registered.
    #[error("side-effect '{key}' is not registered")]
    SideEffectNotRegistered {
        /// Key that was written.
        key: String,
    },
    /// A side-effect reducer could not combine the stored and incoming values.
    #[error("side-effect '{key}' cannot apply {operator} to {stored} and {incoming}")]
    OperatorMismatch {
        /// Key that was written.
        key: String,
        /// Reducer name.
        operator: &'static str,
        /// Type of the stored value.
        stored: &'static str,
        /// Type of the incoming value.
        incoming: &'static str,
    },
    /// Execution was cancelled by the caller.
    #[error("execution cancelled")]
    Cancelled,
    /// A user-supplied step function failed.
    #[error("lambda '{name}' failed: {message}")]
    Lambda {
        /// Name the lambda was registered under.
        name: String,
        /// Failure message returned by the lambda.
        message: String,
    },
    /// Invalid argument or traversal shape.
    #[error("invalid argument: {0}")]
    Invalid(String),
    /// Configuration could not be loaded.
    #[error("config: {0}")]
    Config(String),
}

impl WeftError {
    /// Returns `true` for every variant that signals a failed binding lookup.
    ///
    /// [`WeftError::ShapeMismatch`] counts as a binding failure at the protocol
    /// level; it only exists as a separate variant for diagnostics.
    pub fn is_binding_not_found(&self) -> bool {
        matches!(
            self,
            WeftError::BindingNotFound { .. } | WeftError::ShapeMismatch { .. }
        )
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            WeftError::BindingNotFound { .. } => "BindingNotFound",
            WeftError::ShapeMismatch { .. } => "ShapeMismatch",
            WeftError::EmptyChildResult { .. } => "EmptyChildResult",
            WeftError::TraversalLocked => "TraversalLocked",
            WeftError::ChildTraversal => "ChildTraversal",
            WeftError::NestingTooDeep { .. } => "NestingTooDeep",
            WeftError::SideEffectNotRegistered { .. } => "SideEffectNotRegistered",
            WeftError::OperatorMismatch { .. } => "OperatorMismatch",
            WeftError::Cancelled => "Cancelled",
            WeftError::Lambda { .. } => "Lambda",
            WeftError::Invalid(_) => "Invalid",
            WeftError::Config(_) => "Config",
        }
    }
}

/// Convenience wrapper that formats errors with their codes.
pub struct WeftErrorWithCode<'a>(pub &'a WeftError);

impl fmt::Display for WeftErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}

/// Truncates a diagnostic string to at most `limit` characters.
pub(crate) fn observed(state: impl fmt::Display, limit: usize) -> String {
    let rendered = state.to_string();
    if rendered.chars().count() <= limit {
        return rendered;
    }
    let mut out: String = rendered.chars().take(limit).collect();
    out.push_str("...");
    out
}
