//! Local/global binding resolution shared by scoped steps.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{observed, Result, WeftError};
use crate::traversal::profile::{profile_timer, record_profile_timer, TraversalProfileKind};
use crate::traversal::{Traverser, Value};

/// Default number of characters of traverser state quoted in errors.
pub const DEFAULT_OBSERVED_STATE_LIMIT: usize = 256;

/// Where a scoped step looks up named bindings.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only the current value, which must be map-shaped.
    Local,
    /// The traverser's path, then the side-effect table.
    #[default]
    Global,
}

impl Scope {
    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Global => "global",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability of steps that resolve named bindings from a traverser.
pub trait Scoping {
    /// Configured scope.
    fn scope(&self) -> Scope;

    /// Reconfigures the scope. Only reachable while the owning traversal is
    /// still being assembled.
    fn set_scope(&mut self, scope: Scope);

    /// Scope a child traversal embedded after this step should default to.
    fn recommend_next_scope(&self) -> Scope;

    /// Binding names this step resolves.
    fn scope_keys(&self) -> Vec<String>;

    /// Resolves `name` from `traverser` under the configured scope.
    fn resolve_binding(&self, name: &str, traverser: &Traverser) -> Result<Value> {
        self.resolve_binding_with_limit(name, traverser, DEFAULT_OBSERVED_STATE_LIMIT)
    }

    /// Same as [`Scoping::resolve_binding`], quoting at most `limit`
    /// characters of traverser state in errors.
    fn resolve_binding_with_limit(
        &self,
        name: &str,
        traverser: &Traverser,
        limit: usize,
    ) -> Result<Value> {
        let timer = profile_timer();
        let resolved = resolve_scoped(self.scope(), name, traverser, limit);
        record_profile_timer(TraversalProfileKind::ResolveBinding, timer);
        resolved
    }
}

/// Resolves `name` from `traverser`.
///
/// Local lookups read the current value's map. Global lookups prefer a path
/// entry labeled `name` and fall back to the side-effect table.
pub fn resolve_scoped(
    scope: Scope,
    name: &str,
    traverser: &Traverser,
    limit: usize,
) -> Result<Value> {
    let found = match scope {
        Scope::Local => {
            let Some(map) = traverser.get().as_map() else {
                return Err(WeftError::ShapeMismatch {
                    name: name.to_owned(),
                    found: traverser.get().type_name(),
                    observed: observed(traverser, limit),
                });
            };
            map.get(name).cloned()
        }
        Scope::Global => traverser
            .path()
            .get(name)
            .cloned()
            .or_else(|| traverser.side_effect(name)),
    };
    found.ok_or_else(|| WeftError::BindingNotFound {
        name: name.to_owned(),
        scope,
        observed: observed(traverser, limit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::requirements::{PathTracking, TraverserShape};
    use crate::traversal::{Operator, SideEffects};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn traverser(value: Value, labels: &[&str], side_effects: SideEffects) -> Traverser {
        let labels: BTreeSet<String> = labels.iter().map(|l| (*l).to_owned()).collect();
        Traverser::start(
            value,
            &labels,
            Arc::new(side_effects),
            TraverserShape {
                path: PathTracking::Full,
                bulk: false,
            },
        )
    }

    #[test]
    fn local_reads_map_entry() {
        let t = traverser(Value::map([("age", 30)]), &[], SideEffects::new());
        assert_eq!(
            resolve_scoped(Scope::Local, "age", &t, 64).expect("resolve"),
            Value::Int(30)
        );
    }

    #[test]
    fn local_missing_key_is_binding_not_found() {
        let t = traverser(Value::map([("age", 30)]), &[], SideEffects::new());
        let err = resolve_scoped(Scope::Local, "name", &t, 64).unwrap_err();
        assert_eq!(
            err,
            WeftError::BindingNotFound {
                name: "name".into(),
                scope: Scope::Local,
                observed: "{age: 30}".into(),
            }
        );
    }

    #[test]
    fn local_on_scalar_is_shape_mismatch() {
        let t = traverser(Value::Int(7), &[], SideEffects::new());
        let err = resolve_scoped(Scope::Local, "age", &t, 64).unwrap_err();
        assert!(matches!(err, WeftError::ShapeMismatch { found: "int", .. }));
        assert!(err.is_binding_not_found());
    }

    #[test]
    fn global_prefers_path_over_side_effects() {
        let side_effects = SideEffects::new();
        side_effects.register("x", Value::Int(1), Operator::Assign);
        let t = traverser(Value::Int(5), &["x"], side_effects);
        assert_eq!(
            resolve_scoped(Scope::Global, "x", &t, 64).expect("resolve"),
            Value::Int(5)
        );
    }

    #[test]
    fn global_falls_back_to_side_effects() {
        let side_effects = SideEffects::new();
        side_effects.register("x", Value::Int(1), Operator::Assign);
        let t = traverser(Value::Int(5), &["y"], side_effects);
        assert_eq!(
            resolve_scoped(Scope::Global, "x", &t, 64).expect("resolve"),
            Value::Int(1)
        );
        let err = resolve_scoped(Scope::Global, "z", &t, 64).unwrap_err();
        assert!(matches!(
            err,
            WeftError::BindingNotFound {
                scope: Scope::Global,
                ..
            }
        ));
    }
}
