//! Per-execution table of named values shared by every traverser.
//!
//! One table is created for each execution and handed to steps through the
//! execution context. Every key owns its own lock and a write touches exactly
//! one slot.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WeftError};
use crate::traversal::Value;

/// Reducer applied when a value is added to a side-effect.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// The incoming value replaces the stored one.
    #[default]
    Assign,
    /// Numeric addition.
    Sum,
    /// List concatenation; scalars are appended as one element.
    AddAll,
}

impl Operator {
    /// Name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Assign => "assign",
            Operator::Sum => "sum",
            Operator::AddAll => "addAll",
        }
    }

    /// Starting value for a slot registered on first write.
    pub fn identity(self) -> Value {
        match self {
            Operator::Assign => Value::Null,
            Operator::Sum => Value::Int(0),
            Operator::AddAll => Value::List(Vec::new()),
        }
    }

    /// Folds `incoming` into `stored` in place. `stored` is untouched on error.
    fn fold_into(self, key: &str, stored: &mut Value, incoming: Value) -> Result<()> {
        let mismatch = |stored: &Value, incoming: &Value| WeftError::OperatorMismatch {
            key: key.to_owned(),
            operator: self.as_str(),
            stored: stored.type_name(),
            incoming: incoming.type_name(),
        };
        match self {
            Operator::Assign => *stored = incoming,
            Operator::Sum => {
                let sum = match (&*stored, &incoming) {
                    (Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or_else(
                        || WeftError::Invalid(format!("side-effect '{key}' overflowed")),
                    )?,
                    (Value::Int(a), Value::Float(b)) => Value::Float(*a as f64 + b),
                    (Value::Float(a), Value::Int(b)) => Value::Float(a + *b as f64),
                    (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
                    (stored, incoming) => return Err(mismatch(stored, incoming)),
                };
                *stored = sum;
            }
            Operator::AddAll => match stored {
                Value::List(items) => match incoming {
                    Value::List(more) => items.extend(more),
                    single => items.push(single),
                },
                other => return Err(mismatch(other, &incoming)),
            },
        }
        Ok(())
    }
}

/// Side-effect registered on a traversal before execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SideEffectDecl {
    /// Side-effect key.
    pub key: String,
    /// Value the slot starts with in every execution.
    pub initial: Value,
    /// Reducer applied by [`SideEffects::add`].
    pub operator: Operator,
}

struct Slot {
    operator: Operator,
    value: Mutex<Value>,
}

impl Slot {
    fn new(initial: Value, operator: Operator) -> Arc<Self> {
        Arc::new(Self {
            operator,
            value: Mutex::new(initial),
        })
    }
}

/// Named values visible to every traverser of one execution.
#[derive(Default)]
pub struct SideEffects {
    slots: RwLock<FxHashMap<String, Arc<Slot>>>,
}

impl SideEffects {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table seeded from declarations.
    pub fn from_declarations(decls: &[SideEffectDecl]) -> Self {
        let table = Self::new();
        for decl in decls {
            table.register(decl.key.clone(), decl.initial.clone(), decl.operator);
        }
        table
    }

    /// Registers (or replaces) a slot.
    pub fn register(&self, key: impl Into<String>, initial: Value, operator: Operator) {
        let key = key.into();
        debug!(key = %key, operator = operator.as_str(), "side_effects.register");
        self.slots.write().insert(key, Slot::new(initial, operator));
    }

    /// Returns `true` if `key` is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.slots.read().contains_key(key)
    }

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        let slot = self.slot(key)?;
        let value = slot.value.lock().clone();
        Some(value)
    }

    /// Overwrites the value of a registered key.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        let slot = self.require(key)?;
        *slot.value.lock() = value;
        Ok(())
    }

    /// Folds `value` into `key` using the slot's reducer.
    ///
    /// The stored value is unchanged when the reducer fails.
    pub fn add(&self, key: &str, value: Value) -> Result<()> {
        let slot = self.require(key)?;
        Self::apply(key, &slot, value)
    }

    /// Like [`SideEffects::add`], registering `key` with `operator` first if
    /// it does not exist yet.
    pub fn add_or_register(&self, key: &str, value: Value, operator: Operator) -> Result<()> {
        let slot = match self.slot(key) {
            Some(slot) => slot,
            None => {
                let mut slots = self.slots.write();
                Arc::clone(
                    slots
                        .entry(key.to_owned())
                        .or_insert_with(|| Slot::new(operator.identity(), operator)),
                )
            }
        };
        Self::apply(key, &slot, value)
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.slots.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Copy of every slot's value.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let slots: Vec<(String, Arc<Slot>)> = self
            .slots
            .read()
            .iter()
            .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
            .collect();
        slots
            .into_iter()
            .map(|(key, slot)| {
                let value = slot.value.lock().clone();
                (key, value)
            })
            .collect()
    }

    fn slot(&self, key: &str) -> Option<Arc<Slot>> {
        self.slots.read().get(key).cloned()
    }

    fn require(&self, key: &str) -> Result<Arc<Slot>> {
        self.slot(key)
            .ok_or_else(|| WeftError::SideEffectNotRegistered {
                key: key.to_owned(),
            })
    }

    fn apply(key: &str, slot: &Slot, value: Value) -> Result<()> {
        let mut stored = slot.value.lock();
        slot.operator.fold_into(key, &mut stored, value)
    }
}

impl fmt::Debug for SideEffects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.snapshot()).finish()
    }
}
