//! Structural description of an assembled traversal.
//!
//! Explain trees double as the traversal's structural identity: equality and
//! the plan hash are both derived from them, so two traversals assembled from
//! the same steps, configuration and children compare equal regardless of
//! where they were built.

use std::fmt;
use std::hash::Hasher;

use serde::Serialize;
use xxhash_rust::xxh64::Xxh64;

use crate::error::{Result, WeftError};
use crate::traversal::requirements::Requirements;
use crate::traversal::step::Step;
use crate::traversal::{Traversal, Value};

/// Single property associated with an [`ExplainNode`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ExplainProp {
    /// Property key.
    pub key: String,
    /// Property value serialized for display.
    pub value: String,
    /// Whether this property contains literal data that may be redacted.
    pub redactable: bool,
    /// Type-faithful form used for equality and hashing. `1` and `1.0`
    /// display alike but differ here.
    #[serde(skip)]
    pub fingerprint: String,
}

impl ExplainProp {
    /// Configuration value.
    pub fn plain(key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            key: key.into(),
            fingerprint: value.clone(),
            value,
            redactable: false,
        }
    }

    /// Literal values, displayed as a list and fingerprinted with their types.
    pub fn values(key: impl Into<String>, values: &[Value]) -> Self {
        Self {
            key: key.into(),
            value: Value::List(values.to_vec()).to_string(),
            redactable: true,
            fingerprint: format!("{values:?}"),
        }
    }
}

/// Explain node describing one step and its children.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ExplainNode {
    /// Step name.
    pub op: String,
    /// Path labels of the step.
    pub labels: Vec<String>,
    /// Step configuration.
    pub props: Vec<ExplainProp>,
    /// Effective requirements of the step, children included.
    pub requirements: Requirements,
    /// Child traversals, each as its list of steps.
    pub children: Vec<Vec<ExplainNode>>,
}

/// Explain output for a whole traversal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TraversalExplain {
    /// Steps in pipeline order.
    pub steps: Vec<ExplainNode>,
    /// Effective requirements of the traversal.
    pub requirements: Requirements,
    /// Declared side-effect keys.
    pub side_effects: Vec<String>,
    /// Deterministic structural hash.
    pub plan_hash: u64,
}

impl TraversalExplain {
    /// Renders the explain tree as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| WeftError::Invalid(err.to_string()))
    }
}

pub(crate) fn build_explain_nodes(traversal: &Traversal) -> Vec<ExplainNode> {
    traversal.steps().iter().map(|step| explain_step(step.as_ref())).collect()
}

fn explain_step(step: &dyn Step) -> ExplainNode {
    let children = step
        .as_parent()
        .map(|parent| {
            parent
                .children()
                .into_iter()
                .map(build_explain_nodes)
                .collect()
        })
        .unwrap_or_default();
    ExplainNode {
        op: step.name().to_owned(),
        labels: step.labels().iter().cloned().collect(),
        props: step.props(),
        requirements: step.requirements(),
        children,
    }
}

pub(crate) fn hash_explain_nodes(nodes: &[ExplainNode]) -> u64 {
    let mut hasher = Xxh64::new(0);
    write_nodes(nodes, &mut hasher);
    hasher.finish()
}

fn write_nodes(nodes: &[ExplainNode], hasher: &mut Xxh64) {
    hasher.write_u64(nodes.len() as u64);
    for node in nodes {
        hasher.write(node.op.as_bytes());
        hasher.write_u64(node.labels.len() as u64);
        for label in &node.labels {
            hasher.write(label.as_bytes());
        }
        for prop in &node.props {
            hasher.write(prop.key.as_bytes());
            hasher.write(prop.fingerprint.as_bytes());
        }
        hasher.write_u64(node.children.len() as u64);
        for child in &node.children {
            write_nodes(child, hasher);
        }
    }
}

/// Formats steps as `[Name(arg,arg,[child])@[label], ...]`.
pub(crate) struct StepListDisplay<'a>(pub &'a [ExplainNode]);

impl fmt::Display for StepListDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (idx, node) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&node.op)?;
            let has_args = !node.props.is_empty() || !node.children.is_empty();
            if has_args {
                f.write_str("(")?;
                let args = node
                    .props
                    .iter()
                    .map(|prop| prop.value.clone())
                    .chain(
                        node.children
                            .iter()
                            .map(|child| StepListDisplay(child).to_string()),
                    );
                for (arg_idx, arg) in args.enumerate() {
                    if arg_idx > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str(&arg)?;
                }
                f.write_str(")")?;
            }
            if !node.labels.is_empty() {
                write!(f, "@[{}]", node.labels.join(","))?;
            }
        }
        f.write_str("]")
    }
}
