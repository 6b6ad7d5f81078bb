//! Execution core for step-based graph traversals.
//!
//! Traversals are assembled from [`Step`](traversal::Step)s, locked once their
//! requirements are known, and executed lazily over start values. Steps such
//! as [`SelectOneStep`](traversal::steps::SelectOneStep) resolve named bindings
//! either from the current value or from the traverser's history.
//!
//! ```
//! use weft::traversal::{Scope, TraversalBuilder, Value};
//!
//! let mut traversal = TraversalBuilder::start()
//!     .inject([Value::map([("age", Value::Int(30))])])
//!     .select_one(Scope::Local, "age")
//!     .build()?;
//! let values = traversal.execute()?.collect_values()?;
//! assert_eq!(values, vec![Value::Int(30)]);
//! # Ok::<(), weft::WeftError>(())
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod traversal;

pub use config::EngineConfig;
pub use error::{Result, StepId, WeftError};
