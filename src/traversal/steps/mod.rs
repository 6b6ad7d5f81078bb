//! Concrete step kinds.
//!
//! Only the steps needed to drive the scoping and composition protocol live
//! here; richer step catalogues plug in through the [`Step`](crate::traversal::Step)
//! trait.

mod identity;
mod inject;
mod lambda;
mod select_one;
mod store;

pub use identity::IdentityStep;
pub use inject::InjectStep;
pub use lambda::{LambdaFn, LambdaMapStep};
pub use select_one::SelectOneStep;
pub use store::StoreStep;
