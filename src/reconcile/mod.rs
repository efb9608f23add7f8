pub mod engine;
pub mod gate;
pub mod resolver;
pub mod transform;

pub use engine::{Outcome, Reconciler};
pub use gate::BranchGate;
