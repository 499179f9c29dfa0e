pub mod constraint;
pub mod normalize;
pub mod problem;

pub use constraint::{Assignment, Constraint, Cost, ValueIndex, VariableId};
pub use problem::{ScopeKey, Wcsp};
