//! Partition geometry: index boxes, rectilinear tilings, pencil plans.

pub mod factorize;
pub mod index_box;
pub mod partition;
pub mod pencil;

pub use factorize::factorize;
pub use index_box::IndexBox;
pub use partition::GridPartition;
pub use pencil::PencilPlan;
