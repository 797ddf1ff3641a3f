//! Ward-level partitioning of district tables.

mod inventory;
mod matcher;
mod partition;

pub use inventory::*;
pub use matcher::*;
pub use partition::*;
