//! Point-in-polygon aggregation onto EA boundaries.

mod merge;
mod spatial;

pub use merge::*;
pub use spatial::*;
