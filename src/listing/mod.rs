//! Record-level cleaning of listing tables: coordinate reconciliation,
//! rule-cascade labelling, the dwelling/POI split and household extraction.

mod classify;
mod coords;
mod extract;
mod split;

pub use classify::*;
pub use coords::*;
pub use extract::*;
pub use split::*;
