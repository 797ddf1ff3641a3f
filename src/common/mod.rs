mod csv;
mod fs;
mod shp;
mod table;

pub use csv::*;
pub use fs::*;
pub use shp::*;
pub use table::*;
