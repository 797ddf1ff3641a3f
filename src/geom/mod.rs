mod bbox;
mod crs;
mod index;
mod proj;

pub use crs::Crs;
pub use index::PolygonIndex;
pub use proj::Reprojector;
