//! Attribute tables paired with geometry and a CRS tag.

mod point;
mod polygon;

pub use point::PointLayer;
pub use polygon::PolygonLayer;

use std::path::Path;

use anyhow::Result;
use tracing::warn;

use crate::{common::read_prj, geom::Crs};

/// CRS from the `.prj` beside `path`, WGS84 when missing or unrecognised.
fn crs_or_default(path: &Path) -> Result<Crs> {
    Ok(match read_prj(path)? {
        Some(crs) => crs,
        None => {
            warn!("[layer] no usable .prj for {}, assuming {}", path.display(), Crs::WGS84);
            Crs::WGS84
        }
    })
}
