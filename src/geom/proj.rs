use anyhow::{Context, Result, anyhow};
use geo::{Coord, MapCoords};
use proj4rs::{proj::Proj as Proj4, transform::transform};

use super::Crs;

/// Coordinate transform between two supported reference systems.
pub struct Reprojector {
    from: Proj4,
    to: Proj4,
    from_geographic: bool,
    to_geographic: bool,
}

impl Reprojector {
    pub fn new(from: Crs, to: Crs) -> Result<Self> {
        let build = |crs: Crs| -> Result<Proj4> {
            let proj_string = crs.proj4()?;
            Proj4::from_proj_string(&proj_string)
                .with_context(|| anyhow!("failed to build PROJ.4 for {crs}: {proj_string}"))
        };

        Ok(Self {
            from: build(from)?,
            to: build(to)?,
            from_geographic: from.is_geographic(),
            to_geographic: to.is_geographic(),
        })
    }

    /// Transform one coordinate. Geographic systems take and give degrees.
    pub fn coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let mut point = if self.from_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        transform(&self.from, &self.to, &mut point)
            .map_err(|e| anyhow!("CRS transform failed for ({}, {}): {e:?}", coord.x, coord.y))?;

        Ok(if self.to_geographic {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        })
    }

    /// Transform every coordinate of a geometry.
    pub fn geometry<G: MapCoords<f64, f64>>(&self, geometry: &G) -> Result<G::Output> {
        geometry.try_map_coords(|coord| self.coord(coord))
    }
}

#[cfg(test)]
mod tests {
    use geo::Point;

    use super::*;

    #[test]
    fn utm_round_trip_stays_close() {
        let utm = Crs::utm(35, false).unwrap();
        let forward = Reprojector::new(Crs::WGS84, utm).unwrap();
        let back = Reprojector::new(utm, Crs::WGS84).unwrap();

        let lusaka = Point::new(28.2833, -15.4167);
        let projected = forward.geometry(&lusaka).unwrap();
        assert!(projected.x() > 100_000.0 && projected.x() < 900_000.0);
        assert!(projected.y() > 8_000_000.0 && projected.y() < 10_000_000.0);

        let restored = back.geometry(&projected).unwrap();
        assert!((restored.x() - lusaka.x()).abs() < 1e-6);
        assert!((restored.y() - lusaka.y()).abs() < 1e-6);
    }
}
