use std::path::Path;

use anyhow::{Result, ensure};
use geo::{MultiPolygon, Point};
use polars::frame::DataFrame;

use crate::{
    common::{read_polygon_shapefile, write_polygon_shapefile},
    geom::{Crs, PolygonIndex, Reprojector},
};

/// Boundary polygons (EAs) with their attribute table.
#[derive(Debug, Clone)]
pub struct PolygonLayer {
    data: DataFrame,
    shapes: Vec<MultiPolygon<f64>>,
    index: PolygonIndex,
    crs: Crs,
}

impl PolygonLayer {
    pub fn new(data: DataFrame, shapes: Vec<MultiPolygon<f64>>, crs: Crs) -> Result<Self> {
        ensure!(data.height() == shapes.len(),
            "polygon layer has {} attribute rows for {} shapes", data.height(), shapes.len());
        let index = PolygonIndex::new(&shapes);
        Ok(Self { data, shapes, index, crs })
    }

    /// Read a polygon shapefile; the CRS comes from its `.prj`.
    pub fn read_shapefile(path: &Path) -> Result<Self> {
        let (data, shapes) = read_polygon_shapefile(path)?;
        Self::new(data, shapes, super::crs_or_default(path)?)
    }

    pub fn write_shapefile(&self, path: &Path) -> Result<()> {
        write_polygon_shapefile(path, &self.data, &self.shapes, self.crs)
    }

    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    #[inline] pub fn shapes(&self) -> &[MultiPolygon<f64>] { &self.shapes }

    #[inline] pub fn crs(&self) -> Crs { self.crs }

    #[inline] pub fn len(&self) -> usize { self.shapes.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.shapes.is_empty() }

    /// Same polygons with a different attribute table.
    pub fn with_data(&self, data: DataFrame) -> Result<Self> {
        ensure!(data.height() == self.shapes.len(),
            "replacement table has {} rows for {} shapes", data.height(), self.shapes.len());
        Ok(Self { data, ..self.clone() })
    }

    /// Rows of the polygons strictly containing `point`.
    pub fn containing(&self, point: Point<f64>) -> Vec<usize> {
        self.index.containing(&self.shapes, point)
    }

    /// Reproject every polygon. Returns a copy when already in `target`.
    pub fn to_crs(&self, target: Crs) -> Result<Self> {
        if target == self.crs { return Ok(self.clone()) }
        let reprojector = Reprojector::new(self.crs, target)?;
        let shapes = self.shapes.iter()
            .map(|shape| reprojector.geometry(shape))
            .collect::<Result<Vec<_>>>()?;
        Self::new(self.data.clone(), shapes, target)
    }
}
