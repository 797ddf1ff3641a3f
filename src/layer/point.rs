use std::path::Path;

use anyhow::{Result, ensure};
use geo::Point;
use polars::frame::DataFrame;
use tracing::debug;

use super::PolygonLayer;
use crate::{
    common::{f64_values, filter_rows, read_csv, read_point_shapefile, write_point_shapefile},
    error::ProcessingError,
    geom::{Crs, Reprojector},
};

/// Point records (households, POIs, building centroids) with their attributes.
#[derive(Debug, Clone)]
pub struct PointLayer {
    data: DataFrame,
    points: Vec<Point<f64>>,
    crs: Crs,
}

impl PointLayer {
    pub fn new(data: DataFrame, points: Vec<Point<f64>>, crs: Crs) -> Result<Self> {
        ensure!(data.height() == points.len(),
            "point layer has {} attribute rows for {} points", data.height(), points.len());
        Ok(Self { data, points, crs })
    }

    /// Attach a point to every row from its longitude/latitude columns,
    /// tagged WGS84, then reproject when `project_to` is given.
    /// A row without numeric coordinates fails the whole table.
    pub fn from_table(data: DataFrame, lon: &str, lat: &str, project_to: Option<Crs>) -> Result<Self> {
        let xs = f64_values(&data, "points", lon)?;
        let ys = f64_values(&data, "points", lat)?;

        let points = xs.into_iter().zip(ys).enumerate()
            .map(|(row, coords)| match coords {
                (Some(x), Some(y)) => Ok(Point::new(x, y)),
                _ => Err(ProcessingError::MissingCoordinates {
                    table: "points".into(),
                    row,
                    lon: lon.to_string(),
                    lat: lat.to_string(),
                }.into()),
            })
            .collect::<Result<Vec<_>>>()?;

        let layer = Self::new(data, points, Crs::WGS84)?;
        match project_to {
            Some(target) => layer.to_crs(target),
            None => Ok(layer),
        }
    }

    /// [`PointLayer::from_table`] over a CSV file.
    pub fn from_csv(path: &Path, lon: &str, lat: &str, project_to: Option<Crs>) -> Result<Self> {
        Self::from_table(read_csv(path)?, lon, lat, project_to)
    }

    /// Read a point shapefile; the CRS comes from its `.prj`.
    pub fn read_shapefile(path: &Path) -> Result<Self> {
        let (data, points) = read_point_shapefile(path)?;
        Self::new(data, points, super::crs_or_default(path)?)
    }

    pub fn write_shapefile(&self, path: &Path) -> Result<()> {
        write_point_shapefile(path, &self.data, &self.points, self.crs)
    }

    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    #[inline] pub fn points(&self) -> &[Point<f64>] { &self.points }

    #[inline] pub fn crs(&self) -> Crs { self.crs }

    #[inline] pub fn len(&self) -> usize { self.points.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.points.is_empty() }

    /// Replace the attribute table, keeping the points.
    pub fn with_data(&self, data: DataFrame) -> Result<Self> {
        Self::new(data, self.points.clone(), self.crs)
    }

    /// Reproject every point. Returns a copy when already in `target`.
    pub fn to_crs(&self, target: Crs) -> Result<Self> {
        if target == self.crs { return Ok(self.clone()) }
        let reprojector = Reprojector::new(self.crs, target)?;
        let points = self.points.iter()
            .map(|point| reprojector.geometry(point))
            .collect::<Result<Vec<_>>>()?;
        Self::new(self.data.clone(), points, target)
    }

    /// Keep the points lying inside some polygon of `region`, in this layer's CRS.
    pub fn within(&self, region: &PolygonLayer) -> Result<Self> {
        let region = region.to_crs(self.crs)?;
        let keep = self.points.iter()
            .map(|&point| !region.containing(point).is_empty())
            .collect::<Vec<_>>();

        let points = self.points.iter().zip(&keep)
            .filter_map(|(point, &inside)| inside.then_some(*point))
            .collect::<Vec<_>>();
        debug!("[layer] {} of {} points inside region", points.len(), self.points.len());
        Self::new(filter_rows(&self.data, &keep)?, points, self.crs)
    }
}
