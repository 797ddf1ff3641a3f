use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{AggColumn, AggFunc, AggregationSpec, aggregate_points};
use crate::{
    common::{DBF_FIELD_NAME_LEN, has_column},
    geom::Crs,
    layer::{PointLayer, PolygonLayer},
};

pub const STRUCT_COUNT_HOUSEHOLDS: &str = "StructCntHHs";
pub const STRUCT_COUNT_POIS: &str = "StructCntPOIs";
pub const STRUCT_COUNT_BUILDINGS: &str = "StructCntBlds";
pub const TOTAL_STRUCTURES: &str = "TotalStruct";

/// Ward-level boundary files and the columns aggregated onto them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    /// Boundary identifier column (unique per EA).
    pub aggregation_key: String,
    /// Every layer is brought into this CRS before joining.
    pub preferred_crs: Crs,
    /// File stem of the EA boundary shapefile inside a ward directory.
    pub boundary_stem: String,
    /// File stem of the building footprint centroids.
    pub buildings_stem: String,
    pub households_stem: String,
    pub pois_stem: String,
    /// Household point columns summed per EA. A name longer than a dbf field
    /// also matches its truncation.
    pub population_source: String,
    pub households_source: String,
    /// Names the two household sums take on the boundary.
    pub population_col: String,
    pub households_col: String,
    /// Building points carry a count in this column; when unset each building counts 1.
    pub building_count_col: Option<String>,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            aggregation_key: "GEOID".into(),
            preferred_crs: Crs::WGS84,
            boundary_stem: "EA_original_do_not_edit".into(),
            buildings_stem: "building_centroids".into(),
            households_stem: "HH".into(),
            pois_stem: "POI".into(),
            population_source: "HHPop".into(),
            households_source: "TotalHHs".into(),
            population_col: "HHPop".into(),
            households_col: "TotalHHs".into(),
            building_count_col: None,
        }
    }
}

impl BoundaryConfig {
    #[inline] pub fn boundary_path(&self, ward_dir: &Path) -> PathBuf { ward_dir.join(format!("{}.shp", self.boundary_stem)) }

    #[inline] pub fn buildings_path(&self, ward_dir: &Path) -> PathBuf { ward_dir.join(format!("{}.shp", self.buildings_stem)) }

    #[inline] pub fn households_path(&self, ward_dir: &Path) -> PathBuf { ward_dir.join(format!("{}.shp", self.households_stem)) }

    #[inline] pub fn pois_path(&self, ward_dir: &Path) -> PathBuf { ward_dir.join(format!("{}.shp", self.pois_stem)) }

    /// Columns this merge adds to a boundary table.
    pub fn output_columns(&self) -> Vec<String> {
        [
            self.population_col.as_str(),
            self.households_col.as_str(),
            STRUCT_COUNT_HOUSEHOLDS,
            STRUCT_COUNT_POIS,
            STRUCT_COUNT_BUILDINGS,
            TOTAL_STRUCTURES,
        ].map(String::from).to_vec()
    }

    /// Boundary columns removed before merging: earlier outputs under their
    /// full or dbf-truncated names, and the building count column.
    fn stale_columns(&self) -> Vec<String> {
        let mut stale = Vec::new();
        for name in self.output_columns() {
            let short = name.chars().take(DBF_FIELD_NAME_LEN).collect::<String>();
            if short != name { stale.push(short); }
            stale.push(name);
        }
        stale.extend(self.building_count_col.iter().cloned());
        stale
    }
}

/// `name` if `df` has it, else its dbf truncation if `df` has that.
fn resolve_source(df: &DataFrame, name: &str) -> String {
    let short = name.chars().take(DBF_FIELD_NAME_LEN).collect::<String>();
    if !has_column(df, name) && has_column(df, &short) { short } else { name.to_string() }
}

/// Row counts from one boundary update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub boundary_units: usize,
    pub household_units: usize,
    pub poi_units: usize,
    pub building_units: usize,
    /// Units present in all three aggregates.
    pub merged_units: usize,
}

/// Aggregate households, POIs and buildings per EA, keep the EAs present in
/// all three, add `TotalStruct`, and left-join the result onto the boundary
/// table. The returned layer keeps the boundary geometry and CRS.
pub fn merge_boundary_attributes(
    boundary: &PolygonLayer,
    households: &PointLayer,
    pois: &PointLayer,
    buildings: &PointLayer,
    config: &BoundaryConfig,
) -> Result<(PolygonLayer, MergeReport)> {
    let key = config.aggregation_key.as_str();
    let preferred = config.preferred_crs;

    let stale = config.stale_columns().into_iter()
        .filter(|name| name != key && has_column(boundary.data(), name))
        .collect::<Vec<_>>();
    let base = boundary.data().drop_many(stale.iter().map(String::as_str));
    let boundary = boundary.with_data(base.clone())?;

    let household_agg = aggregate_points(&boundary, households, &AggregationSpec {
        key: key.to_string(),
        columns: vec![
            AggColumn::new(&resolve_source(households.data(), &config.population_source), AggFunc::Sum, &config.population_col),
            AggColumn::new(&resolve_source(households.data(), &config.households_source), AggFunc::Sum, &config.households_col),
        ],
        count_column: Some(STRUCT_COUNT_HOUSEHOLDS.into()),
    }, preferred).context("aggregating households")?;

    let poi_agg = aggregate_points(&boundary, pois, &AggregationSpec {
        key: key.to_string(),
        columns: vec![],
        count_column: Some(STRUCT_COUNT_POIS.into()),
    }, preferred).context("aggregating POIs")?;

    let building_spec = match &config.building_count_col {
        Some(count) => AggregationSpec {
            key: key.to_string(),
            columns: vec![AggColumn::new(&resolve_source(buildings.data(), count), AggFunc::Sum, STRUCT_COUNT_BUILDINGS)],
            count_column: None,
        },
        None => AggregationSpec {
            key: key.to_string(),
            columns: vec![],
            count_column: Some(STRUCT_COUNT_BUILDINGS.into()),
        },
    };
    let building_agg = aggregate_points(&boundary, buildings, &building_spec, preferred)
        .context("aggregating buildings")?;

    let mut report = MergeReport {
        boundary_units: boundary.len(),
        household_units: household_agg.height(),
        poi_units: poi_agg.height(),
        building_units: building_agg.height(),
        merged_units: 0,
    };

    let merged = household_agg.lazy()
        .inner_join(poi_agg.lazy(), col(key), col(key))
        .inner_join(building_agg.lazy(), col(key), col(key))
        .with_column((col(STRUCT_COUNT_HOUSEHOLDS) + col(STRUCT_COUNT_POIS)).alias(TOTAL_STRUCTURES))
        .collect()?;
    report.merged_units = merged.height();

    let dropped = report.household_units.max(report.poi_units).max(report.building_units) - report.merged_units;
    if dropped > 0 {
        warn!("[aggregate] {dropped} EAs lack coverage in one of the three point sources and get no aggregates");
    }

    let data = base.with_row_index("__row".into(), None)?.lazy()
        .left_join(merged.lazy(), col(key), col(key))
        .collect()?
        .sort(["__row"], SortMultipleOptions::default())?
        .drop("__row")?;

    Ok((boundary.with_data(data)?, report))
}

/// Paths of the four shapefiles feeding one boundary update.
#[derive(Debug, Clone)]
pub struct BoundarySources<'a> {
    pub boundary: &'a Path,
    pub households: &'a Path,
    pub pois: &'a Path,
    pub buildings: &'a Path,
}

/// Read the boundary and point shapefiles, merge, and overwrite the boundary file.
pub fn update_boundary_file(sources: &BoundarySources<'_>, config: &BoundaryConfig) -> Result<MergeReport> {
    let read_points = |path: &Path| PointLayer::read_shapefile(path)
        .with_context(|| format!("reading {}", path.display()));

    let boundary = PolygonLayer::read_shapefile(sources.boundary)
        .with_context(|| format!("reading {}", sources.boundary.display()))?;
    let households = read_points(sources.households)?;
    let pois = read_points(sources.pois)?;
    let buildings = read_points(sources.buildings)?;

    let (updated, report) = merge_boundary_attributes(&boundary, &households, &pois, &buildings, config)?;
    updated.write_shapefile(sources.boundary)?;
    info!("[aggregate] rewrote {} ({} of {} EAs with aggregates)",
        sources.boundary.display(), report.merged_units, report.boundary_units);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use geo::{MultiPolygon, Point, Rect, coord};
    use polars::df;

    use super::*;

    fn square(x0: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Rect::new(coord! { x: x0, y: 0.0 }, coord! { x: x0 + 1.0, y: 1.0 }).to_polygon()])
    }

    fn layer(df: DataFrame, xs: &[f64]) -> PointLayer {
        PointLayer::new(df, xs.iter().map(|&x| Point::new(x, 0.5)).collect(), Crs::WGS84).unwrap()
    }

    #[test]
    fn inner_then_left_merge() {
        // EA "A" has all three sources, "B" lacks buildings, "C" has nothing.
        let boundary = PolygonLayer::new(
            df!["GEOID" => ["A", "B", "C"], "StructCntH" => [99i64, 99, 99]].unwrap(),
            vec![square(0.0), square(1.0), square(2.0)],
            Crs::WGS84,
        ).unwrap();
        let households = layer(df!["HHPop" => [4.0, 6.0, 5.0], "TotalHHs" => [1.0, 1.0, 2.0]].unwrap(), &[0.2, 0.7, 1.5]);
        let pois = layer(df!["StructType" => ["Shop", "Church"]].unwrap(), &[0.4, 1.4]);
        let buildings = layer(df!["id" => [1, 2, 3]].unwrap(), &[0.1, 0.3, 0.9]);

        let (updated, report) = merge_boundary_attributes(&boundary, &households, &pois, &buildings, &BoundaryConfig::default()).unwrap();
        assert_eq!(report.merged_units, 1);
        assert!(report.merged_units <= report.household_units.min(report.poi_units).min(report.building_units));

        let data = updated.data();
        assert_eq!(data.height(), 3);
        assert!(data.column("StructCntH").is_err());
        let keys = data.column("GEOID").unwrap().str().unwrap().into_no_null_iter().collect::<Vec<_>>();
        assert_eq!(keys, vec!["A", "B", "C"]);

        let pop = data.column("HHPop").unwrap().f64().unwrap();
        assert_eq!(pop.get(0), Some(10.0));
        assert_eq!(pop.get(1), None);
        let total = data.column(TOTAL_STRUCTURES).unwrap().i64().unwrap();
        assert_eq!(total.get(0), Some(3));
        assert_eq!(total.get(2), None);
        let blds = data.column(STRUCT_COUNT_BUILDINGS).unwrap().i64().unwrap();
        assert_eq!(blds.get(0), Some(3));
    }

    #[test]
    fn building_count_column_is_summed() {
        let boundary = PolygonLayer::new(df!["GEOID" => ["A"], "n_HH" => [7.0]].unwrap(), vec![square(0.0)], Crs::WGS84).unwrap();
        let households = layer(df!["HHPop" => [4.0], "TotalHHs" => [1.0]].unwrap(), &[0.2]);
        let pois = layer(df!["x" => [0]].unwrap(), &[0.4]);
        let buildings = layer(df!["n_HH" => [2.0, 3.0]].unwrap(), &[0.1, 0.3]);

        let config = BoundaryConfig { building_count_col: Some("n_HH".into()), ..BoundaryConfig::default() };
        let (updated, _) = merge_boundary_attributes(&boundary, &households, &pois, &buildings, &config).unwrap();
        assert!(updated.data().column("n_HH").is_err());
        assert_eq!(updated.data().column(STRUCT_COUNT_BUILDINGS).unwrap().f64().unwrap().get(0), Some(5.0));
    }

    #[test]
    fn truncated_household_columns_are_found() {
        let boundary = PolygonLayer::new(df!["GEOID" => ["A"]].unwrap(), vec![square(0.0)], Crs::WGS84).unwrap();
        let households = layer(df!["Household_" => ["3", "4"], "Total_Hous" => [1.0, 1.0]].unwrap(), &[0.2, 0.6]);
        let pois = layer(df!["x" => [0]].unwrap(), &[0.4]);
        let buildings = layer(df!["x" => [0]].unwrap(), &[0.5]);

        let config = BoundaryConfig {
            population_source: "Household_Population".into(),
            households_source: "Total_Households".into(),
            ..BoundaryConfig::default()
        };
        let (updated, _) = merge_boundary_attributes(&boundary, &households, &pois, &buildings, &config).unwrap();
        assert_eq!(updated.data().column("HHPop").unwrap().f64().unwrap().get(0), Some(7.0));
        assert_eq!(updated.data().column("TotalHHs").unwrap().f64().unwrap().get(0), Some(2.0));
    }
}
