//! District and province runs over a tree of ward directories.
//!
//! ```text
//! <district>/
//!   <ward>/EA_original_do_not_edit.shp   boundary, rewritten with aggregates
//!   <ward>/building_centroids.shp
//!   <ward>/HH.csv, POI.csv               written by the partition step
//!   <ward>/HH.shp, POI.shp               written from the CSVs
//! ```
//!
//! Every ward is processed on its own: a failure is logged, recorded in the
//! report and the next ward proceeds.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{
    aggregate::{BoundaryConfig, BoundarySources, MergeReport, update_boundary_file},
    common::{extract_zip, list_files_with_extension, list_subdirs, read_csv, require_dir_exists},
    config::ProcessingParams,
    layer::{PointLayer, PolygonLayer},
    listing::{drop_missing_coordinates, reconcile_coordinates, split_and_save},
    ward::{DiskWards, IndelRatio, PartitionReport, partition_by_ward},
};

/// How one ward ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WardStatus {
    Updated(MergeReport),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WardOutcome {
    pub district: String,
    pub ward: String,
    pub status: WardStatus,
}

impl WardOutcome {
    #[inline] pub fn is_updated(&self) -> bool { matches!(self.status, WardStatus::Updated(_)) }
}

/// Point shapefiles written per ward, and the wards where that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PointFilesReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct DistrictReport {
    pub records: usize,
    pub dropped_missing_coordinates: usize,
    pub dwellings: usize,
    pub pois: usize,
    pub purity_violations: usize,
    pub dwelling_partition: PartitionReport,
    pub poi_partition: PartitionReport,
    pub point_files: PointFilesReport,
    pub wards: Vec<WardOutcome>,
}

impl DistrictReport {
    pub fn updated_wards(&self) -> usize { self.wards.iter().filter(|w| w.is_updated()).count() }
}

#[derive(Debug, Clone, Default)]
pub struct ProvinceReport {
    pub wards: Vec<WardOutcome>,
    /// Districts whose ward directories could not be listed.
    pub district_failures: Vec<(String, String)>,
}

fn dir_name(path: &Path) -> String {
    path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn record(outcomes: &mut Vec<WardOutcome>, district: &str, ward: String, result: Result<MergeReport>) {
    let status = match result {
        Ok(report) => WardStatus::Updated(report),
        Err(e) => {
            warn!("[pipeline] ward {district}/{ward} failed: {e:#}");
            WardStatus::Failed(format!("{e:#}"))
        }
    };
    outcomes.push(WardOutcome { district: district.to_string(), ward, status });
}

/// Aggregate the ward's point files onto its boundary file.
fn update_ward_boundary(ward_dir: &Path, config: &BoundaryConfig) -> Result<MergeReport> {
    let (boundary, households, pois, buildings) = (
        config.boundary_path(ward_dir),
        config.households_path(ward_dir),
        config.pois_path(ward_dir),
        config.buildings_path(ward_dir),
    );
    update_boundary_file(&BoundarySources {
        boundary: &boundary,
        households: &households,
        pois: &pois,
        buildings: &buildings,
    }, config)
}

/// Convert each ward's household and POI CSVs into point shapefiles.
pub fn create_ward_point_files(district_dir: &Path, params: &ProcessingParams) -> Result<PointFilesReport> {
    let mut report = PointFilesReport::default();

    for ward_dir in list_subdirs(district_dir)? {
        let written = (|| -> Result<Vec<PathBuf>> {
            let mut written = Vec::new();
            for stem in [&params.boundary.households_stem, &params.boundary.pois_stem] {
                let csv = ward_dir.join(format!("{stem}.csv"));
                let shp = ward_dir.join(format!("{stem}.shp"));
                PointLayer::from_csv(&csv, &params.lon_col, &params.lat_col, params.project_points)
                    .with_context(|| format!("building points from {}", csv.display()))?
                    .write_shapefile(&shp)?;
                written.push(shp);
            }
            Ok(written)
        })();

        match written {
            Ok(paths) => report.written.extend(paths),
            Err(e) => {
                let ward = dir_name(&ward_dir);
                warn!("[pipeline] no point files for ward {ward}: {e:#}");
                report.failures.push((ward, format!("{e:#}")));
            }
        }
    }

    Ok(report)
}

/// Unpack any archives sitting in ward directories, in place.
fn extract_ward_archives(district_dir: &Path) -> Result<()> {
    for ward_dir in list_subdirs(district_dir)? {
        for archive in list_files_with_extension(&ward_dir, "zip")? {
            match extract_zip(&archive, &ward_dir, false) {
                Ok(()) => info!("[pipeline] extracted {}", archive.display()),
                Err(e) => warn!("[pipeline] {e:#}"),
            }
        }
    }
    Ok(())
}

/// Runs a raw district listing through every stage, down to the ward boundaries.
#[derive(Debug, Clone)]
pub struct DistrictProcessor<'a> {
    raw_csv: PathBuf,
    district_dir: PathBuf,
    district: String,
    params: &'a ProcessingParams,
}

impl<'a> DistrictProcessor<'a> {
    /// The district name defaults to the directory name.
    pub fn new(raw_csv: impl Into<PathBuf>, district_dir: impl Into<PathBuf>, params: &'a ProcessingParams) -> Self {
        let district_dir = district_dir.into();
        let district = dir_name(&district_dir);
        Self { raw_csv: raw_csv.into(), district_dir, district, params }
    }

    pub fn with_district(mut self, district: &str) -> Self {
        self.district = district.to_string();
        self
    }

    #[inline] pub fn district(&self) -> &str { &self.district }

    /// Intermediate dwelling table written beside the ward directories.
    pub fn dwellings_path(&self) -> PathBuf {
        self.district_dir.join(format!("TMP_{}_District_processed_df.csv", self.district))
    }

    /// Intermediate POI table written beside the ward directories.
    pub fn pois_path(&self) -> PathBuf {
        self.district_dir.join(format!("TMP_{}_District_processed_poi.csv", self.district))
    }

    pub fn run(&self) -> Result<DistrictReport> {
        let params = self.params;
        require_dir_exists(&self.district_dir)?;
        extract_ward_archives(&self.district_dir)?;

        let mut raw = read_csv(&self.raw_csv)
            .with_context(|| format!("[pipeline] reading raw listing for {}", self.district))?;
        let records = raw.height();
        reconcile_coordinates(&mut raw, "raw listing", &params.coordinate_fixes)?;
        let (listing, dropped) = drop_missing_coordinates(&raw, "raw listing", &params.coordinate_fixes)?;

        let split = split_and_save(&listing, &params.split, &self.dwellings_path(), &self.pois_path())?;

        let mut wards = DiskWards::new(&self.district_dir);
        let dwelling_partition = partition_by_ward(&split.dwellings, &params.ward_col, &params.boundary.households_stem, &mut wards, &IndelRatio)?;
        let poi_partition = partition_by_ward(&split.pois, &params.ward_col, &params.boundary.pois_stem, &mut wards, &IndelRatio)?;

        let point_files = create_ward_point_files(&self.district_dir, params)?;

        let mut outcomes = Vec::new();
        for ward_dir in list_subdirs(&self.district_dir)? {
            let result = update_ward_boundary(&ward_dir, &params.boundary);
            record(&mut outcomes, &self.district, dir_name(&ward_dir), result);
        }

        let report = DistrictReport {
            records,
            dropped_missing_coordinates: dropped,
            dwellings: split.dwellings.height(),
            pois: split.pois.height(),
            purity_violations: split.purity_violations.len(),
            dwelling_partition,
            poi_partition,
            point_files,
            wards: outcomes,
        };
        info!("[pipeline] district {}: {} of {} wards updated",
            self.district, report.updated_wards(), report.wards.len());
        Ok(report)
    }
}

/// Cut province-level point layers down to `ward_dir` and update its boundary.
fn update_ward_from_points(
    ward_dir: &Path,
    households: &PointLayer,
    pois: &PointLayer,
    config: &BoundaryConfig,
) -> Result<MergeReport> {
    let boundary = PolygonLayer::read_shapefile(&config.boundary_path(ward_dir))?;
    households.within(&boundary)?.write_shapefile(&config.households_path(ward_dir))?;
    pois.within(&boundary)?.write_shapefile(&config.pois_path(ward_dir))?;
    update_ward_boundary(ward_dir, config)
}

/// Province mode: every `<province>/<district>/<ward>` gets its share of the
/// province household and POI point files, then an updated boundary.
pub fn update_wards_from_points(
    province_dir: &Path,
    households_shp: &Path,
    pois_shp: &Path,
    params: &ProcessingParams,
) -> Result<ProvinceReport> {
    let households = PointLayer::read_shapefile(households_shp)
        .with_context(|| format!("[pipeline] reading {}", households_shp.display()))?;
    let pois = PointLayer::read_shapefile(pois_shp)
        .with_context(|| format!("[pipeline] reading {}", pois_shp.display()))?;
    let config = params.province_boundary();

    let mut report = ProvinceReport::default();
    for district_dir in list_subdirs(province_dir)? {
        let district = dir_name(&district_dir);
        let ward_dirs = match list_subdirs(&district_dir) {
            Ok(dirs) => dirs,
            Err(e) => {
                warn!("[pipeline] skipping district {district}: {e:#}");
                report.district_failures.push((district, format!("{e:#}")));
                continue
            }
        };

        for ward_dir in ward_dirs {
            let result = update_ward_from_points(&ward_dir, &households, &pois, &config);
            record(&mut report.wards, &district, dir_name(&ward_dir), result);
        }
    }

    info!("[pipeline] province {}: {} of {} wards updated", province_dir.display(),
        report.wards.iter().filter(|w| w.is_updated()).count(), report.wards.len());
    Ok(report)
}
