use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    classify::{HouseholdRules, PoiRules, label_structures},
    coords::{CoordinateFix, drop_missing_coordinates, reconcile_coordinates},
    split::select_and_rename,
};
use crate::common::{ensure_dir_exists, filter_rows, read_csv, write_csv};

/// Household/POI extraction from a merged survey table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub household_rules: HouseholdRules,
    pub poi_rules: PoiRules,
    pub household_columns: Vec<String>,
    pub poi_columns: Vec<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        let location = [
            "interview__key", "interview__id", "Cluster", "PROV", "DIST", "CONS",
            "WARD", "REGION", "SEA", "LOCALITY", "GPSLocation__Latitude",
            "GPSLocation__Longitude", "date", "GeoLocation_Latitude", "GeoLocation_Longitude",
        ];
        let household = [
            "Males_in_structure", "Females_in_structure", "Males_in_Household",
            "Females_in_Household", "Total_Households", "Household_Population",
            "First_Head_Name", "Add_Head_Name", "Multipurpose_Residential_Building",
            "Structure_Type_Categorisation", "Structure_Institution_Occupied", "Add_Structure_Occupied",
        ];
        let poi = [
            "Multipurpose_Residential_Building", "Multipurpose_Religious_Building",
            "Multipurpose_Institutional_Building", "Multipurpose_Commercial_Building",
            "Residential_Building", "Specify_Other_Residential", "Religious_Building",
            "Specify_Other_Religious_Structures", "Institutional_Building",
            "Specify_Other_Institutional_Building", "Educational_Building",
            "Commercial_Building", "Specify_Other_Commercial_Buildings",
            "Health_Facility_Hospital_Health_Center", "Ownership_of_Institution",
            "Status_of_the_Institution", "Structure_Name",
        ];

        Self {
            household_rules: HouseholdRules::default(),
            poi_rules: PoiRules::default(),
            household_columns: location.iter().chain(&household).map(|s| s.to_string()).collect(),
            poi_columns: location.iter().chain(&poi).map(|s| s.to_string()).collect(),
        }
    }
}

/// Row counts from one extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub records: usize,
    pub dropped_missing_coordinates: usize,
    pub households: usize,
    pub pois: usize,
}

/// Read a merged survey CSV, reconcile and drop coordinates, label each
/// structure by the rule cascade, and write `HH.csv` and `POI.csv` to `out_dir`.
/// A structure may land in both files.
pub fn extract_structures(input: &Path, out_dir: &Path, fixes: &[CoordinateFix], config: &ExtractConfig) -> Result<ExtractReport> {
    let mut df = read_csv(input)?;
    let records = df.height();

    reconcile_coordinates(&mut df, "listing", fixes)?;
    let (mut df, dropped_missing_coordinates) = drop_missing_coordinates(&df, "listing", fixes)?;

    label_structures(&mut df, "listing", &config.household_rules, &config.poi_rules)?;
    let is_household = df.column("Is_Household")?.i32()?.into_iter().map(|v| v == Some(1)).collect::<Vec<_>>();
    let is_poi = df.column("Is_POI")?.i32()?.into_iter().map(|v| v == Some(1)).collect::<Vec<_>>();

    let no_renames = Default::default();
    let mut households = select_and_rename(&filter_rows(&df, &is_household)?, "households", &config.household_columns, &no_renames)?;
    let mut pois = select_and_rename(&filter_rows(&df, &is_poi)?, "POIs", &config.poi_columns, &no_renames)?;

    ensure_dir_exists(out_dir)?;
    write_csv(&mut households, &out_dir.join("HH.csv"))?;
    write_csv(&mut pois, &out_dir.join("POI.csv"))?;
    info!("[listing] extracted {} households and {} POIs from {records} records", households.height(), pois.height());

    Ok(ExtractReport {
        records,
        dropped_missing_coordinates,
        households: households.height(),
        pois: pois.height(),
    })
}
