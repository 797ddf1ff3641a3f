use std::{collections::BTreeMap, path::Path};

use ahash::AHashSet;
use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    common::{f64_values, filter_rows, require_columns, str_values, write_csv},
    error::ProcessingError,
};

/// How a listing table is cut into dwellings and POIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Structure type column, holding category text.
    pub category_col: String,
    /// Category value that marks a dwelling.
    pub residential_value: String,
    /// Placeholder some exports write for a missing category.
    pub null_token: String,
    /// What the placeholder becomes.
    pub null_replacement: String,
    pub dwelling_columns: Vec<String>,
    pub dwelling_renames: BTreeMap<String, String>,
    pub poi_columns: Vec<String>,
    pub poi_renames: BTreeMap<String, String>,
    /// Coordinate columns after renaming, used for deduplication.
    pub latitude_col: String,
    pub longitude_col: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn renames(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(from, to)| (from.to_string(), to.to_string())).collect()
}

const SHARED_COLUMNS: [&str; 13] = [
    "PROV", "DIST", "CONS", "WARD", "REGION", "SEA", "LOCALITY",
    "GPSLocation__Latitude", "GPSLocation__Longitude",
    "GPSLocation__Altitude", "GPSLocation__Timestamp",
    "Structure_type_categorisation", "Structure_Name",
];

const SHARED_RENAMES: [(&str, &str); 7] = [
    ("GPSLocation__Latitude", "Latitude"),
    ("GPSLocation__Longitude", "Longitude"),
    ("GPSLocation__Altitude", "Altitude"),
    ("GPSLocation__Timestamp", "TimeStamp"),
    ("Structure_type_categorisation", "StructType"),
    ("Structure_Name", "StructName"),
    ("Structure_Institution_occupied", "StructInstOccup"),
];

impl Default for SplitConfig {
    fn default() -> Self {
        let mut dwelling_columns = strings(&SHARED_COLUMNS);
        dwelling_columns.extend(strings(&[
            "Males_in_structure", "Females_in_structure", "Number_of_Housing_Units",
            "Total_Households", "First_Head_Name", "Males_in_Household",
            "Females_in_Household", "Household_Population",
        ]));

        let mut poi_columns = strings(&SHARED_COLUMNS);
        poi_columns.extend(strings(&[
            "Multipurpose_Residential_Building", "Multipurpose_Religious_Building",
            "Multipurpose_Institutional_Building", "Multipurpose_Commercial_Building",
            "Religious_Building", "Institutional_Building", "Educational_Building",
            "Commercial_Building", "Health_Facility_Hospital_Health_Center",
            "Ownership_of_Institution", "Status_of_the_Institution",
        ]));

        let mut dwelling_renames = renames(&SHARED_RENAMES);
        dwelling_renames.extend(renames(&[
            ("Males_in_structure", "StructMales"),
            ("Females_in_structure", "StructFemales"),
            ("Number_of_Housing_Units", "NumHHUnits"),
            ("Total_Households", "TotalHHs"),
            ("First_Head_Name", "HeadName"),
            ("Males_in_Household", "HHMales"),
            ("Females_in_Household", "HHFemales"),
            ("Household_Population", "HHPop"),
        ]));

        let mut poi_renames = renames(&SHARED_RENAMES);
        poi_renames.extend(renames(&[
            ("Multipurpose_Residential_Building", "MultResBld"),
            ("Multipurpose_Religious_Building", "MultReligBld"),
            ("Multipurpose_Institutional_Building", "MultInstBld"),
            ("Multipurpose_Commercial_Building", "MultCommBld"),
            ("Religious_Building", "ReligBld"),
            ("Institutional_Building", "InstBld"),
            ("Educational_Building", "EducBld"),
            ("Commercial_Building", "CommBld"),
            ("Health_Facility_Hospital_Health_Center", "HealthFacTyp"),
            ("Ownership_of_Institution", "OwnershipInst"),
            ("Status_of_the_Institution", "StatusInst"),
        ]));

        Self {
            category_col: "Structure_type_categorisation".into(),
            residential_value: "Residential Building".into(),
            null_token: "#NULL!".into(),
            null_replacement: "missing".into(),
            dwelling_columns,
            dwelling_renames,
            poi_columns,
            poi_renames,
            latitude_col: "Latitude".into(),
            longitude_col: "Longitude".into(),
        }
    }
}

/// Result of one split: both tables plus what was dropped or found wrong.
#[derive(Debug)]
pub struct SplitOutcome {
    pub dwellings: DataFrame,
    pub pois: DataFrame,
    pub dwelling_duplicates: usize,
    pub poi_duplicates: usize,
    /// Category purity problems found in either table. Reported, not raised.
    pub purity_violations: Vec<ProcessingError>,
}

/// Partition predicate for the dwelling/POI split: exact equality with the
/// residential category. Missing categories are never residential.
#[inline]
pub fn is_residential(category: Option<&str>, residential_value: &str) -> bool {
    category == Some(residential_value)
}

/// Keep `columns` (in that order) and apply the renames whose source is kept.
pub fn select_and_rename(df: &DataFrame, table: &str, columns: &[String], renames: &BTreeMap<String, String>) -> Result<DataFrame> {
    require_columns(df, table, columns)?;
    let mut out = df.select(columns.iter().map(String::as_str))?;
    for column in columns {
        if let Some(new_name) = renames.get(column) {
            out.rename(column, new_name.as_str().into())?;
        }
    }
    Ok(out)
}

/// Drop rows repeating an earlier (latitude, longitude) pair. Rows with a
/// missing coordinate compare equal to each other on that coordinate.
pub fn drop_duplicate_coordinates(df: &DataFrame, table: &str, lat: &str, lon: &str) -> Result<(DataFrame, usize)> {
    // -0.0 and 0.0 are the same position
    let key = |v: Option<f64>| v.map(|v| (v + 0.0).to_bits());
    let lats = f64_values(df, table, lat)?;
    let lons = f64_values(df, table, lon)?;

    let mut seen = AHashSet::with_capacity(df.height());
    let keep = lats.into_iter().zip(lons)
        .map(|(la, lo)| seen.insert((key(la), key(lo))))
        .collect::<Vec<_>>();

    let kept = filter_rows(df, &keep)?;
    let dropped = df.height() - kept.height();
    Ok((kept, dropped))
}

fn distinct_categories(df: &DataFrame, table: &str, column: &str) -> Result<Vec<String>> {
    let mut found = Vec::new();
    for value in str_values(df, table, column)? {
        let value = value.unwrap_or_else(|| "null".to_string());
        if !found.contains(&value) { found.push(value); }
    }
    Ok(found)
}

/// Dwellings must hold exactly the residential category and POIs must not
/// hold it at all. An empty dwelling table passes.
pub fn check_category_purity(
    dwellings: &DataFrame,
    dwelling_col: &str,
    pois: &DataFrame,
    poi_col: &str,
    residential_value: &str,
) -> Result<Vec<ProcessingError>> {
    let mut violations = Vec::new();

    let found = distinct_categories(dwellings, "dwellings", dwelling_col)?;
    if dwellings.height() > 0 && found != [residential_value] {
        violations.push(ProcessingError::CategoryPurity {
            table: "dwellings".into(),
            found,
            expected: residential_value.to_string(),
        });
    }

    let found = distinct_categories(pois, "POIs", poi_col)?;
    if found.iter().any(|c| c == residential_value) {
        violations.push(ProcessingError::CategoryPurity {
            table: "POIs".into(),
            found,
            expected: format!("anything but {residential_value}"),
        });
    }

    Ok(violations)
}

/// Split a reconciled listing table into dwellings (category equal to the
/// residential value) and POIs (everything else), projected, renamed and
/// deduplicated by coordinate pair.
pub fn split_dwellings_and_pois(df: &DataFrame, config: &SplitConfig) -> Result<SplitOutcome> {
    require_columns(df, "listing", &[&config.category_col])?;

    let categories = str_values(df, "listing", &config.category_col)?.into_iter()
        .map(|value| value.map(|v| if v == config.null_token { config.null_replacement.clone() } else { v }))
        .collect::<Vec<_>>();
    let residential = categories.iter()
        .map(|c| is_residential(c.as_deref(), &config.residential_value))
        .collect::<Vec<_>>();
    let non_residential = residential.iter().map(|r| !r).collect::<Vec<_>>();

    let mut cleaned = df.clone();
    cleaned.with_column(Column::new(config.category_col.as_str().into(), categories))?;

    let dwellings = select_and_rename(&filter_rows(&cleaned, &residential)?, "dwellings", &config.dwelling_columns, &config.dwelling_renames)?;
    let pois = select_and_rename(&filter_rows(&cleaned, &non_residential)?, "POIs", &config.poi_columns, &config.poi_renames)?;

    let (dwellings, dwelling_duplicates) = drop_duplicate_coordinates(&dwellings, "dwellings", &config.latitude_col, &config.longitude_col)?;
    let (pois, poi_duplicates) = drop_duplicate_coordinates(&pois, "POIs", &config.latitude_col, &config.longitude_col)?;
    info!("[listing] {} dwellings ({dwelling_duplicates} duplicate coordinates dropped), {} POIs ({poi_duplicates} dropped)",
        dwellings.height(), pois.height());

    let purity_violations = check_category_purity(
        &dwellings,
        config.dwelling_renames.get(&config.category_col).unwrap_or(&config.category_col),
        &pois,
        config.poi_renames.get(&config.category_col).unwrap_or(&config.category_col),
        &config.residential_value,
    )?;
    for violation in &purity_violations {
        warn!("[listing] {violation}");
    }

    Ok(SplitOutcome { dwellings, pois, dwelling_duplicates, poi_duplicates, purity_violations })
}

/// [`split_dwellings_and_pois`], then write both tables as CSV.
pub fn split_and_save(df: &DataFrame, config: &SplitConfig, dwelling_path: &Path, poi_path: &Path) -> Result<SplitOutcome> {
    let mut outcome = split_dwellings_and_pois(df, config)?;
    write_csv(&mut outcome.dwellings, dwelling_path)?;
    write_csv(&mut outcome.pois, poi_path)?;
    Ok(outcome)
}
