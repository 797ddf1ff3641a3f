//! Assembly of the tab-delimited survey exports into one listing table.
//!
//! The main questionnaire holds one row per interview. Household rosters,
//! housing units and additional structures are summarized per interview key
//! and merged onto it; every summarized row must find its interview.

use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    aggregate::AggFunc,
    common::{has_column, parse_number, read_tab_delimited, require_columns, set_f64_column, str_values, write_csv},
    error::ProcessingError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    pub main_file: String,
    pub hh_roster_file: String,
    pub hh_units_file: String,
    pub add_roster_file: String,
    pub add_struct_file: String,
    /// Interview identifier shared by every export.
    pub key: String,
    /// Column order of the assembled table; absent columns are skipped.
    pub output_columns: Vec<String>,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            main_file: "Final.tab".into(),
            hh_roster_file: "HHROSTER.tab".into(),
            hh_units_file: "HOUSINGUNITS.tab".into(),
            add_roster_file: "ADDHHROSTER.tab".into(),
            add_struct_file: "ADDTIONSTRUCTURES.tab".into(),
            key: "interview__key".into(),
            output_columns: [
                "interview__key", "interview__id", "Cluster", "PROV", "DIST", "CONS", "WARD",
                "REGION", "SEA", "LOCALITY", "Address", "GPSLocation__Latitude",
                "GPSLocation__Longitude", "GPSLocation__Accuracy", "GPSLocation__Altitude",
                "GPSLocation__Timestamp", "date", "GeoLocation_Latitude", "GeoLocation_Longitude",
                "GEOLOCATION", "Structure_Type_Categorisation", "Specify_Other_Type_Categorisation",
                "CBN", "Multipurpose_Residential_Building", "Multipurpose_Religious_Building",
                "Multipurpose_Institutional_Building", "Multipurpose_Commercial_Building",
                "Residential_Building", "Specify_Other_Residential", "Religious_Building",
                "Specify_Other_Religious_Structures", "Institutional_Building",
                "Specify_Other_Institutional_Building", "Educational_Building", "Commercial_Building",
                "Specify_Other_Commercial_Buildings", "Health_Facility_Hospital_Health_Center",
                "Ownership_of_Institution", "Status_of_the_Institution", "Structure_Name",
                "Structure_Institution_Occupied", "Add_Structure_Occupied", "Males_in_structure",
                "Females_in_structure", "Number_of_Housing_Units", "addtionalstructure",
                "ADDITION_NUM", "interview__status", "Structure_Category",
                "Institutional_Structure_Population", "Household_Category", "Males_in_Household",
                "Females_in_Household", "First_Head_Name", "Add_Head_Name", "Household_Population",
                "Total_Households", "Housing_Unit_Occupied",
            ].map(String::from).to_vec(),
        }
    }
}

const MAIN_RENAMES: [(&str, &str); 23] = [
    ("IMales", "Males_in_structure"),
    ("IFemales", "Females_in_structure"),
    ("NOHU", "Number_of_Housing_Units"),
    ("MULTI__1", "Multipurpose_Residential_Building"),
    ("MULTI__2", "Multipurpose_Religious_Building"),
    ("MULTI__3", "Multipurpose_Institutional_Building"),
    ("MULTI__4", "Multipurpose_Commercial_Building"),
    ("CATEGORY", "Structure_Type_Categorisation"),
    ("SCATEGORY", "Specify_Other_Type_Categorisation"),
    ("RESIDENTIAL", "Residential_Building"),
    ("SRESIDENTIAL", "Specify_Other_Residential"),
    ("RELIGIOUS", "Religious_Building"),
    ("SRELIGIOUS", "Specify_Other_Religious_Structures"),
    ("INSTITUTIONAL", "Institutional_Building"),
    ("SINSTITUTIONAL", "Specify_Other_Institutional_Building"),
    ("EDUCATIONAL", "Educational_Building"),
    ("COMMERCIAL", "Commercial_Building"),
    ("SCOMMERCIAL", "Specify_Other_Commercial_Buildings"),
    ("HEALTH", "Health_Facility_Hospital_Health_Center"),
    ("OWNERSHIP", "Ownership_of_Institution"),
    ("STATUS", "Status_of_the_Institution"),
    ("IName", "Structure_Name"),
    ("OCCUPANCY", "Structure_Institution_Occupied"),
];

const MAIN_DROPPED: [&str; 6] = ["rand_sys", "Comment", "Comments", "sssys_irnd", "has__errors", "assignment__id"];
const ROSTER_DROPPED: [&str; 4] = ["HPhone", "Own", "NUMBEROFFARMS", "NoFarmsA5ha"];

/// Split `"lon,lat"` geolocation text into (longitude, latitude).
pub fn parse_geolocation(text: &str) -> (Option<f64>, Option<f64>) {
    let mut parts = text.split(',');
    let lon = parts.next().and_then(parse_number);
    let lat = parts.next().and_then(parse_number);
    (lon, lat)
}

fn rename_present(df: &mut DataFrame, renames: &[(&str, &str)]) -> Result<()> {
    for &(from, to) in renames {
        if has_column(df, from) {
            df.rename(from, to.into())?;
        }
    }
    Ok(())
}

fn drop_present(df: DataFrame, names: &[&str]) -> DataFrame {
    df.drop_many(names.iter().copied().filter(|&n| has_column(&df, n)).collect::<Vec<_>>())
}

fn add_constant(df: &mut DataFrame, name: &str, value: &str) -> Result<()> {
    df.with_column(Column::new(name.into(), vec![value; df.height()]))?;
    Ok(())
}

/// Add `GeoLocation_Longitude`/`GeoLocation_Latitude` parsed from `source`.
fn add_geolocation(df: &mut DataFrame, table: &str, source: &str) -> Result<()> {
    let (lons, lats): (Vec<_>, Vec<_>) = str_values(df, table, source)?.into_iter()
        .map(|text| text.as_deref().map_or((None, None), parse_geolocation))
        .unzip();
    set_f64_column(df, "GeoLocation_Longitude", lons)?;
    set_f64_column(df, "GeoLocation_Latitude", lats)
}

/// `output = left + right`, nulls propagating.
fn add_sum(df: DataFrame, table: &str, left: &str, right: &str, output: &str) -> Result<DataFrame> {
    require_columns(&df, table, &[left, right])?;
    Ok(df.lazy()
        .with_column((col(left).cast(DataType::Float64) + col(right).cast(DataType::Float64)).alias(output))
        .collect()?)
}

/// Group rows by `key` and aggregate each listed column.
pub fn summarize_by_key(df: &DataFrame, table: &str, key: &str, aggs: &[(&str, AggFunc)]) -> Result<DataFrame> {
    require_columns(df, table, &[key])?;
    require_columns(df, table, &aggs.iter().map(|(name, _)| *name).collect::<Vec<_>>())?;
    Ok(df.clone().lazy()
        .group_by([col(key)])
        .agg(aggs.iter().map(|&(name, func)| func.expr(name)).collect::<Vec<_>>())
        .collect()?)
}

/// Left-join `right` onto `left` by `key`, requiring every `right` row to find
/// a match. Columns of `right` that `left` already has are not brought over.
pub fn merge_with_match_assertion(
    left: &DataFrame,
    left_name: &str,
    right: &DataFrame,
    right_name: &str,
    key: &str,
) -> Result<DataFrame> {
    require_columns(left, left_name, &[key])?;
    require_columns(right, right_name, &[key])?;

    let shared = right.get_column_names().into_iter()
        .filter(|name| name.as_str() != key && has_column(left, name))
        .map(|name| name.as_str())
        .collect::<Vec<_>>();
    let mut right = right.drop_many(shared);
    right.with_column(Column::new("__matched".into(), vec![true; right.height()]))?;

    let merged = left.clone().lazy()
        .left_join(right.clone().lazy(), col(key), col(key))
        .collect()?;
    let matched = merged.height() - merged.column("__matched")?.null_count();

    if matched != right.height() {
        return Err(ProcessingError::JoinAssertion {
            left: left_name.to_string(),
            right: right_name.to_string(),
            matched,
            expected: right.height(),
        }.into())
    }

    Ok(merged.drop("__matched")?)
}

/// Stack `bottom` under `top`, adding null columns for names either side
/// lacks. Shared columns take `top`'s dtype.
pub fn append_rows(top: &DataFrame, bottom: &DataFrame) -> Result<DataFrame> {
    let mut names = top.get_column_names().into_iter().cloned().collect::<Vec<_>>();
    for name in bottom.get_column_names() {
        if !names.contains(name) { names.push(name.clone()); }
    }

    let align = |df: &DataFrame| -> Result<DataFrame> {
        let columns = names.iter()
            .map(|name| {
                let dtype = top.column(name).or_else(|_| bottom.column(name))?.dtype().clone();
                match df.column(name) {
                    Ok(column) if column.dtype() == &dtype => Ok(column.clone()),
                    Ok(column) => Ok(column.cast(&dtype)?),
                    Err(_) => Ok(Column::full_null(name.clone(), df.height(), &dtype)),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(DataFrame::new(columns)?)
    };

    let mut stacked = align(top)?;
    stacked.vstack_mut(&align(bottom)?)?;
    Ok(stacked)
}

/// Row counts from one assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurveyReport {
    pub interviews: usize,
    pub additional_structures: usize,
    pub rows: usize,
}

fn read_export(dir: &Path, file: &str) -> Result<DataFrame> {
    let path = dir.join(file);
    read_tab_delimited(&path).with_context(|| format!("[survey] reading export {}", path.display()))
}

/// Merge the five exports in `dir` into one listing table.
pub fn assemble_listing(dir: &Path, config: &SurveyConfig) -> Result<(DataFrame, SurveyReport)> {
    let key = config.key.as_str();
    let mut main = drop_present(read_export(dir, &config.main_file)?, &MAIN_DROPPED);
    let mut hh_roster = drop_present(read_export(dir, &config.hh_roster_file)?, &ROSTER_DROPPED);
    let mut hh_units = read_export(dir, &config.hh_units_file)?;
    let mut add_roster = read_export(dir, &config.add_roster_file)?;
    let mut add_struct = read_export(dir, &config.add_struct_file)?;
    info!("[survey] main: {}, household roster: {}, housing units: {}",
        main.height(), hh_roster.height(), hh_units.height());

    add_constant(&mut main, "Structure_Category", "REG")?;
    add_geolocation(&mut main, "main", "GEOLOCATION")?;
    rename_present(&mut main, &MAIN_RENAMES)?;
    if has_column(&main, "GPSLocation__Timestamp") {
        let dates = str_values(&main, "main", "GPSLocation__Timestamp")?.into_iter()
            .map(|ts| ts.and_then(|ts| ts.split('T').next().map(str::to_string)))
            .collect::<Vec<_>>();
        main.with_column(Column::new("date".into(), dates))?;
    }
    let main = add_sum(main, "main", "Males_in_structure", "Females_in_structure", "Institutional_Structure_Population")?;

    rename_present(&mut hh_units, &[("NOHH", "Total_Households"), ("HUOS", "Housing_Unit_Occupied")])?;

    add_constant(&mut hh_roster, "Household_Category", "REG")?;
    rename_present(&mut hh_roster, &[
        ("HMales", "Males_in_Household"),
        ("HFemales", "Females_in_Household"),
        ("HName", "First_Head_Name"),
    ])?;

    add_constant(&mut add_roster, "Household_Category", "ADD")?;
    rename_present(&mut add_roster, &[
        ("addHMales", "Males_in_Household"),
        ("addHFemales", "Females_in_Household"),
        ("addHName", "Add_Head_Name"),
    ])?;

    add_constant(&mut add_struct, "Structure_Category", "ADD")?;
    rename_present(&mut add_struct, &[
        ("ADDITION_HH", "Total_Households"),
        ("AddtionOccupany", "Add_Structure_Occupied"),
    ])?;
    add_geolocation(&mut add_struct, "additional structures", "ADDTIONGEOLOCATION")?;

    use AggFunc::*;
    let hh_units = summarize_by_key(&hh_units, "housing units", key, &[
        ("Total_Households", Sum), ("Housing_Unit_Occupied", First),
    ])?;
    let hh_roster = summarize_by_key(&hh_roster, "household roster", key, &[
        ("Males_in_Household", Sum), ("Females_in_Household", Sum),
        ("interview__id", First), ("First_Head_Name", First), ("Household_Category", First),
    ])?;
    let add_roster = summarize_by_key(&add_roster, "additional household roster", key, &[
        ("Add_Head_Name", First), ("Males_in_Household", Sum),
        ("Females_in_Household", Sum), ("Household_Category", First),
    ])?;
    let add_struct = summarize_by_key(&add_struct, "additional structures", key, &[
        ("Total_Households", Sum), ("Add_Structure_Occupied", First), ("interview__id", First),
        ("GeoLocation_Latitude", Mean), ("GeoLocation_Longitude", Mean), ("Structure_Category", First),
    ])?;

    let hh_roster = add_sum(hh_roster, "household roster", "Males_in_Household", "Females_in_Household", "Household_Population")?;
    let add_roster = add_sum(add_roster, "additional household roster", "Males_in_Household", "Females_in_Household", "Household_Population")?;

    let households = merge_with_match_assertion(&main, "main", &hh_roster, "household roster", key)?;
    let households = merge_with_match_assertion(&households, "main", &hh_units, "housing units", key)?;
    let additional = merge_with_match_assertion(&add_struct, "additional structures", &add_roster, "additional household roster", key)?;

    let combined = append_rows(&households, &additional)?;
    let (present, missing): (Vec<_>, Vec<_>) = config.output_columns.iter()
        .partition(|name| has_column(&combined, name));
    if !missing.is_empty() {
        warn!("[survey] columns not found in the exports: {missing:?}");
    }
    let combined = combined.select(present.iter().map(|name| name.as_str()))?;

    let report = SurveyReport {
        interviews: households.height(),
        additional_structures: additional.height(),
        rows: combined.height(),
    };
    info!("[survey] assembled {} rows ({} interviews, {} additional structures)",
        report.rows, report.interviews, report.additional_structures);
    Ok((combined, report))
}

/// [`assemble_listing`], written to `out_csv`.
pub fn assemble_and_save(dir: &Path, out_csv: &Path, config: &SurveyConfig) -> Result<SurveyReport> {
    let (mut combined, report) = assemble_listing(dir, config)?;
    write_csv(&mut combined, out_csv)?;
    Ok(report)
}
