use std::{fs, path::Path};

use listing_processor::{ProcessingError, SurveyConfig, assemble_and_save, assemble_listing, read_csv};
use polars::prelude::*;

fn write_tab(dir: &Path, name: &str, rows: &[&[&str]]) {
    let text = rows.iter().map(|row| row.join("\t")).collect::<Vec<_>>().join("\n");
    fs::write(dir.join(name), text + "\n").unwrap();
}

fn write_exports(dir: &Path, roster_keys: [&str; 2]) {
    write_tab(dir, "Final.tab", &[
        &["interview__key", "interview__id", "WARD", "GEOLOCATION", "GPSLocation__Latitude", "GPSLocation__Longitude",
          "GPSLocation__Timestamp", "CATEGORY", "IMales", "IFemales", "assignment__id"],
        &["k1", "i1", "Bwacha", "28.1,-14.4", "-14.4", "28.1", "2023-05-01T10:00:00", "Residential Building", "0", "0", "a1"],
        &["k2", "i2", "Bwacha", "28.3,-14.6", "-14.6", "28.3", "2023-05-02T11:30:00", "Shop", "2", "1", "a2"],
    ]);
    write_tab(dir, "HHROSTER.tab", &[
        &["interview__key", "interview__id", "HMales", "HFemales", "HName", "HPhone"],
        &[roster_keys[0], "i1", "2", "1", "Ana", "0977"],
        &[roster_keys[1], "i1", "1", "1", "Ben", "0966"],
    ]);
    write_tab(dir, "HOUSINGUNITS.tab", &[
        &["interview__key", "NOHH", "HUOS"],
        &["k1", "1", "1"],
        &["k2", "2", "1"],
    ]);
    write_tab(dir, "ADDHHROSTER.tab", &[
        &["interview__key", "addHMales", "addHFemales", "addHName"],
        &["k1", "1", "2", "Zed"],
    ]);
    write_tab(dir, "ADDTIONSTRUCTURES.tab", &[
        &["interview__key", "interview__id", "ADDITION_HH", "AddtionOccupany", "ADDTIONGEOLOCATION"],
        &["k1", "i1", "1", "1", "28.2,-14.5"],
    ]);
}

fn f64_at(df: &DataFrame, name: &str, row: usize) -> Option<f64> {
    df.column(name).unwrap().cast(&DataType::Float64).unwrap().f64().unwrap().get(row)
}

fn str_at(df: &DataFrame, name: &str, row: usize) -> Option<String> {
    df.column(name).unwrap().cast(&DataType::String).unwrap().str().unwrap().get(row).map(str::to_string)
}

#[test]
fn exports_merge_into_one_listing() {
    let dir = tempfile::tempdir().unwrap();
    write_exports(dir.path(), ["k1", "k1"]);

    let (listing, report) = assemble_listing(dir.path(), &SurveyConfig::default()).unwrap();
    assert_eq!((report.interviews, report.additional_structures, report.rows), (2, 1, 3));

    assert!(listing.column("assignment__id").is_err());
    assert_eq!(str_at(&listing, "Structure_Type_Categorisation", 0).as_deref(), Some("Residential Building"));
    assert_eq!(str_at(&listing, "date", 1).as_deref(), Some("2023-05-02"));
    assert_eq!(f64_at(&listing, "GeoLocation_Longitude", 0), Some(28.1));

    assert_eq!(f64_at(&listing, "Household_Population", 0), Some(5.0));
    assert_eq!(str_at(&listing, "First_Head_Name", 0).as_deref(), Some("Ana"));
    assert_eq!(f64_at(&listing, "Institutional_Structure_Population", 1), Some(3.0));
    assert_eq!(f64_at(&listing, "Total_Households", 1), Some(2.0));

    // appended additional structure
    assert_eq!(str_at(&listing, "Structure_Category", 2).as_deref(), Some("ADD"));
    assert_eq!(str_at(&listing, "Household_Category", 2).as_deref(), Some("ADD"));
    assert_eq!(f64_at(&listing, "Household_Population", 2), Some(3.0));
    assert_eq!(f64_at(&listing, "GeoLocation_Latitude", 2), Some(-14.5));
    assert_eq!(str_at(&listing, "WARD", 2), None);
}

#[test]
fn orphan_roster_rows_fail_the_assembly() {
    let dir = tempfile::tempdir().unwrap();
    write_exports(dir.path(), ["k1", "k9"]);

    let err = assemble_listing(dir.path(), &SurveyConfig::default()).unwrap_err();
    match err.downcast_ref::<ProcessingError>() {
        Some(ProcessingError::JoinAssertion { matched, expected, .. }) => assert_eq!((*matched, *expected), (1, 2)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn assembled_listing_is_written() {
    let dir = tempfile::tempdir().unwrap();
    write_exports(dir.path(), ["k1", "k2"]);
    let out = dir.path().join("listing.csv");

    let report = assemble_and_save(dir.path(), &out, &SurveyConfig::default()).unwrap();
    let written = read_csv(&out).unwrap();
    assert_eq!(written.height(), report.rows);
    assert_eq!(written.get_column_names()[0].as_str(), "interview__key");
}
