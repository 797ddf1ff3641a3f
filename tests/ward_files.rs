use std::{fs, path::Path};

use geo::{MultiPolygon, Point, Rect, coord};
use listing_processor::{
    BoundaryConfig, BoundarySources, Crs, DiskWards, DistrictProcessor, IndelRatio, PointLayer,
    PolygonLayer, ProcessingParams, WardStatus, partition_by_ward, read_csv, update_boundary_file,
    write_csv,
};
use polars::prelude::*;

fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![Rect::new(coord! { x: x0, y: y0 }, coord! { x: x0 + size, y: y0 + size }).to_polygon()])
}

fn f64_at(df: &DataFrame, name: &str, row: usize) -> Option<f64> {
    df.column(name).unwrap().cast(&DataType::Float64).unwrap().f64().unwrap().get(row)
}

/// One EA boundary and one building centroid per ward directory.
fn write_ward_geometry(ward_dir: &Path, geoid: &str, x0: f64, boundary_crs: Crs) {
    fs::create_dir_all(ward_dir).unwrap();
    let config = BoundaryConfig::default();

    let boundary = PolygonLayer::new(df!["GEOID" => [geoid]].unwrap(), vec![square(x0, -14.5, 0.1)], Crs::WGS84)
        .unwrap()
        .to_crs(boundary_crs)
        .unwrap();
    boundary.write_shapefile(&config.boundary_path(ward_dir)).unwrap();

    PointLayer::new(df!["id" => [1i64]].unwrap(), vec![Point::new(x0 + 0.05, -14.45)], Crs::WGS84)
        .unwrap()
        .write_shapefile(&config.buildings_path(ward_dir))
        .unwrap();
}

#[test]
fn wards_are_written_as_directories() {
    let dir = tempfile::tempdir().unwrap();
    for ward in ["Bwacha", "Chimwemwe", "Kasanda"] {
        fs::create_dir(dir.path().join(ward)).unwrap();
    }

    let df = df![
        "WARD" => ["BWACHA", "bwacha", "Chimwenwe", "Kasanda Ward"],
        "HHPop" => [3i64, 4, 5, 6],
    ].unwrap();

    let mut wards = DiskWards::new(dir.path());
    let report = partition_by_ward(&df, "WARD", "HH", &mut wards, &IndelRatio).unwrap();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.assignments.len(), 3);

    let bwacha = read_csv(&dir.path().join("Bwacha/HH.csv")).unwrap();
    assert_eq!(bwacha.height(), 2);
    let chimwemwe = read_csv(&dir.path().join("Chimwemwe/HH.csv")).unwrap();
    assert_eq!(f64_at(&chimwemwe, "HHPop", 0), Some(5.0));
    let kasanda = read_csv(&dir.path().join("Kasanda/HH.csv")).unwrap();
    assert_eq!(f64_at(&kasanda, "HHPop", 0), Some(6.0));
}

#[test]
fn shapefiles_keep_attributes_and_crs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("EA.shp");
    let utm = Crs::utm(35, false).unwrap();

    let layer = PolygonLayer::new(
        df![
            "GEOID" => ["A", "B"],
            "StructCntHHs" => [2i64, 0],
            "HHPop" => [7.5, 1.0],
        ].unwrap(),
        vec![square(500_000.0, 8_400_000.0, 100.0), square(500_100.0, 8_400_000.0, 100.0)],
        utm,
    ).unwrap();
    layer.write_shapefile(&path).unwrap();

    let read = PolygonLayer::read_shapefile(&path).unwrap();
    assert_eq!(read.crs(), utm);
    assert_eq!(read.len(), 2);
    assert_eq!(read.data().get_column_names(), vec!["GEOID", "StructCntH", "HHPop"]);
    assert_eq!(f64_at(read.data(), "StructCntH", 0), Some(2.0));
    assert_eq!(f64_at(read.data(), "HHPop", 0), Some(7.5));
    assert!(!read.containing(Point::new(500_050.0, 8_400_050.0)).is_empty());
}

#[test]
fn truncation_collisions_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let layer = PointLayer::new(
        df!["Household_Population" => [1.0], "Household_Count" => [1.0]].unwrap(),
        vec![Point::new(28.0, -14.0)],
        Crs::WGS84,
    ).unwrap();
    assert!(layer.write_shapefile(&dir.path().join("HH.shp")).is_err());
}

#[test]
fn long_text_is_cut_to_the_dbf_limit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("POI.shp");
    let long_name = "Chililalila Community School ".repeat(10);

    PointLayer::new(
        df!["StructName" => [long_name.as_str(), "Shop"], "StructType" => ["Church", "Shop"]].unwrap(),
        vec![Point::new(28.0, -14.0), Point::new(28.1, -14.1)],
        Crs::WGS84,
    ).unwrap().write_shapefile(&path).unwrap();

    let read = PointLayer::read_shapefile(&path).unwrap();
    assert_eq!(read.len(), 2);
    let names = read.data().column("StructName").unwrap().str().unwrap();
    assert_eq!(names.get(0), Some(long_name[..254].trim()));
    assert_eq!(names.get(1), Some("Shop"));
}

#[test]
fn boundary_update_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let ward_dir = dir.path().join("Bwacha");
    let utm = Crs::utm(35, false).unwrap();
    write_ward_geometry(&ward_dir, "B1", 28.0, utm);

    let config = BoundaryConfig::default();
    PointLayer::new(
        df!["HHPop" => [4.0, 3.0], "TotalHHs" => [1.0, 1.0]].unwrap(),
        vec![Point::new(28.02, -14.45), Point::new(28.07, -14.42)],
        Crs::WGS84,
    ).unwrap().write_shapefile(&config.households_path(&ward_dir)).unwrap();
    PointLayer::new(df!["StructType" => ["Shop"]].unwrap(), vec![Point::new(28.03, -14.48)], Crs::WGS84)
        .unwrap()
        .write_shapefile(&config.pois_path(&ward_dir))
        .unwrap();

    let (boundary, households, pois, buildings) = (
        config.boundary_path(&ward_dir),
        config.households_path(&ward_dir),
        config.pois_path(&ward_dir),
        config.buildings_path(&ward_dir),
    );
    let sources = BoundarySources { boundary: &boundary, households: &households, pois: &pois, buildings: &buildings };

    let first = update_boundary_file(&sources, &config).unwrap();
    assert_eq!(first.merged_units, 1);
    let columns = PolygonLayer::read_shapefile(&boundary).unwrap().data().get_column_names_owned();

    update_boundary_file(&sources, &config).unwrap();
    let updated = PolygonLayer::read_shapefile(&boundary).unwrap();
    assert_eq!(updated.data().get_column_names_owned(), columns);
    assert_eq!(updated.crs(), utm);

    let data = updated.data();
    assert_eq!(f64_at(data, "HHPop", 0), Some(7.0));
    assert_eq!(f64_at(data, "TotalHHs", 0), Some(2.0));
    assert_eq!(f64_at(data, "StructCntH", 0), Some(2.0));
    assert_eq!(f64_at(data, "StructCntP", 0), Some(1.0));
    assert_eq!(f64_at(data, "StructCntB", 0), Some(1.0));
    assert_eq!(f64_at(data, "TotalStruc", 0), Some(3.0));
}

/// Raw listing with every column the default split projects.
fn raw_listing(params: &ProcessingParams) -> DataFrame {
    let rows: [(&str, &str, &str, &str, &str); 6] = [
        // ward, category, GPS lon, GPS lat, household population
        ("BWACHA", "Residential Building", "28.05", "-14.45", "4"),
        ("BWACHA", "Residential Building", "", "", "3"),
        ("BWACHA", "Shop", "28.04", "-14.44", ""),
        ("Kasanda", "Residential Building", "28.25", "-14.45", "5"),
        ("Kasanda", "#NULL!", "28.26", "-14.44", ""),
        ("Kasanda", "Residential Building", "", "", "9"),
    ];
    let fallback: [(&str, &str); 6] = [
        ("", ""), ("28.06", "-14.46"), ("", ""), ("", ""), ("", ""), ("", ""),
    ];

    let mut names = params.split.dwelling_columns.clone();
    for name in &params.split.poi_columns {
        if !names.contains(name) { names.push(name.clone()); }
    }
    names.extend(["GeoLocation_Longitude".to_string(), "GeoLocation_Latitude".to_string()]);

    let columns = names.iter().map(|name| {
        let values = rows.iter().zip(&fallback).map(|(&(ward, category, lon, lat, pop), &(geo_lon, geo_lat))| {
            match name.as_str() {
                "WARD" => ward,
                "Structure_type_categorisation" => category,
                "GPSLocation__Longitude" => lon,
                "GPSLocation__Latitude" => lat,
                "GeoLocation_Longitude" => geo_lon,
                "GeoLocation_Latitude" => geo_lat,
                "Household_Population" => pop,
                "Total_Households" => "1",
                _ => "x",
            }
        }).collect::<Vec<_>>();
        Column::new(name.as_str().into(), values)
    }).collect::<Vec<_>>();

    DataFrame::new(columns).unwrap()
}

#[test]
fn district_run_updates_every_ward() {
    let dir = tempfile::tempdir().unwrap();
    let district_dir = dir.path().join("Kabwe");
    write_ward_geometry(&district_dir.join("Bwacha"), "B1", 28.0, Crs::WGS84);
    write_ward_geometry(&district_dir.join("Kasanda"), "K1", 28.2, Crs::WGS84);

    let params = ProcessingParams::default();
    let raw_csv = dir.path().join("raw.csv");
    write_csv(&mut raw_listing(&params), &raw_csv).unwrap();

    let processor = DistrictProcessor::new(&raw_csv, &district_dir, &params);
    let report = processor.run().unwrap();

    assert_eq!(report.records, 6);
    assert_eq!(report.dropped_missing_coordinates, 1);
    assert_eq!((report.dwellings, report.pois), (3, 2));
    assert!(processor.dwellings_path().exists());
    assert!(processor.pois_path().exists());
    assert!(report.point_files.failures.is_empty(), "{:?}", report.point_files.failures);
    assert_eq!(report.updated_wards(), 2, "{:?}", report.wards);

    let bwacha = PolygonLayer::read_shapefile(&params.boundary.boundary_path(&district_dir.join("Bwacha"))).unwrap();
    assert_eq!(f64_at(bwacha.data(), "HHPop", 0), Some(7.0));
    assert_eq!(f64_at(bwacha.data(), "StructCntP", 0), Some(1.0));

    let kasanda = &report.wards[1];
    assert_eq!(kasanda.ward, "Kasanda");
    match &kasanda.status {
        WardStatus::Updated(merge) => assert_eq!(merge.merged_units, 1),
        WardStatus::Failed(reason) => panic!("Kasanda failed: {reason}"),
    }
}

#[test]
fn a_broken_ward_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let district_dir = dir.path().join("Kabwe");
    write_ward_geometry(&district_dir.join("Bwacha"), "B1", 28.0, Crs::WGS84);
    write_ward_geometry(&district_dir.join("Kasanda"), "K1", 28.2, Crs::WGS84);
    fs::remove_file(district_dir.join("Kasanda/building_centroids.shp")).unwrap();

    let params = ProcessingParams::default();
    let raw_csv = dir.path().join("raw.csv");
    write_csv(&mut raw_listing(&params), &raw_csv).unwrap();

    let report = DistrictProcessor::new(&raw_csv, &district_dir, &params).run().unwrap();
    assert_eq!(report.wards.len(), 2);
    assert!(report.wards[0].is_updated());
    assert!(!report.wards[1].is_updated());
}
