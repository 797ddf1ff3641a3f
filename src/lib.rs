#![doc = "Household listing processor public API"]
mod aggregate;
mod common;
mod config;
mod error;
mod geom;
mod layer;
mod listing;
mod pipeline;
mod survey;
mod ward;

#[doc(inline)]
pub use config::ProcessingParams;

#[doc(inline)]
pub use error::ProcessingError;

#[doc(inline)]
pub use geom::Crs;

#[doc(inline)]
pub use common::{read_csv, read_tab_delimited, write_csv};

#[doc(inline)]
pub use layer::{PointLayer, PolygonLayer};

#[doc(inline)]
pub use listing::{
    CoordinateFix, ExtractConfig, ExtractReport, HouseholdRules, PoiRules, SplitConfig, SplitOutcome,
    drop_missing_coordinates, extract_structures, label_structures, reconcile_coordinates,
    split_and_save, split_dwellings_and_pois,
};

#[doc(inline)]
pub use ward::{
    DiskWards, IndelRatio, MemWards, PartitionReport, SimilarityStrategy, WardAssignment, WardInventory,
    best_match, partition_by_ward,
};

#[doc(inline)]
pub use aggregate::{
    AggColumn, AggFunc, AggregationSpec, BoundaryConfig, BoundarySources, MergeReport,
    aggregate_points, merge_boundary_attributes, update_boundary_file,
};

#[doc(inline)]
pub use survey::{SurveyConfig, SurveyReport, assemble_and_save, assemble_listing};

#[doc(inline)]
pub use pipeline::{
    DistrictProcessor, DistrictReport, PointFilesReport, ProvinceReport, WardOutcome, WardStatus,
    create_ward_point_files, update_wards_from_points,
};
