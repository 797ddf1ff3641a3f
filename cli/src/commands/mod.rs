pub mod extract;
pub mod ingest;
pub mod params;
pub mod process;
pub mod update_wards;
