use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::BoundaryConfig,
    geom::Crs,
    listing::{CoordinateFix, ExtractConfig, SplitConfig},
    survey::SurveyConfig,
};

/// Every tunable of a processing run. Missing JSON fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingParams {
    /// Coordinate columns filled from a fallback before rows are dropped.
    pub coordinate_fixes: Vec<CoordinateFix>,
    pub split: SplitConfig,
    pub extract: ExtractConfig,
    /// Ward identifier column of the split tables.
    pub ward_col: String,
    pub lon_col: String,
    pub lat_col: String,
    /// Reproject ward point files to this CRS when writing them.
    pub project_points: Option<Crs>,
    pub boundary: BoundaryConfig,
    /// Population and household columns on province-level point files.
    pub province_population_source: String,
    pub province_households_source: String,
    pub survey: SurveyConfig,
}

impl Default for ProcessingParams {
    fn default() -> Self {
        Self {
            coordinate_fixes: vec![
                CoordinateFix::new("GPSLocation__Longitude", "GeoLocation_Longitude"),
                CoordinateFix::new("GPSLocation__Latitude", "GeoLocation_Latitude"),
            ],
            split: SplitConfig::default(),
            extract: ExtractConfig::default(),
            ward_col: "WARD".into(),
            lon_col: "Longitude".into(),
            lat_col: "Latitude".into(),
            project_points: None,
            boundary: BoundaryConfig::default(),
            province_population_source: "Household_Population".into(),
            province_households_source: "Total_Households".into(),
            survey: SurveyConfig::default(),
        }
    }
}

impl ProcessingParams {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("[config] Failed to read {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("[config] Invalid parameters in {}", path.display()))
    }

    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)
            .with_context(|| format!("[config] Failed to write {}", path.display()))
    }

    /// Boundary settings for point files cut from province-level layers,
    /// whose population columns carry the survey names.
    pub fn province_boundary(&self) -> BoundaryConfig {
        BoundaryConfig {
            population_source: self.province_population_source.clone(),
            households_source: self.province_households_source.clone(),
            ..self.boundary.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_survive_json() {
        let params = ProcessingParams::default();
        let text = serde_json::to_string(&params).unwrap();
        assert_eq!(serde_json::from_str::<ProcessingParams>(&text).unwrap(), params);
        assert!(text.contains("\"EPSG:4326\""));
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let params: ProcessingParams = serde_json::from_str(r#"{
            "ward_col": "Ward_Name",
            "boundary": { "aggregation_key": "EA_CODE", "preferred_crs": "EPSG:32735" }
        }"#).unwrap();

        assert_eq!(params.ward_col, "Ward_Name");
        assert_eq!(params.boundary.aggregation_key, "EA_CODE");
        assert_eq!(params.boundary.preferred_crs, Crs::utm(35, false).unwrap());
        assert_eq!(params.boundary.boundary_stem, "EA_original_do_not_edit");
        assert_eq!(params.coordinate_fixes.len(), 2);
    }

    #[test]
    fn bad_crs_is_rejected() {
        let parsed = serde_json::from_str::<ProcessingParams>(r#"{ "project_points": "EPSG:3857" }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn province_boundary_reads_survey_columns() {
        let boundary = ProcessingParams::default().province_boundary();
        assert_eq!(boundary.population_source, "Household_Population");
        assert_eq!(boundary.population_col, "HHPop");
    }
}
