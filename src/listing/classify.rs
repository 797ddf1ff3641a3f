//! Rule-cascade labelling of structure records.
//!
//! This is the labelling used for household/POI extraction. The dwelling/POI
//! split in [`super::split`] partitions on the structure-type text instead and
//! the two must not be merged: a record can be both household and POI here.

use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::common::f64_values;

/// Column names consulted by [`is_household`], in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseholdRules {
    pub multipurpose_residential: String,
    pub category: String,
    pub institution_occupied: String,
    pub add_structure_occupied: String,
    pub total_households: String,
    pub household_population: String,
}

impl Default for HouseholdRules {
    fn default() -> Self {
        Self {
            multipurpose_residential: "Multipurpose_Residential_Building".into(),
            category: "Structure_Type_Categorisation".into(),
            institution_occupied: "Structure_Institution_Occupied".into(),
            add_structure_occupied: "Add_Structure_Occupied".into(),
            total_households: "Total_Households".into(),
            household_population: "Household_Population".into(),
        }
    }
}

/// Column names consulted by [`is_poi`], in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoiRules {
    pub category: String,
    /// Non-residential building type flags, any of which marks a POI when >= 1.
    pub building_flags: Vec<String>,
    /// Multipurpose flags, any of which marks a POI when == 1.
    pub multipurpose_flags: Vec<String>,
}

impl Default for PoiRules {
    fn default() -> Self {
        Self {
            category: "Structure_Type_Categorisation".into(),
            building_flags: [
                "Institutional_Building",
                "Religious_Building",
                "Educational_Building",
                "Commercial_Building",
                "Health_Facility_Hospital_Health_Center",
            ].map(String::from).to_vec(),
            multipurpose_flags: [
                "Multipurpose_Religious_Building",
                "Multipurpose_Institutional_Building",
                "Multipurpose_Commercial_Building",
            ].map(String::from).to_vec(),
        }
    }
}

/// Household-relevant values of one record. `None` is a missing value and never fires a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HouseholdFlags {
    pub multipurpose_residential: Option<f64>,
    pub category: Option<f64>,
    pub institution_occupied: Option<f64>,
    pub add_structure_occupied: Option<f64>,
    pub total_households: Option<f64>,
    pub household_population: Option<f64>,
}

/// POI-relevant values of one record, flags in [`PoiRules`] order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoiFlags {
    pub category: Option<f64>,
    pub building_flags: Vec<Option<f64>>,
    pub multipurpose_flags: Vec<Option<f64>>,
}

#[inline]
fn equals_one(value: Option<f64>) -> bool { value == Some(1.0) }

#[inline]
fn at_least_one(value: Option<f64>) -> bool { value.is_some_and(|v| v >= 1.0) }

#[inline]
fn positive(value: Option<f64>) -> bool { value.is_some_and(|v| v > 0.0) }

/// First matching rule wins:
/// multipurpose residential, category 1, institution occupied,
/// additional structure occupied, then any households or population.
pub fn is_household(flags: &HouseholdFlags) -> bool {
    if equals_one(flags.multipurpose_residential) { return true }
    if equals_one(flags.category) { return true }
    if equals_one(flags.institution_occupied) { return true }
    if equals_one(flags.add_structure_occupied) { return true }
    positive(flags.total_households) || positive(flags.household_population)
}

/// First matching rule wins: category above 1, any building type flag,
/// then any multipurpose non-residential flag.
pub fn is_poi(flags: &PoiFlags) -> bool {
    if flags.category.is_some_and(|c| c > 1.0) { return true }
    if flags.building_flags.iter().any(|&v| at_least_one(v)) { return true }
    flags.multipurpose_flags.iter().any(|&v| equals_one(v))
}

/// Household label for every row of `df`.
pub fn label_households(df: &DataFrame, table: &str, rules: &HouseholdRules) -> Result<Vec<bool>> {
    let column = |name: &str| f64_values(df, table, name);
    let multipurpose_residential = column(&rules.multipurpose_residential)?;
    let category = column(&rules.category)?;
    let institution_occupied = column(&rules.institution_occupied)?;
    let add_structure_occupied = column(&rules.add_structure_occupied)?;
    let total_households = column(&rules.total_households)?;
    let household_population = column(&rules.household_population)?;

    Ok((0..df.height())
        .map(|i| is_household(&HouseholdFlags {
            multipurpose_residential: multipurpose_residential[i],
            category: category[i],
            institution_occupied: institution_occupied[i],
            add_structure_occupied: add_structure_occupied[i],
            total_households: total_households[i],
            household_population: household_population[i],
        }))
        .collect())
}

/// POI label for every row of `df`.
pub fn label_pois(df: &DataFrame, table: &str, rules: &PoiRules) -> Result<Vec<bool>> {
    let category = f64_values(df, table, &rules.category)?;
    let building = rules.building_flags.iter()
        .map(|name| f64_values(df, table, name))
        .collect::<Result<Vec<_>>>()?;
    let multipurpose = rules.multipurpose_flags.iter()
        .map(|name| f64_values(df, table, name))
        .collect::<Result<Vec<_>>>()?;

    Ok((0..df.height())
        .map(|i| is_poi(&PoiFlags {
            category: category[i],
            building_flags: building.iter().map(|column| column[i]).collect(),
            multipurpose_flags: multipurpose.iter().map(|column| column[i]).collect(),
        }))
        .collect())
}

/// Attach `Is_Household` and `Is_POI` (0/1) columns.
pub fn label_structures(df: &mut DataFrame, table: &str, households: &HouseholdRules, pois: &PoiRules) -> Result<()> {
    let as_flag = |labels: Vec<bool>| labels.into_iter().map(i32::from).collect::<Vec<_>>();
    let is_household = as_flag(label_households(df, table, households)?);
    let is_poi = as_flag(label_pois(df, table, pois)?);
    df.with_column(Column::new("Is_Household".into(), is_household))?;
    df.with_column(Column::new("Is_POI".into(), is_poi))?;
    Ok(())
}
