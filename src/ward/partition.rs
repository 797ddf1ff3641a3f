use anyhow::Result;
use polars::frame::DataFrame;
use tracing::{info, warn};

use super::{SimilarityStrategy, WardInventory, best_match};
use crate::common::{filter_rows, require_columns, str_values};

/// Which listing value a ward was matched to and how many rows it received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WardAssignment {
    pub ward: String,
    /// Listing value(s) selected; several when they differ only in case.
    pub matched: Vec<String>,
    pub rows: usize,
    pub fuzzy: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionReport {
    /// The table held a single ward value, so nothing was written.
    pub single_ward: bool,
    pub assignments: Vec<WardAssignment>,
    /// Wards that could not be written, with the reason.
    pub failures: Vec<(String, String)>,
}

fn lower(s: &str) -> String { s.to_lowercase() }

/// Distinct non-null values in first-appearance order.
fn distinct(values: &[Option<String>]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values.iter().flatten() {
        if !out.contains(value) { out.push(value.clone()); }
    }
    out
}

/// Split `df` into one `{suffix}.csv` per ward of `inventory`.
///
/// A ward takes every row whose ward value equals its name ignoring case.
/// When no value matches that way, the value chosen by [`best_match`] is used.
/// A table with a single ward value is left alone. A ward that fails is
/// logged and reported while the others proceed.
pub fn partition_by_ward<I, S>(
    df: &DataFrame,
    ward_col: &str,
    suffix: &str,
    inventory: &mut I,
    strategy: &S,
) -> Result<PartitionReport>
where
    I: WardInventory + ?Sized,
    S: SimilarityStrategy + ?Sized,
{
    require_columns(df, "listing", &[ward_col])?;
    let values = str_values(df, "listing", ward_col)?;
    let candidates = distinct(&values);

    if candidates.len() == 1 {
        info!("[ward] single ward {:?} in {suffix} table, not partitioning", candidates[0]);
        return Ok(PartitionReport { single_ward: true, ..Default::default() })
    }

    let mut report = PartitionReport::default();
    let file_name = format!("{suffix}.csv");

    for ward in inventory.ward_names()? {
        let assigned = (|| -> Result<WardAssignment> {
            let wanted = lower(&ward);
            let mut matched = candidates.iter()
                .filter(|c| lower(c) == wanted)
                .cloned()
                .collect::<Vec<_>>();
            let fuzzy = matched.is_empty();
            if fuzzy {
                let found = best_match(&ward, &candidates, strategy)?;
                info!("[ward] directory {ward:?} has no exact match, using {found:?}");
                matched.push(found.to_string());
            }

            let keep = values.iter()
                .map(|v| v.as_ref().is_some_and(|v| matched.contains(v)))
                .collect::<Vec<_>>();
            let mut rows = filter_rows(df, &keep)?;
            inventory.put_table(&ward, &file_name, &mut rows)?;

            Ok(WardAssignment { ward: ward.clone(), matched, rows: rows.height(), fuzzy })
        })();

        match assigned {
            Ok(assignment) => report.assignments.push(assignment),
            Err(e) => {
                warn!("[ward] skipping {ward:?} for {file_name}: {e:#}");
                report.failures.push((ward, format!("{e:#}")));
            }
        }
    }

    Ok(report)
}
