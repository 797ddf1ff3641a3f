use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::{f64_values, filter_rows, require_columns, set_f64_column};

/// A coordinate column and the column that stands in for it when it is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateFix {
    pub primary: String,
    pub fallback: String,
}

impl CoordinateFix {
    pub fn new(primary: &str, fallback: &str) -> Self {
        Self { primary: primary.to_string(), fallback: fallback.to_string() }
    }
}

/// Primary coordinate when usable, otherwise the fallback (which may itself be missing).
#[inline]
pub fn reconcile_value(primary: Option<f64>, fallback: Option<f64>) -> Option<f64> {
    primary.or(fallback)
}

/// Fill missing primary coordinates from their fallback columns.
///
/// Text columns (exports that wrote `null` or `#NULL!` into a coordinate) are
/// coerced to floats on the way; entries that do not parse count as missing.
/// Every primary column comes back as Float64.
pub fn reconcile_coordinates(df: &mut DataFrame, table: &str, fixes: &[CoordinateFix]) -> Result<()> {
    for fix in fixes {
        require_columns(df, table, &[&fix.primary, &fix.fallback])?;
        let primary = f64_values(df, table, &fix.primary)?;
        let fallback = f64_values(df, table, &fix.fallback)?;

        let filled = primary.iter().filter(|v| v.is_none()).count();
        let values = primary.into_iter().zip(fallback)
            .map(|(p, f)| reconcile_value(p, f))
            .collect::<Vec<_>>();
        let unresolved = values.iter().filter(|v| v.is_none()).count();

        if filled > 0 {
            info!("[listing] {table}: {} of {filled} missing {} values taken from {}",
                filled - unresolved, fix.primary, fix.fallback);
        }
        set_f64_column(df, &fix.primary, values)?;
    }
    Ok(())
}

/// Drop rows whose primary coordinates are still missing after reconciliation.
/// Returns the surviving rows and the number dropped.
pub fn drop_missing_coordinates(df: &DataFrame, table: &str, fixes: &[CoordinateFix]) -> Result<(DataFrame, usize)> {
    let mut keep = vec![true; df.height()];
    for fix in fixes {
        for (flag, value) in keep.iter_mut().zip(f64_values(df, table, &fix.primary)?) {
            *flag &= value.is_some();
        }
    }

    let before = df.height();
    let kept = filter_rows(df, &keep)?;
    let dropped = before - kept.height();
    info!("[listing] {table}: dropped {dropped} of {before} records with missing coordinates");
    Ok((kept, dropped))
}
