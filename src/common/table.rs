//! Column access helpers shared by the listing, ward and aggregation steps.

use anyhow::Result;
use polars::prelude::*;

use crate::error::ProcessingError;

/// Whether `df` has a column called `name`.
#[inline]
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Error with `SchemaMismatch` naming the first of `columns` absent from `df`.
pub fn require_columns<S: AsRef<str>>(df: &DataFrame, table: &str, columns: &[S]) -> Result<()> {
    match columns.iter().map(AsRef::as_ref).find(|&c| !has_column(df, c)) {
        Some(missing) => Err(ProcessingError::missing_column(table, missing).into()),
        None => Ok(()),
    }
}

/// Parse a coordinate or count written as text; sentinels such as `null`,
/// `#NULL!` or blanks yield `None`.
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Read a column as optional floats. Text columns are parsed value by value,
/// numeric and boolean columns are cast. NaN counts as missing.
pub fn f64_values(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df.column(name)
        .map_err(|_| ProcessingError::missing_column(table, name))?;

    if column.dtype() == &DataType::String {
        return Ok(column.str()?.into_iter()
            .map(|value| value.and_then(parse_number))
            .collect());
    }

    let cast = column.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter()
        .map(|value| value.filter(|v| v.is_finite()))
        .collect())
}

/// Read a column as optional strings, casting non-text columns.
pub fn str_values(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)
        .map_err(|_| ProcessingError::missing_column(table, name))?;
    let cast = column.cast(&DataType::String)?;
    Ok(cast.str()?.into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

/// Keep the rows whose entry in `keep` is true.
pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> Result<DataFrame> {
    let mask = Series::new("mask".into(), keep.to_vec());
    Ok(df.filter(mask.bool()?)?)
}

/// Replace (or add) a float column.
pub fn set_f64_column(df: &mut DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<()> {
    df.with_column(Column::new(name.into(), values))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;

    #[test]
    fn parse_number_rejects_sentinels() {
        assert_eq!(parse_number(" 28.3 "), Some(28.3));
        assert_eq!(parse_number("null"), None);
        assert_eq!(parse_number("#NULL!"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn f64_values_parses_text_columns() {
        let df = df!["lon" => ["28.1", "null", "27.5"]].unwrap();
        assert_eq!(f64_values(&df, "t", "lon").unwrap(), vec![Some(28.1), None, Some(27.5)]);
    }

    #[test]
    fn missing_column_is_schema_mismatch() {
        let df = df!["a" => [1i64]].unwrap();
        let err = require_columns(&df, "listing", &["a", "b"]).unwrap_err();
        match err.downcast_ref::<ProcessingError>() {
            Some(ProcessingError::SchemaMismatch { column, .. }) => assert_eq!(column, "b"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
