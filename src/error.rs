use thiserror::Error;

/// Domain failures raised while turning listing records into ward datasets.
///
/// These travel inside `anyhow::Error`; loops that isolate wards use
/// `downcast_ref::<ProcessingError>()` to tell them apart from I/O failures.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// A row has no usable (longitude, latitude) pair.
    #[error("row {row} of {table} has no usable coordinates in {lon:?}/{lat:?}")]
    MissingCoordinates { table: String, row: usize, lon: String, lat: String },

    /// No ward value in the listing table corresponds to a ward directory.
    #[error("no ward in the listing data matches directory {ward:?} (candidates: {candidates:?})")]
    WardMatch { ward: String, candidates: Vec<String> },

    /// A split output contains categories it should not.
    #[error("{table} holds unexpected structure categories {found:?} (expected only {expected:?})")]
    CategoryPurity { table: String, found: Vec<String>, expected: String },

    /// An expected column is absent from an input table.
    #[error("column {column:?} is missing from {table}")]
    SchemaMismatch { table: String, column: String },

    /// A merge that must match row-for-row did not.
    #[error("merging {right} into {left}: {matched} of {expected} {right} rows matched")]
    JoinAssertion { left: String, right: String, matched: usize, expected: usize },
}

impl ProcessingError {
    pub(crate) fn missing_column(table: &str, column: &str) -> Self {
        Self::SchemaMismatch { table: table.to_string(), column: column.to_string() }
    }
}
