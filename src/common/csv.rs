//! Delimited text reading and writing.

use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use polars::{
    frame::DataFrame,
    io::{SerReader, SerWriter},
    prelude::{CsvEncoding, CsvReadOptions, CsvWriter},
};

/// Rows scanned before column types are fixed.
const INFER_SCHEMA_ROWS: usize = 10_000;

fn read_delimited(path: &Path, separator: u8) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("[common::csv] Failed to open {}", path.display()))?;
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .map_parse_options(|po| po
            .with_separator(separator)
            .with_encoding(CsvEncoding::LossyUtf8))
        .into_reader_with_file_handle(file)
        .finish()
        .with_context(|| format!("[common::csv] Failed to read {}", path.display()))
}

/// Reads a comma-separated file with a header row.
/// Invalid UTF-8 (latin-1 exports) is decoded lossily rather than rejected.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    read_delimited(path, b',')
}

/// Reads a tab-delimited survey export with a header row.
pub fn read_tab_delimited(path: &Path) -> Result<DataFrame> {
    read_delimited(path, b'\t')
}

/// Writes a DataFrame to a CSV file, header included.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("[common::csv] Failed to create CSV file: {}", path.display()))?;
    CsvWriter::new(file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("[common::csv] Failed to write CSV to {}", path.display()))
}
