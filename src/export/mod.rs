pub mod csv_export;
pub mod parquet_export;

pub use csv_export::{csv_bytes, write_csv};
pub use parquet_export::write_parquet;

use anyhow::{bail, Context, Result};
use std::{fs::File, io::BufWriter, path::Path, str::FromStr};

use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Parquet,
}

impl ExportFormat {
    /// Guess from the output file extension, CSV otherwise.
    pub fn from_path(path: &Path) -> Self {
        match crate::load::utils::file_kind(path).as_str() {
            "parquet" | "pq" => ExportFormat::Parquet,
            _ => ExportFormat::Csv,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "parquet" => Ok(ExportFormat::Parquet),
            other => bail!("unknown export format '{}' (csv, parquet)", other),
        }
    }
}

/// Write `rows` to `path` in `format`. `delimiter` only applies to CSV.
/// Returns the number of rows written.
pub fn export_to_path(
    path: &Path,
    format: ExportFormat,
    delimiter: u8,
    extra_headers: &[String],
    rows: &[&Record],
) -> Result<usize> {
    match format {
        ExportFormat::Csv => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            write_csv(BufWriter::new(file), delimiter, extra_headers, rows)
        }
        ExportFormat::Parquet => {
            write_parquet(path, extra_headers, rows)?;
            Ok(rows.len())
        }
    }
}
