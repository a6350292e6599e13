// src/load/mod.rs
pub mod csv_table;
pub mod date_parser;
pub mod excel;
pub mod raw_table;
pub mod utils;

use anyhow::{anyhow, bail, Context, Result};
use glob::glob;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::record::Dataset;
use crate::schema::{normalize, Aliases, ColumnMap};
use date_parser::DateParser;
use raw_table::RawTable;

/// Everything the loader needs besides the file itself.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Worksheet name; first sheet when `None`.
    pub sheet: Option<String>,
    pub aliases: Aliases,
    pub dates: DateParser,
    /// Field delimiter for CSV input.
    pub delimiter: Option<u8>,
}

/// Read a single file into a raw table, dispatching on its extension.
pub fn load_path(path: &Path, opts: &LoadOptions) -> Result<RawTable> {
    match utils::file_kind(path).as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => excel::read_workbook(path, opts.sheet.as_deref()),
        "csv" | "txt" => csv_table::read_csv(path, opts.delimiter.unwrap_or(b',')),
        other => bail!(
            "unsupported input type '{}' for {} (expected xlsx, xlsm, xlsb, xls, ods, csv or txt)",
            other,
            path.display()
        ),
    }
}

/// Load and normalize one file. A missing-columns error keeps its type so
/// callers can downcast it to `SchemaError`.
pub fn load_dataset(path: &Path, opts: &LoadOptions) -> Result<Dataset> {
    let table = load_path(path, opts)?;
    let map = ColumnMap::resolve(&table.headers, &opts.aliases)
        .with_context(|| format!("in {}", path.display()))?;
    Ok(normalize(&table, &map, &opts.dates))
}

/// Expand `patterns` (globs or literal paths), load every match in
/// parallel, and concatenate in sorted path order.
#[tracing::instrument(level = "info", skip(opts))]
pub fn load_inputs(patterns: &[String], opts: &LoadOptions) -> Result<Dataset> {
    let paths = expand_patterns(patterns)?;
    info!(files = paths.len(), "loading inputs");

    let parts: Vec<Dataset> = paths
        .par_iter()
        .map(|p| load_dataset(p, opts))
        .collect::<Result<Vec<_>>>()?;

    let mut dataset = Dataset::default();
    for part in parts {
        dataset.concat(part)?;
    }
    info!(
        records = dataset.len(),
        extra_columns = dataset.extra_headers.len(),
        "dataset ready"
    );
    Ok(dataset)
}

/// Literal paths and glob matches, sorted and deduplicated.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let literal = Path::new(pattern);
        if literal.is_file() {
            paths.push(literal.to_path_buf());
            continue;
        }
        let before = paths.len();
        for entry in glob(pattern).with_context(|| format!("invalid glob pattern '{}'", pattern))? {
            let path = entry.with_context(|| format!("cannot read match of '{}'", pattern))?;
            if path.is_file() {
                debug!(path = %path.display(), "matched input");
                paths.push(path);
            }
        }
        if paths.len() == before {
            return Err(anyhow!("no input files match '{}'", pattern));
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}
