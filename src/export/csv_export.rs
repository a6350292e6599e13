use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::io::Write;

use crate::load::date_parser::format_timestamp;
use crate::record::{Field, Record};

/// Header row: the six canonical names, then the extra columns.
pub fn export_headers(extra_headers: &[String]) -> Vec<String> {
    Field::ALL
        .iter()
        .map(|f| f.canonical_name().to_string())
        .chain(extra_headers.iter().cloned())
        .collect()
}

/// Write `rows` as CSV separated by `delimiter`. Dates use the export
/// timestamp format; nulls are empty fields. Returns the number of data rows
/// written.
pub fn write_csv<W: Write>(
    out: W,
    delimiter: u8,
    extra_headers: &[String],
    rows: &[&Record],
) -> Result<usize> {
    let mut wtr = WriterBuilder::new().delimiter(delimiter).from_writer(out);
    wtr.write_record(export_headers(extra_headers))
        .context("writing CSV header")?;

    for r in rows {
        let fixed = [
            r.stage.clone(),
            r.source.clone(),
            r.responsible.clone(),
            r.company_name.clone(),
            r.created.as_ref().map(format_timestamp).unwrap_or_default(),
            r.modified.as_ref().map(format_timestamp).unwrap_or_default(),
        ];
        wtr.write_record(fixed.iter().chain(r.extra.iter()))
            .context("writing CSV row")?;
    }
    wtr.flush().context("flushing CSV output")?;
    Ok(rows.len())
}

/// CSV in memory, for the HTTP download.
pub fn csv_bytes(delimiter: u8, extra_headers: &[String], rows: &[&Record]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(&mut buf, delimiter, extra_headers, rows)?;
    Ok(buf)
}
