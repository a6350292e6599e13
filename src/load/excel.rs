use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use std::path::Path;
use tracing::debug;

use super::raw_table::{RawCell, RawTable};

/// Read one worksheet of a workbook. `sheet = None` takes the first sheet.
/// The first non-empty row is the header row.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.display()))]
pub fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook {}", path.display()))?;

    let range: Range<Data> = match sheet {
        Some(name) => workbook
            .worksheet_range(name)
            .with_context(|| format!("Failed to read sheet '{}' in {}", name, path.display()))?,
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| anyhow!("No worksheet found in {}", path.display()))?
            .with_context(|| format!("Failed to read first sheet in {}", path.display()))?,
    };

    let mut rows = range.rows().map(|row| row.iter().map(convert_cell).collect::<Vec<_>>());

    // leading blank rows are common in hand-edited exports
    let mut headers: Vec<String> = Vec::new();
    for r in rows.by_ref() {
        if r.iter().all(RawCell::is_empty) {
            continue;
        }
        headers = r.iter().map(RawCell::to_text).collect();
        break;
    }

    let body: Vec<Vec<RawCell>> = rows.collect();
    debug!(columns = headers.len(), rows = body.len(), "read worksheet");

    Ok(RawTable {
        headers,
        rows: body,
        source: path.to_path_buf(),
    })
}

fn convert_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) => RawCell::DateTime(dt),
            None => RawCell::Text(cell.to_string()),
        },
        other => RawCell::Text(other.to_string()),
    }
}
