use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::{borrow::Cow, fs, path::Path};
use tracing::{debug, warn};

use super::raw_table::{RawCell, RawTable};

/// Read a delimited text file. The first record is the header row.
#[tracing::instrument(level = "info", skip(path), fields(path = %path.display()))]
pub fn read_csv(path: &Path, delimiter: u8) -> Result<RawTable> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read CSV file {}", path.display()))?;
    let content = decode(&bytes, path);
    let mut table = parse_csv(&content, delimiter)
        .with_context(|| format!("Failed to parse CSV file {}", path.display()))?;
    table.source = path.to_path_buf();
    Ok(table)
}

/// Parse CSV text already in memory.
pub fn parse_csv(content: &str, delimiter: u8) -> Result<RawTable> {
    let content = content.strip_prefix('\u{FEFF}').unwrap_or(content);
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx + 1))?;
        let row: Vec<RawCell> = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    RawCell::Empty
                } else {
                    RawCell::Text(field.to_string())
                }
            })
            .collect();
        rows.push(row);
    }
    debug!(columns = headers.len(), rows = rows.len(), "parsed csv");

    Ok(RawTable {
        headers,
        rows,
        source: Default::default(),
    })
}

fn decode<'a>(bytes: &'a [u8], path: &Path) -> Cow<'a, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => {
            warn!(path = %path.display(), "file is not valid UTF-8; replacing invalid bytes");
            String::from_utf8_lossy(bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_headers_and_rows() -> Result<()> {
        let table = parse_csv(
            "\u{FEFF}Stage,Source,Company name\nNew,Web,\"Acme, Inc.\"\nWon,,Beta\n",
            b',',
        )?;
        assert_eq!(table.headers, vec!["Stage", "Source", "Company name"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.cell(0, 2), &RawCell::Text("Acme, Inc.".into()));
        assert_eq!(table.cell(1, 1), &RawCell::Empty);
        // short rows read as empty past their end
        assert_eq!(table.cell(1, 7), &RawCell::Empty);
        Ok(())
    }

    #[test]
    fn reads_semicolon_file_from_disk() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        write!(tmp, "Stage;Source\nNew;Web\n")?;
        let table = read_csv(tmp.path(), b';')?;
        assert_eq!(table.headers, vec!["Stage", "Source"]);
        assert_eq!(table.cell(0, 1), &RawCell::Text("Web".into()));
        assert_eq!(table.source, tmp.path());
        Ok(())
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() -> Result<()> {
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(b"Stage\nCaf\xe9\n")?;
        let table = read_csv(tmp.path(), b',')?;
        assert_eq!(table.rows.len(), 1);
        assert!(table.cell(0, 0).to_text().starts_with("Caf"));
        Ok(())
    }
}
