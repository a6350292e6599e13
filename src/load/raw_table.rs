use chrono::NaiveDateTime;
use std::path::PathBuf;

/// One cell as read from the input file, before any column is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    /// A native spreadsheet date. CSV input never produces this.
    DateTime(NaiveDateTime),
}

impl RawCell {
    pub fn is_empty(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.trim().is_empty(),
            RawCell::DateTime(_) => false,
        }
    }

    /// Text rendition used for categorical and extra columns.
    pub fn to_text(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(s) => s.clone(),
            RawCell::DateTime(dt) => super::date_parser::format_timestamp(dt),
        }
    }
}

#[derive(Debug)]
pub struct RawTable {
    /// Column names as the file claims them, uncleaned.
    pub headers: Vec<String>,
    /// Data rows; may be shorter or longer than `headers`.
    pub rows: Vec<Vec<RawCell>>,
    /// File the table was read from.
    pub source: PathBuf,
}

impl RawTable {
    pub fn cell(&self, row: usize, col: usize) -> &RawCell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&RawCell::Empty)
    }
}
