use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;

use super::frame::{column, count};
use crate::record::Field;

/// Counts of rows per (row value, column value), zero filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotTable {
    pub row_field: Field,
    pub col_field: Field,
    pub rows: Vec<String>,
    pub cols: Vec<String>,
    /// `cells[i][j]` counts `rows[i]` × `cols[j]`.
    pub cells: Vec<Vec<usize>>,
}

impl PivotTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn max(&self) -> usize {
        self.cells
            .iter()
            .flat_map(|r| r.iter().copied())
            .max()
            .unwrap_or(0)
    }

    pub fn row_totals(&self) -> Vec<usize> {
        self.cells.iter().map(|r| r.iter().sum()).collect()
    }

    pub fn col_totals(&self) -> Vec<usize> {
        (0..self.cols.len())
            .map(|j| self.cells.iter().map(|r| r[j]).sum())
            .collect()
    }

    pub fn get(&self, row: &str, col: &str) -> usize {
        let i = self.rows.iter().position(|r| r == row);
        let j = self.cols.iter().position(|c| c == col);
        match (i, j) {
            (Some(i), Some(j)) => self.cells[i][j],
            _ => 0,
        }
    }
}

/// Pivot the frame on two categorical fields. Labels are sorted ascending;
/// blank values are labelled "".
pub fn pivot(df: &DataFrame, row_field: Field, col_field: Field) -> PolarsResult<PivotTable> {
    let out = df
        .clone()
        .lazy()
        .group_by([
            col(column(row_field)).alias("row"),
            col(column(col_field)).alias("col"),
        ])
        .agg([count()])
        .collect()?;

    let keys = |name: &str| -> PolarsResult<Vec<String>> {
        Ok(out
            .column(name)?
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect())
    };
    let row_keys = keys("row")?;
    let col_keys = keys("col")?;
    let counts = out.column("count")?.u64()?;

    let sorted = |keys: &[String]| -> Vec<String> {
        keys.iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    };
    let rows = sorted(&row_keys);
    let cols = sorted(&col_keys);
    let mut cells = vec![vec![0usize; cols.len()]; rows.len()];
    for ((a, b), n) in row_keys.iter().zip(&col_keys).zip(counts.into_iter()) {
        // labels come from these same keys, so both searches hit
        if let (Ok(i), Ok(j)) = (rows.binary_search(a), cols.binary_search(b)) {
            cells[i][j] = n.unwrap_or(0) as usize;
        }
    }

    Ok(PivotTable {
        row_field,
        col_field,
        rows,
        cols,
        cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{fixtures::sample, to_frame};
    use crate::record::Record;
    use anyhow::Result;

    #[test]
    fn responsible_by_stage() -> Result<()> {
        let records = sample();
        let rows: Vec<&Record> = records.iter().collect();
        let p = pivot(&to_frame(&rows)?, Field::Responsible, Field::Stage)?;

        assert_eq!(p.rows, vec!["Ann", "Bob", "Cid"]);
        assert_eq!(p.cols, vec!["Lost", "New", "Won"]);
        assert_eq!(p.cells, vec![vec![0, 2, 1], vec![1, 1, 0], vec![0, 0, 1]]);
        assert_eq!(p.get("Ann", "New"), 2);
        assert_eq!(p.get("Zed", "New"), 0);
        assert_eq!(p.max(), 2);
        assert_eq!(p.row_totals(), vec![3, 2, 1]);
        assert_eq!(p.col_totals(), vec![1, 3, 2]);
        assert_eq!(p.row_totals().iter().sum::<usize>(), rows.len());
        Ok(())
    }

    #[test]
    fn blank_values_get_their_own_label() -> Result<()> {
        let records = sample();
        let rows: Vec<&Record> = records.iter().collect();
        let p = pivot(&to_frame(&rows)?, Field::Source, Field::Stage)?;
        assert_eq!(p.rows, vec!["", "Call", "Web"]);
        assert_eq!(p.get("", "Lost"), 1);
        Ok(())
    }

    #[test]
    fn empty_input_is_empty_table() -> Result<()> {
        let p = pivot(&to_frame(&[])?, Field::Responsible, Field::Stage)?;
        assert!(p.is_empty());
        assert_eq!(p.max(), 0);
        assert!(p.col_totals().is_empty());
        Ok(())
    }
}
