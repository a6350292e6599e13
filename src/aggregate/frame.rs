use chrono::NaiveDate;
use polars::prelude::*;

use crate::record::{DateField, Field, Record};

/// Name of the frame column holding `field`.
pub fn column(field: Field) -> &'static str {
    match field {
        Field::Stage => "stage",
        Field::Source => "source",
        Field::Responsible => "responsible",
        Field::CompanyName => "company_name",
        Field::DateOfCreation => "created",
        Field::DateModified => "modified",
    }
}

fn text<'a>(rows: &[&'a Record], field: Field) -> Vec<Option<&'a str>> {
    rows.iter()
        .map(|r| Some(r.text(field)).filter(|s| !s.is_empty()))
        .collect()
}

fn dates(rows: &[&Record], field: DateField) -> Vec<Option<NaiveDate>> {
    rows.iter().map(|r| r.date(field).map(|dt| dt.date())).collect()
}

/// One row per record. Blank categorical values are null and timestamps are
/// reduced to their calendar date.
pub fn to_frame(rows: &[&Record]) -> PolarsResult<DataFrame> {
    df!(
        column(Field::Stage) => text(rows, Field::Stage),
        column(Field::Source) => text(rows, Field::Source),
        column(Field::Responsible) => text(rows, Field::Responsible),
        column(Field::CompanyName) => text(rows, Field::CompanyName),
        column(Field::DateOfCreation) => dates(rows, DateField::Created),
        column(Field::DateModified) => dates(rows, DateField::Modified)
    )
}

/// Read a `(key, count)` frame back; null keys come out as "".
pub(crate) fn labelled_counts(out: &DataFrame, key: &str) -> PolarsResult<Vec<(String, usize)>> {
    let keys = out.column(key)?.str()?;
    let counts = out.column("count")?.u64()?;
    Ok(keys
        .into_iter()
        .zip(counts.into_iter())
        .map(|(k, n)| (k.unwrap_or_default().to_string(), n.unwrap_or(0) as usize))
        .collect())
}

/// Row count aggregation, as `u64` so every group-by reads back the same way.
pub(crate) fn count() -> Expr {
    len().cast(DataType::UInt64).alias("count")
}
