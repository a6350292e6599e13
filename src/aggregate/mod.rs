pub mod frame;
pub mod pivot;
pub mod timeline;

pub use frame::to_frame;
pub use pivot::{pivot, PivotTable};
pub use timeline::{timeline, Granularity};

use anyhow::Result;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;

use crate::record::{DateField, Field, Record};
use frame::{column, count, labelled_counts};

/// Metric cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_records: usize,
    pub total_companies: usize,
    pub total_responsible: usize,
    pub total_sources: usize,
    pub first_created: Option<NaiveDate>,
    pub last_created: Option<NaiveDate>,
}

fn distinct_non_blank(field: Field) -> Expr {
    col(column(field))
        .drop_nulls()
        .n_unique()
        .cast(DataType::UInt64)
        .alias(column(field))
}

pub fn summary(df: &DataFrame) -> PolarsResult<Summary> {
    let created = column(Field::DateOfCreation);
    let out = df
        .clone()
        .lazy()
        .select([
            count(),
            distinct_non_blank(Field::CompanyName),
            distinct_non_blank(Field::Responsible),
            distinct_non_blank(Field::Source),
            col(created).min().alias("first"),
            col(created).max().alias("last"),
        ])
        .collect()?;

    let scalar = |name: &str| -> PolarsResult<usize> {
        Ok(out.column(name)?.u64()?.get(0).unwrap_or(0) as usize)
    };
    let day = |name: &str| -> PolarsResult<Option<NaiveDate>> {
        Ok(out.column(name)?.date()?.as_date_iter().next().flatten())
    };

    Ok(Summary {
        total_records: scalar("count")?,
        total_companies: scalar(column(Field::CompanyName))?,
        total_responsible: scalar(column(Field::Responsible))?,
        total_sources: scalar(column(Field::Source))?,
        first_created: day("first")?,
        last_created: day("last")?,
    })
}

/// `count` descending, then the key ascending.
fn largest_first() -> SortMultipleOptions {
    SortMultipleOptions {
        descending: vec![true, false],
        ..Default::default()
    }
}

/// Row counts per value of a categorical field, largest first, ties by value.
/// Blank values form their own group, labelled "".
pub fn distribution(df: &DataFrame, field: Field) -> PolarsResult<Vec<(String, usize)>> {
    let key = column(field);
    let out = df
        .clone()
        .lazy()
        .group_by([col(key)])
        .agg([count()])
        .sort_by_exprs([col("count"), col(key)], largest_first())
        .collect()?;
    labelled_counts(&out, key)
}

/// Distinct non-blank company names handled by each responsible, largest
/// first. Rows without a responsible are left out.
pub fn companies_per_responsible(df: &DataFrame) -> PolarsResult<Vec<(String, usize)>> {
    let key = column(Field::Responsible);
    let out = df
        .clone()
        .lazy()
        .filter(col(key).is_not_null())
        .group_by([col(key)])
        .agg([col(column(Field::CompanyName))
            .drop_nulls()
            .n_unique()
            .cast(DataType::UInt64)
            .alias("count")])
        .sort_by_exprs([col("count"), col(key)], largest_first())
        .collect()?;
    labelled_counts(&out, key)
}

/// Every aggregate the dashboard shows, in one serializable value.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub summary: Summary,
    pub stage: Vec<(String, usize)>,
    pub responsible: Vec<(String, usize)>,
    pub source: Vec<(String, usize)>,
    pub companies_per_responsible: Vec<(String, usize)>,
    pub granularity: Granularity,
    pub created_over_time: Vec<(NaiveDate, usize)>,
    pub heatmap: PivotTable,
}

pub fn overview(
    rows: &[&Record],
    granularity: Granularity,
    heatmap_rows: Field,
    heatmap_cols: Field,
) -> Result<Overview> {
    let df = to_frame(rows)?;
    Ok(Overview {
        summary: summary(&df)?,
        stage: distribution(&df, Field::Stage)?,
        responsible: distribution(&df, Field::Responsible)?,
        source: distribution(&df, Field::Source)?,
        companies_per_responsible: companies_per_responsible(&df)?,
        granularity,
        created_over_time: timeline(&df, DateField::Created, granularity)?,
        heatmap: pivot(&df, heatmap_rows, heatmap_cols)?,
    })
}
