use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::frame::{column, count};
use crate::record::DateField;

/// Bucket width for the trend chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Day,
    /// Weeks start on Monday.
    Week,
    Month,
}

impl Granularity {
    /// Truncation window; polars starts `1w` windows on Monday.
    pub fn every(self) -> &'static str {
        match self {
            Granularity::Day => "1d",
            Granularity::Week => "1w",
            Granularity::Month => "1mo",
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            other => Err(format!("unknown granularity '{}' (day, week, month)", other)),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        })
    }
}

/// Row counts per bucket of `field`, ascending by date. Null dates are skipped.
pub fn timeline(
    df: &DataFrame,
    field: DateField,
    by: Granularity,
) -> PolarsResult<Vec<(NaiveDate, usize)>> {
    let name = column(field.field());
    let out = df
        .clone()
        .lazy()
        .filter(col(name).is_not_null())
        .group_by([col(name).dt().truncate(lit(by.every())).alias("bucket")])
        .agg([count()])
        .sort(["bucket"], SortMultipleOptions::default())
        .collect()?;

    let buckets = out.column("bucket")?.date()?;
    let counts = out.column("count")?.u64()?;
    Ok(buckets
        .as_date_iter()
        .zip(counts.into_iter())
        .filter_map(|(d, n)| Some((d?, n? as usize)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{fixtures::sample, to_frame};
    use crate::record::Record;
    use anyhow::Result;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_frame() -> Result<DataFrame> {
        let records = sample();
        let rows: Vec<&Record> = records.iter().collect();
        Ok(to_frame(&rows)?)
    }

    #[test]
    fn daily_counts_group_by_calendar_date() -> Result<()> {
        assert_eq!(
            timeline(&sample_frame()?, DateField::Created, Granularity::Day)?,
            vec![
                (d(2024, 1, 1), 2),
                (d(2024, 1, 3), 1),
                (d(2024, 1, 8), 1),
                (d(2024, 2, 14), 1)
            ]
        );
        Ok(())
    }

    #[test]
    fn weekly_and_monthly_buckets() -> Result<()> {
        let df = sample_frame()?;
        // 2024-01-01 is a Monday
        assert_eq!(
            timeline(&df, DateField::Created, Granularity::Week)?,
            vec![(d(2024, 1, 1), 3), (d(2024, 1, 8), 1), (d(2024, 2, 12), 1)]
        );
        assert_eq!(
            timeline(&df, DateField::Created, Granularity::Month)?,
            vec![(d(2024, 1, 1), 4), (d(2024, 2, 1), 1)]
        );
        Ok(())
    }

    #[test]
    fn all_null_dates_give_empty_series() -> Result<()> {
        assert!(timeline(&sample_frame()?, DateField::Modified, Granularity::Day)?.is_empty());
        Ok(())
    }

    #[test]
    fn parses_names() {
        assert_eq!("Weekly".parse::<Granularity>(), Ok(Granularity::Week));
        assert!("hourly".parse::<Granularity>().is_err());
    }
}
