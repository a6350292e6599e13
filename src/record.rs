use anyhow::{bail, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, path::PathBuf};

/// The six columns every input must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Stage,
    Source,
    Responsible,
    CompanyName,
    DateOfCreation,
    DateModified,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Stage,
        Field::Source,
        Field::Responsible,
        Field::CompanyName,
        Field::DateOfCreation,
        Field::DateModified,
    ];

    /// Header name used in exports and on the page.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Field::Stage => "Stage",
            Field::Source => "Source",
            Field::Responsible => "Responsible",
            Field::CompanyName => "Company name",
            Field::DateOfCreation => "Date of creation",
            Field::DateModified => "Date modified",
        }
    }

    pub fn categorical() -> [Field; 4] {
        [
            Field::Stage,
            Field::Source,
            Field::Responsible,
            Field::CompanyName,
        ]
    }

    pub fn is_date(self) -> bool {
        matches!(self, Field::DateOfCreation | Field::DateModified)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    Created,
    Modified,
}

impl DateField {
    pub fn field(self) -> Field {
        match self {
            DateField::Created => Field::DateOfCreation,
            DateField::Modified => Field::DateModified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub stage: String,
    pub source: String,
    pub responsible: String,
    pub company_name: String,
    pub created: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
    /// Values of the non-expected columns, aligned with `Dataset::extra_headers`.
    pub extra: Vec<String>,
}

impl Record {
    /// Categorical value of `field`; dates have no text value here.
    pub fn text(&self, field: Field) -> &str {
        match field {
            Field::Stage => &self.stage,
            Field::Source => &self.source,
            Field::Responsible => &self.responsible,
            Field::CompanyName => &self.company_name,
            Field::DateOfCreation | Field::DateModified => "",
        }
    }

    pub fn date(&self, field: DateField) -> Option<NaiveDateTime> {
        match field {
            DateField::Created => self.created,
            DateField::Modified => self.modified,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub extra_headers: Vec<String>,
    pub sources: Vec<PathBuf>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct values of a categorical field in first-appearance order.
    pub fn distinct(&self, field: Field) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for r in &self.records {
            let v = r.text(field);
            if seen.insert(v) {
                out.push(v.to_string());
            }
        }
        out
    }

    /// Earliest and latest calendar date among non-null timestamps.
    pub fn date_bounds(&self, field: DateField) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.records.iter().filter_map(|r| r.date(field));
        let first = dates.next()?.date();
        Some(dates.fold((first, first), |(lo, hi), dt| {
            let d = dt.date();
            (lo.min(d), hi.max(d))
        }))
    }

    /// Append `other`. Both sides must carry the same extra columns.
    pub fn concat(&mut self, other: Dataset) -> Result<()> {
        if self.sources.is_empty() && self.records.is_empty() {
            *self = other;
            return Ok(());
        }
        if self.extra_headers != other.extra_headers {
            bail!(
                "extra columns differ between inputs: [{}] vs [{}] ({})",
                self.extra_headers.join(", "),
                other.extra_headers.join(", "),
                other
                    .sources
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        self.records.extend(other.records);
        self.sources.extend(other.sources);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(stage: &str, created: Option<&str>) -> Record {
        Record {
            stage: stage.into(),
            created: created.map(|s| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn distinct_keeps_first_appearance_order() {
        let ds = Dataset {
            records: vec![rec("Won", None), rec("New", None), rec("Won", None)],
            ..Default::default()
        };
        assert_eq!(ds.distinct(Field::Stage), vec!["Won", "New"]);
    }

    #[test]
    fn date_bounds_skip_nulls() {
        let ds = Dataset {
            records: vec![
                rec("a", Some("2024-02-03 10:00:00")),
                rec("b", None),
                rec("c", Some("2024-01-15 23:59:59")),
            ],
            ..Default::default()
        };
        assert_eq!(
            ds.date_bounds(DateField::Created),
            Some((
                NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 3).unwrap()
            ))
        );
        assert_eq!(ds.date_bounds(DateField::Modified), None);
    }

    #[test]
    fn concat_rejects_mismatched_extras() {
        let mut a = Dataset {
            records: vec![rec("a", None)],
            extra_headers: vec!["Phone".into()],
            sources: vec!["a.xlsx".into()],
        };
        let b = Dataset {
            records: vec![rec("b", None)],
            extra_headers: vec![],
            sources: vec!["b.xlsx".into()],
        };
        assert!(a.concat(b).is_err());

        let c = Dataset {
            records: vec![rec("c", None)],
            extra_headers: vec!["Phone".into()],
            sources: vec!["c.xlsx".into()],
        };
        a.concat(c).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a.sources.len(), 2);
    }
}
