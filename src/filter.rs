use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::warn;

use crate::record::{Dataset, Field, Record};

/// State of one multiselect.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    #[default]
    All,
    Only(BTreeSet<String>),
}

impl Selection {
    pub fn only<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Only(values.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, value: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(set) => set.contains(value),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Selection::All)
    }
}

/// Conjunction of independent predicates over a record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Filter {
    pub stages: Selection,
    pub responsibles: Selection,
    pub sources: Selection,
    /// Inclusive bounds on the calendar date of "Date of creation".
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
}

impl Filter {
    pub fn selection(&self, field: Field) -> Option<&Selection> {
        match field {
            Field::Stage => Some(&self.stages),
            Field::Responsible => Some(&self.responsibles),
            Field::Source => Some(&self.sources),
            _ => None,
        }
    }

    pub fn has_date_bounds(&self) -> bool {
        self.created_from.is_some() || self.created_to.is_some()
    }

    pub fn matches(&self, r: &Record) -> bool {
        self.stages.contains(&r.stage)
            && self.responsibles.contains(&r.responsible)
            && self.sources.contains(&r.source)
            && self.date_matches(r)
    }

    fn date_matches(&self, r: &Record) -> bool {
        if !self.has_date_bounds() {
            return true;
        }
        let Some(created) = r.created else {
            return false;
        };
        let day = created.date();
        self.created_from.map_or(true, |from| day >= from)
            && self.created_to.map_or(true, |to| day <= to)
    }

    /// Matching records, in input order.
    pub fn apply<'a>(&self, ds: &'a Dataset) -> Vec<&'a Record> {
        ds.records.iter().filter(|r| self.matches(r)).collect()
    }

    /// Build from URL query pairs. Repeated `stage`/`responsible`/`source`
    /// keys form the selections; `from`/`to` are `YYYY-MM-DD`. A widget
    /// that was on the submitted form sends `present=<key>`, so a missing
    /// key then means nothing is selected rather than everything.
    pub fn from_query(pairs: &[(String, String)]) -> Self {
        let collect = |key: &str| -> Selection {
            let present = pairs.iter().any(|(k, v)| k == "present" && v == key);
            let values: BTreeSet<String> = pairs
                .iter()
                .filter(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .collect();
            if values.is_empty() && !present {
                Selection::All
            } else {
                Selection::Only(values)
            }
        };
        let date = |key: &str| -> Option<NaiveDate> {
            let raw = pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.trim())?;
            if raw.is_empty() {
                return None;
            }
            match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!(key, value = raw, error = %e, "ignoring malformed date bound");
                    None
                }
            }
        };

        Filter {
            stages: collect("stage"),
            responsibles: collect("responsible"),
            sources: collect("source"),
            created_from: date("from"),
            created_to: date("to"),
        }
    }

    /// Inverse of `from_query`, for links that carry the current filter.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (key, sel) in [
            ("stage", &self.stages),
            ("responsible", &self.responsibles),
            ("source", &self.sources),
        ] {
            if let Selection::Only(values) = sel {
                out.push(("present".to_string(), key.to_string()));
                out.extend(values.iter().map(|v| (key.to_string(), v.clone())));
            }
        }
        if let Some(d) = self.created_from {
            out.push(("from".into(), d.format("%Y-%m-%d").to_string()));
        }
        if let Some(d) = self.created_to {
            out.push(("to".into(), d.format("%Y-%m-%d").to_string()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn rec(stage: &str, resp: &str, source: &str, created: Option<&str>) -> Record {
        Record {
            stage: stage.into(),
            responsible: resp.into(),
            source: source.into(),
            company_name: format!("{}-{}", stage, resp),
            created: created
                .map(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()),
            ..Default::default()
        }
    }

    fn sample() -> Dataset {
        Dataset {
            records: vec![
                rec("New", "Ann", "Web", Some("2024-01-01 09:00:00")),
                rec("Won", "Ann", "Call", Some("2024-01-10 23:59:59")),
                rec("New", "Bob", "Web", Some("2024-02-01 00:00:00")),
                rec("Lost", "Bob", "Call", None),
            ],
            ..Default::default()
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn default_filter_keeps_everything() {
        let ds = sample();
        assert_eq!(Filter::default().apply(&ds).len(), 4);
    }

    #[test]
    fn predicates_combine_as_conjunction() {
        let ds = sample();
        let by_stage = Filter {
            stages: Selection::only(["New"]),
            ..Default::default()
        };
        let by_resp = Filter {
            responsibles: Selection::only(["Ann"]),
            ..Default::default()
        };
        let both = Filter {
            stages: Selection::only(["New"]),
            responsibles: Selection::only(["Ann"]),
            ..Default::default()
        };

        // conjunction == intersection of the independent results
        for r in &ds.records {
            assert_eq!(both.matches(r), by_stage.matches(r) && by_resp.matches(r));
        }
        let hits = both.apply(&ds);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].company_name, "New-Ann");
    }

    #[test]
    fn date_range_is_inclusive_and_drops_null_dates() {
        let ds = sample();
        let f = Filter {
            created_from: Some(d("2024-01-10")),
            created_to: Some(d("2024-02-01")),
            ..Default::default()
        };
        let names: Vec<&str> = f.apply(&ds).iter().map(|r| r.company_name.as_str()).collect();
        assert_eq!(names, vec!["Won-Ann", "New-Bob"]);

        let open_ended = Filter {
            created_to: Some(d("2024-01-01")),
            ..Default::default()
        };
        assert_eq!(open_ended.apply(&ds).len(), 1);
    }

    #[test]
    fn empty_selection_matches_nothing() {
        let ds = sample();
        let f = Filter {
            sources: Selection::Only(BTreeSet::new()),
            ..Default::default()
        };
        assert!(f.apply(&ds).is_empty());
    }

    #[test]
    fn query_round_trip() {
        let pairs: Vec<(String, String)> = vec![
            ("stage".into(), "New".into()),
            ("stage".into(), "Won".into()),
            ("present".into(), "stage".into()),
            ("present".into(), "responsible".into()),
            ("from".into(), "2024-01-05".into()),
            ("to".into(), "".into()),
        ];
        let f = Filter::from_query(&pairs);
        assert_eq!(f.stages, Selection::only(["New", "Won"]));
        // submitted form with no responsible boxes ticked
        assert_eq!(f.responsibles, Selection::Only(BTreeSet::new()));
        assert_eq!(f.created_from, Some(d("2024-01-05")));
        assert_eq!(f.created_to, None);
        // source widget absent from the query
        assert_eq!(f.sources, Selection::All);

        assert_eq!(Filter::from_query(&f.to_query()), f);
    }

    #[test]
    fn bare_query_means_all_and_bad_dates_are_ignored() {
        let f = Filter::from_query(&[("from".into(), "05/01/2024".into())]);
        assert_eq!(f, Filter::default());
    }
}
