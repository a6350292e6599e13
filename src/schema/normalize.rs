use chrono::NaiveDateTime;
use tracing::{info, warn};

use super::columns::ColumnMap;
use crate::load::date_parser::DateParser;
use crate::load::raw_table::{RawCell, RawTable};
use crate::load::utils::clean_text;
use crate::record::{Dataset, Field, Record};

/// Turn a raw table into records using a resolved column map.
///
/// Rows that normalize to nothing are dropped: every text cell empty after
/// cleaning and no parseable date. Unparseable date text becomes `None`; the
/// number of coerced cells is logged once per date column. Extra columns
/// without a header and without any value are dropped.
pub fn normalize(table: &RawTable, map: &ColumnMap, dates: &DateParser) -> Dataset {
    let mut bad_created = 0usize;
    let mut bad_modified = 0usize;
    let mut records = Vec::with_capacity(table.rows.len());

    for row in 0..table.rows.len() {
        let text = |field: Field| clean_text(&table.cell(row, map.index(field)).to_text());

        let created = parse_date(
            table.cell(row, map.index(Field::DateOfCreation)),
            dates,
            &mut bad_created,
        );
        let modified = parse_date(
            table.cell(row, map.index(Field::DateModified)),
            dates,
            &mut bad_modified,
        );

        let record = Record {
            stage: text(Field::Stage),
            source: text(Field::Source),
            responsible: text(Field::Responsible),
            company_name: text(Field::CompanyName),
            created,
            modified,
            extra: map
                .extras
                .iter()
                .map(|(col, _)| table.cell(row, *col).to_text())
                .collect(),
        };
        if !is_blank(&record) {
            records.push(record);
        }
    }

    let keep: Vec<bool> = map
        .extras
        .iter()
        .enumerate()
        .map(|(k, (_, name))| {
            !name.starts_with("Unnamed: ")
                || records.iter().any(|r| !clean_text(&r.extra[k]).is_empty())
        })
        .collect();
    if keep.contains(&false) {
        for r in &mut records {
            r.extra = std::mem::take(&mut r.extra)
                .into_iter()
                .zip(&keep)
                .filter_map(|(value, &k)| k.then_some(value))
                .collect();
        }
    }

    for (field, bad) in [
        (Field::DateOfCreation, bad_created),
        (Field::DateModified, bad_modified),
    ] {
        if bad > 0 {
            warn!(column = %field, count = bad, "unparseable dates coerced to null");
        }
    }
    info!(
        path = %table.source.display(),
        records = records.len(),
        skipped_blank = table.rows.len() - records.len(),
        "normalized table"
    );

    Dataset {
        records,
        extra_headers: map
            .extras
            .iter()
            .zip(&keep)
            .filter(|(_, &k)| k)
            .map(|((_, name), _)| name.clone())
            .collect(),
        sources: vec![table.source.clone()],
    }
}

/// Nothing left after cleaning. A record like this exports as a row of empty
/// fields, which a reload would skip.
fn is_blank(r: &Record) -> bool {
    Field::categorical()
        .into_iter()
        .all(|f| r.text(f).is_empty())
        && r.created.is_none()
        && r.modified.is_none()
        && r.extra.iter().all(|v| clean_text(v).is_empty())
}

fn parse_date(cell: &RawCell, dates: &DateParser, bad: &mut usize) -> Option<NaiveDateTime> {
    match cell {
        RawCell::Empty => None,
        RawCell::DateTime(dt) => Some(*dt),
        RawCell::Text(s) => {
            let cleaned = clean_text(s);
            if cleaned.is_empty() {
                return None;
            }
            let parsed = dates.parse(&cleaned);
            if parsed.is_none() {
                *bad += 1;
            }
            parsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::csv_table::parse_csv;
    use crate::schema::columns::Aliases;
    use anyhow::Result;
    use chrono::NaiveDate;

    #[test]
    fn builds_records_and_coerces_bad_dates() -> Result<()> {
        let table = parse_csv(
            "Stage,Source,Responsible,Company name,Date of creation,Date modified,Phone,\n\
             \u{200B}New ,Web,Ann,Acme,01.02.2024 10:00:00,not a date,555,\n\
             ,,,,,,,\n\
             Won,Call,Bob,Beta,,02.02.2024 11:30:00,,\n",
            b',',
        )?;
        let map = ColumnMap::resolve(&table.headers, &Aliases::new())?;
        let ds = normalize(&table, &map, &DateParser::default());

        assert_eq!(ds.len(), 2);
        // the trailing unnamed column is empty everywhere
        assert_eq!(ds.extra_headers, vec!["Phone"]);

        let first = &ds.records[0];
        assert_eq!(first.stage, "New");
        assert_eq!(
            first.created,
            NaiveDate::from_ymd_opt(2024, 2, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
        );
        assert_eq!(first.modified, None);
        assert_eq!(first.extra, vec!["555"]);

        let second = &ds.records[1];
        assert_eq!(second.created, None);
        assert!(second.modified.is_some());
        assert_eq!(second.extra, vec![""]);
        Ok(())
    }

    #[test]
    fn rows_empty_after_cleaning_are_dropped() -> Result<()> {
        let table = parse_csv(
            "Stage,Source,Responsible,Company name,Date of creation,Date modified,Notes\n\
             New,Web,Ann,Acme,,,\n\
             ,,,,31.02.2024 25:00:00,,\n\
             ,\u{200B},,,,,\n\
             ,,,,,,\u{200E} \n",
            b',',
        )?;
        let map = ColumnMap::resolve(&table.headers, &Aliases::new())?;
        let ds = normalize(&table, &map, &DateParser::default());

        assert_eq!(ds.len(), 1);
        assert_eq!(ds.records[0].company_name, "Acme");
        assert_eq!(ds.extra_headers, vec!["Notes"]);
        Ok(())
    }

    #[test]
    fn native_datetime_cells_pass_through() {
        let dt = NaiveDate::from_ymd_opt(2023, 3, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let mut bad = 0;
        assert_eq!(
            parse_date(&RawCell::DateTime(dt), &DateParser::default(), &mut bad),
            Some(dt)
        );
        assert_eq!(bad, 0);
    }
}
