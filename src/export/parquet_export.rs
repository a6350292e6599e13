use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, StringArray, TimestampMillisecondArray},
    datatypes::{DataType, Field as ArrowField, Schema, TimeUnit},
    record_batch::RecordBatch,
};
use parquet::{
    arrow::ArrowWriter,
    basic::{BrotliLevel, Compression},
    file::properties::WriterProperties,
};
use std::{fs::File, path::Path, sync::Arc};
use tracing::info;

use crate::record::{Field, Record};

/// Arrow schema for exported rows: strings, then two naive millisecond
/// timestamps, then one string column per extra header.
pub fn export_schema(extra_headers: &[String]) -> Schema {
    let mut fields = Vec::with_capacity(6 + extra_headers.len());
    for f in Field::ALL {
        let ty = if f.is_date() {
            DataType::Timestamp(TimeUnit::Millisecond, None)
        } else {
            DataType::Utf8
        };
        fields.push(ArrowField::new(f.canonical_name(), ty, true));
    }
    for h in extra_headers {
        fields.push(ArrowField::new(h, DataType::Utf8, true));
    }
    Schema::new(fields)
}

pub fn to_record_batch(extra_headers: &[String], rows: &[&Record]) -> Result<RecordBatch> {
    let schema = Arc::new(export_schema(extra_headers));

    let text = |field: Field| -> ArrayRef {
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.text(field))))
    };
    let stamp = |get: fn(&Record) -> Option<i64>| -> ArrayRef {
        Arc::new(TimestampMillisecondArray::from(
            rows.iter().map(|r| get(r)).collect::<Vec<_>>(),
        ))
    };

    let mut columns: Vec<ArrayRef> = vec![
        text(Field::Stage),
        text(Field::Source),
        text(Field::Responsible),
        text(Field::CompanyName),
        stamp(|r| r.created.map(|dt| dt.and_utc().timestamp_millis())),
        stamp(|r| r.modified.map(|dt| dt.and_utc().timestamp_millis())),
    ];
    for i in 0..extra_headers.len() {
        columns.push(Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.extra.get(i).map(String::as_str).unwrap_or("")),
        )));
    }

    RecordBatch::try_new(schema, columns).context("building export record batch")
}

/// Write `rows` to a brotli-compressed Parquet file.
pub fn write_parquet(path: &Path, extra_headers: &[String], rows: &[&Record]) -> Result<u64> {
    let batch = to_record_batch(extra_headers, rows)?;

    let file =
        File::create(path).with_context(|| format!("creating file {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::BROTLI(BrotliLevel::try_new(5)?))
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating parquet writer")?;
    writer.write(&batch).context("writing batch to parquet")?;
    writer.close().context("closing parquet writer")?;

    let bytes = std::fs::metadata(path)
        .context("getting file metadata")?
        .len();
    info!(path = %path.display(), rows = rows.len(), bytes, "wrote parquet");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use arrow::array::Array;
    use chrono::NaiveDate;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use parquet::file::reader::FileReader;
    use parquet::file::serialized_reader::SerializedFileReader;
    use tempfile::tempdir;

    fn sample() -> Vec<Record> {
        vec![
            Record {
                stage: "New".into(),
                company_name: "Acme".into(),
                created: NaiveDate::from_ymd_opt(2024, 1, 2)
                    .unwrap()
                    .and_hms_opt(3, 4, 5),
                extra: vec!["555".into()],
                ..Default::default()
            },
            Record {
                stage: "Won".into(),
                company_name: "Beta".into(),
                extra: vec![],
                ..Default::default()
            },
        ]
    }

    #[test]
    fn batch_has_typed_columns_and_nulls() -> Result<()> {
        let records = sample();
        let rows: Vec<&Record> = records.iter().collect();
        let batch = to_record_batch(&["Phone".to_string()], &rows)?;

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 7);
        let created = batch
            .column(4)
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .unwrap();
        assert_eq!(created.value(0), 1_704_164_645_000);
        assert!(created.is_null(1));
        let phone = batch
            .column(6)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(phone.value(0), "555");
        assert_eq!(phone.value(1), "");
        Ok(())
    }

    #[test]
    fn parquet_file_holds_every_row() -> Result<()> {
        let records = sample();
        let rows: Vec<&Record> = records.iter().collect();
        let dir = tempdir()?;
        let path = dir.path().join("filtered.parquet");
        let bytes = write_parquet(&path, &["Phone".to_string()], &rows)?;
        assert!(bytes > 0);

        let reader = SerializedFileReader::new(File::open(&path)?)?;
        assert_eq!(reader.metadata().file_metadata().num_rows(), 2);

        let mut batches = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?.build()?;
        let batch = batches.next().unwrap()?;
        assert_eq!(batch.schema().field(3).name(), "Company name");
        Ok(())
    }
}
