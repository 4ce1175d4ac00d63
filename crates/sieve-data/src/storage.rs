//! Persistence of History tables so a search can be continued in a later
//! process.
//!
//! Both formats share one layout: a 0/1 membership column per feature, in
//! universe order, followed by the reserved metadata columns.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, UInt64Array, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use csv::{ReaderBuilder, WriterBuilder};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use sieve_types::{
    DataError, HistoryRow, HistoryTable, SieveError, SieveResult, RESERVED_COLUMNS,
};

/// Reject feature names that would collide with the metadata columns or
/// with each other.
fn check_feature_names(feature_names: &[String]) -> SieveResult<()> {
    let mut seen = HashSet::new();
    for name in feature_names {
        if RESERVED_COLUMNS.contains(&name.as_str()) {
            return Err(DataError::InvalidFormat {
                message: format!("feature name '{}' is reserved", name),
            }
            .into());
        }
        if !seen.insert(name.as_str()) {
            return Err(DataError::InvalidFormat {
                message: format!("duplicate feature name '{}'", name),
            }
            .into());
        }
    }
    Ok(())
}

/// Membership flags of one row over the table's universe.
fn membership(table: &HistoryTable, row: &HistoryRow) -> SieveResult<Vec<bool>> {
    let index = table.name_index();
    let set = table.row_feature_set(row, &index)?;
    Ok((0..table.feature_names.len())
        .map(|i| set.contains(i))
        .collect())
}

fn row_from_flags(
    feature_names: &[String],
    flags: &[bool],
    raw_score: f64,
    penalized_score: Option<f64>,
    iteration: usize,
) -> HistoryRow {
    let features: Vec<String> = feature_names
        .iter()
        .zip(flags)
        .filter(|(_, member)| **member)
        .map(|(name, _)| name.clone())
        .collect();
    HistoryRow {
        num_features: features.len(),
        features,
        raw_score,
        penalized_score,
        iteration,
    }
}

/// Feature names are every header that is not a reserved column; all
/// reserved columns must be present.
fn split_header(header: &[String]) -> SieveResult<(Vec<usize>, [usize; 4])> {
    let mut reserved = [usize::MAX; 4];
    let mut feature_cols = Vec::new();
    for (i, name) in header.iter().enumerate() {
        match RESERVED_COLUMNS.iter().position(|r| *r == name.as_str()) {
            Some(slot) => reserved[slot] = i,
            None => feature_cols.push(i),
        }
    }
    for (slot, &col) in reserved.iter().enumerate() {
        if col == usize::MAX {
            return Err(DataError::ColumnNotFound {
                column: RESERVED_COLUMNS[slot].to_string(),
            }
            .into());
        }
    }
    Ok((feature_cols, reserved))
}

fn parse_field<T: std::str::FromStr>(value: &str, column: &str, line: usize) -> SieveResult<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        DataError::ParseError {
            message: format!("Could not parse {} value '{}' at line {}: {}", column, value, line, e),
        }
        .into()
    })
}

fn parse_flag(value: &str, column: &str, line: usize) -> SieveResult<bool> {
    match value.trim() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(DataError::ParseError {
            message: format!("Membership flag {} at line {} is '{}'", column, line, other),
        }
        .into()),
    }
}

/// Write a History table as CSV. An empty `penalized_score` field means no
/// penalty was configured.
pub fn write_history_csv<P: AsRef<Path>>(table: &HistoryTable, path: P) -> SieveResult<()> {
    let path = path.as_ref();
    check_feature_names(&table.feature_names)?;

    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to create CSV file {}: {}", path.display(), e),
        })?;

    let mut header: Vec<&str> = table.feature_names.iter().map(String::as_str).collect();
    header.extend(RESERVED_COLUMNS);
    wtr.write_record(&header).map_err(csv_error)?;

    for row in &table.rows {
        let mut fields: Vec<String> = membership(table, row)?
            .into_iter()
            .map(|m| if m { "1" } else { "0" }.to_string())
            .collect();
        fields.push(row.num_features.to_string());
        fields.push(row.raw_score.to_string());
        fields.push(row.penalized_score.map(|s| s.to_string()).unwrap_or_default());
        fields.push(row.iteration.to_string());
        wtr.write_record(&fields).map_err(csv_error)?;
    }
    wtr.flush()?;

    tracing::info!("Wrote {} history rows to {}", table.len(), path.display());
    Ok(())
}

/// Read a History table written by [`write_history_csv`].
pub fn read_history_csv<P: AsRef<Path>>(path: P) -> SieveResult<HistoryTable> {
    let path = path.as_ref();
    tracing::info!("Loading history from: {}", path.display());

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to open CSV file {}: {}", path.display(), e),
        })?;
    let header: Vec<String> = rdr
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(str::to_string)
        .collect();
    let (feature_cols, [num_col, raw_col, pen_col, iter_col]) = split_header(&header)?;
    let feature_names: Vec<String> = feature_cols.iter().map(|&i| header[i].clone()).collect();

    let mut table = HistoryTable::new(feature_names);
    for (line_num, result) in rdr.records().enumerate() {
        let line = line_num + 2;
        let record = result.map_err(csv_error)?;
        let field = |i: usize| record.get(i).unwrap_or("");

        let flags = feature_cols
            .iter()
            .map(|&i| parse_flag(field(i), &header[i], line))
            .collect::<SieveResult<Vec<bool>>>()?;
        let penalized = match field(pen_col).trim() {
            "" => None,
            s => Some(parse_field::<f64>(s, "penalized_score", line)?),
        };
        let row = row_from_flags(
            &table.feature_names,
            &flags,
            parse_field(field(raw_col), "raw_score", line)?,
            penalized,
            parse_field(field(iter_col), "iteration", line)?,
        );
        let declared: usize = parse_field(field(num_col), "num_features", line)?;
        if declared != row.num_features {
            return Err(DataError::InvalidFormat {
                message: format!(
                    "line {} declares {} features but flags {}",
                    line, declared, row.num_features
                ),
            }
            .into());
        }
        table.rows.push(row);
    }

    table.validate()?;
    tracing::info!("Loaded {} history rows from {}", table.len(), path.display());
    Ok(table)
}

fn history_schema(feature_names: &[String]) -> Arc<Schema> {
    let mut fields: Vec<Field> = feature_names
        .iter()
        .map(|name| Field::new(name, DataType::UInt8, false))
        .collect();
    fields.push(Field::new("num_features", DataType::UInt64, false));
    fields.push(Field::new("raw_score", DataType::Float64, false));
    fields.push(Field::new("penalized_score", DataType::Float64, true));
    fields.push(Field::new("iteration", DataType::UInt64, false));
    Arc::new(Schema::new(fields))
}

/// Convert a History table into a single Arrow record batch.
pub fn history_to_record_batch(table: &HistoryTable) -> SieveResult<RecordBatch> {
    check_feature_names(&table.feature_names)?;
    let n_features = table.feature_names.len();

    let mut flag_columns: Vec<Vec<u8>> = vec![Vec::with_capacity(table.len()); n_features];
    for row in &table.rows {
        for (column, member) in flag_columns.iter_mut().zip(membership(table, row)?) {
            column.push(u8::from(member));
        }
    }

    let mut arrays: Vec<ArrayRef> = flag_columns
        .into_iter()
        .map(|c| Arc::new(UInt8Array::from(c)) as ArrayRef)
        .collect();
    arrays.push(Arc::new(UInt64Array::from_iter_values(
        table.rows.iter().map(|r| r.num_features as u64),
    )));
    arrays.push(Arc::new(Float64Array::from_iter_values(
        table.rows.iter().map(|r| r.raw_score),
    )));
    arrays.push(Arc::new(Float64Array::from(
        table.rows.iter().map(|r| r.penalized_score).collect::<Vec<_>>(),
    )));
    arrays.push(Arc::new(UInt64Array::from_iter_values(
        table.rows.iter().map(|r| r.iteration as u64),
    )));

    RecordBatch::try_new(history_schema(&table.feature_names), arrays)
        .map_err(|e| SieveError::Arrow(e.to_string()))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, index: usize, name: &str) -> SieveResult<&'a T> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| {
            DataError::InvalidFormat {
                message: format!("Invalid {} column in history file", name),
            }
            .into()
        })
}

/// Append the rows of one record batch to `table`.
fn append_record_batch(
    table: &mut HistoryTable,
    batch: &RecordBatch,
    feature_cols: &[usize],
    reserved: [usize; 4],
) -> SieveResult<()> {
    let [num_col, raw_col, pen_col, iter_col] = reserved;
    let flags = feature_cols
        .iter()
        .map(|&i| column::<UInt8Array>(batch, i, "membership"))
        .collect::<SieveResult<Vec<_>>>()?;
    let nums = column::<UInt64Array>(batch, num_col, "num_features")?;
    let raws = column::<Float64Array>(batch, raw_col, "raw_score")?;
    let pens = column::<Float64Array>(batch, pen_col, "penalized_score")?;
    let iters = column::<UInt64Array>(batch, iter_col, "iteration")?;

    for i in 0..batch.num_rows() {
        let member: Vec<bool> = flags.iter().map(|c| c.value(i) != 0).collect();
        let penalized = if pens.is_null(i) { None } else { Some(pens.value(i)) };
        let row = row_from_flags(
            &table.feature_names,
            &member,
            raws.value(i),
            penalized,
            iters.value(i) as usize,
        );
        if nums.value(i) as usize != row.num_features {
            return Err(DataError::InvalidFormat {
                message: format!(
                    "row {} declares {} features but flags {}",
                    i,
                    nums.value(i),
                    row.num_features
                ),
            }
            .into());
        }
        table.rows.push(row);
    }
    Ok(())
}

/// Write a History table as a Parquet file.
pub fn write_history_parquet<P: AsRef<Path>>(table: &HistoryTable, path: P) -> SieveResult<()> {
    let path = path.as_ref();
    let batch = history_to_record_batch(table)?;
    let file = File::create(path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .map_err(|e| SieveError::Parquet(e.to_string()))?;
    writer
        .write(&batch)
        .map_err(|e| SieveError::Parquet(e.to_string()))?;
    writer
        .close()
        .map_err(|e| SieveError::Parquet(e.to_string()))?;

    tracing::info!("Wrote {} history rows to {}", table.len(), path.display());
    Ok(())
}

/// Read a History table written by [`write_history_parquet`].
pub fn read_history_parquet<P: AsRef<Path>>(path: P) -> SieveResult<HistoryTable> {
    let path = path.as_ref();
    tracing::info!("Loading history from: {}", path.display());

    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
        DataError::LoadingFailed {
            message: format!("Failed to create Parquet reader for {}: {}", path.display(), e),
        }
    })?;
    let header: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let (feature_cols, reserved) = split_header(&header)?;
    let reader = builder.build().map_err(|e| DataError::LoadingFailed {
        message: format!("Failed to build Parquet reader: {}", e),
    })?;

    let mut table = HistoryTable::new(feature_cols.iter().map(|&i| header[i].clone()).collect());
    for batch_result in reader {
        let batch = batch_result.map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to read Parquet batch: {}", e),
        })?;
        append_record_batch(&mut table, &batch, &feature_cols, reserved)?;
    }

    table.validate()?;
    tracing::info!("Loaded {} history rows from {}", table.len(), path.display());
    Ok(table)
}

fn csv_error(e: csv::Error) -> SieveError {
    DataError::LoadingFailed {
        message: format!("CSV error: {}", e),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn table() -> HistoryTable {
        let mut table = HistoryTable::new(vec!["age".into(), "income".into(), "zip".into()]);
        table.rows.push(HistoryRow {
            features: vec!["age".into(), "zip".into()],
            num_features: 2,
            raw_score: 0.8125,
            penalized_score: Some(0.7125),
            iteration: 0,
        });
        table.rows.push(HistoryRow {
            features: vec!["income".into()],
            num_features: 1,
            raw_score: -1.5,
            penalized_score: None,
            iteration: 3,
        });
        table
    }

    #[test]
    fn csv_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.csv");
        write_history_csv(&table(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("age,income,zip,num_features,raw_score,penalized_score,iteration"));

        assert_eq!(read_history_csv(&path).unwrap(), table());
    }

    #[test]
    fn parquet_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.parquet");
        write_history_parquet(&table(), &path).unwrap();
        assert_eq!(read_history_parquet(&path).unwrap(), table());
    }

    #[test]
    fn empty_table_round_trips() {
        let dir = tempdir().unwrap();
        let empty = HistoryTable::new(vec!["a".into(), "b".into()]);

        let csv_path = dir.path().join("empty.csv");
        write_history_csv(&empty, &csv_path).unwrap();
        assert_eq!(read_history_csv(&csv_path).unwrap(), empty);

        let pq_path = dir.path().join("empty.parquet");
        write_history_parquet(&empty, &pq_path).unwrap();
        assert_eq!(read_history_parquet(&pq_path).unwrap(), empty);
    }

    #[test]
    fn reserved_feature_names_rejected() {
        let dir = tempdir().unwrap();
        let bad = HistoryTable::new(vec!["raw_score".into()]);
        assert!(write_history_csv(&bad, dir.path().join("bad.csv")).is_err());
        assert!(history_to_record_batch(&bad).is_err());
    }

    #[test]
    fn inconsistent_count_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.csv");
        std::fs::write(
            &path,
            "a,b,num_features,raw_score,penalized_score,iteration\n1,1,1,0.5,,0\n",
        )
        .unwrap();
        assert!(read_history_csv(&path).is_err());
    }

    #[test]
    fn missing_metadata_column_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.csv");
        std::fs::write(&path, "a,b,num_features,raw_score\n1,0,1,0.5\n").unwrap();
        let err = read_history_csv(&path).unwrap_err();
        assert!(matches!(err, SieveError::Data(DataError::ColumnNotFound { .. })));
    }
}
