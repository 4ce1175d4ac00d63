use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use ndarray::{Array1, Array2};
use sieve_types::{validation_error, DataError, Dataset, SieveResult, TrainValidSplit};

/// Loads a headed CSV into a [`Dataset`]: one named target column, every
/// other column parsed as an `f64` feature.
#[derive(Debug, Clone)]
pub struct CsvDatasetLoader {
    target_column: String,
    delimiter: u8,
}

impl CsvDatasetLoader {
    pub fn new(target_column: impl Into<String>) -> Self {
        Self {
            target_column: target_column.into(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Load a CSV file from disk
    pub fn load<P: AsRef<Path>>(&self, file_path: P) -> SieveResult<Dataset> {
        let path = file_path.as_ref();
        tracing::info!("Loading CSV data from: {}", path.display());

        let file = std::fs::File::open(path).map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to open CSV file {}: {}", path.display(), e),
        })?;
        let dataset = self.load_reader(file)?;

        tracing::info!(
            "Loaded {} rows x {} features from {}",
            dataset.n_rows(),
            dataset.n_features(),
            path.display()
        );
        Ok(dataset)
    }

    /// Load from any reader, e.g. an in-memory buffer.
    pub fn load_reader<R: Read>(&self, reader: R) -> SieveResult<Dataset> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to read CSV headers: {}", e),
            })?
            .clone();
        tracing::debug!("CSV headers: {:?}", headers);

        let target_idx = headers
            .iter()
            .position(|h| h == self.target_column)
            .ok_or_else(|| DataError::ColumnNotFound {
                column: self.target_column.clone(),
            })?;
        let feature_names: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != target_idx)
            .map(|(_, h)| h.to_string())
            .collect();

        let mut values = Vec::new();
        let mut target = Vec::new();
        for (line_num, result) in rdr.records().enumerate() {
            // header is line 1
            let line = line_num + 2;
            let record = result.map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to read CSV record at line {}: {}", line, e),
            })?;
            if record.len() != headers.len() {
                return Err(DataError::ParseError {
                    message: format!(
                        "line {} has {} fields, header has {}",
                        line,
                        record.len(),
                        headers.len()
                    ),
                }
                .into());
            }
            for (i, field) in record.iter().enumerate() {
                let value = parse_f64(field, &headers[i], line)?;
                if i == target_idx {
                    target.push(value);
                } else {
                    values.push(value);
                }
            }
        }

        let n_rows = target.len();
        let features = Array2::from_shape_vec((n_rows, feature_names.len()), values).map_err(|e| {
            DataError::ShapeMismatch {
                expected: format!("{} x {}", n_rows, feature_names.len()),
                actual: e.to_string(),
            }
        })?;
        Dataset::new(feature_names, features, Array1::from(target))
    }

    /// Load one file and hold out the trailing `valid_fraction` of rows for
    /// validation. Row order is preserved.
    pub fn load_split<P: AsRef<Path>>(
        &self,
        file_path: P,
        valid_fraction: f64,
    ) -> SieveResult<TrainValidSplit> {
        let dataset = self.load(file_path)?;
        split_by_fraction(&dataset, valid_fraction)
    }

    /// Load separate training and validation files.
    pub fn load_pair<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        train_path: P,
        valid_path: Q,
    ) -> SieveResult<TrainValidSplit> {
        TrainValidSplit::new(self.load(train_path)?, self.load(valid_path)?)
    }
}

/// Split `dataset` so that roughly `valid_fraction` of its rows, and at
/// least one, end up in validation.
pub fn split_by_fraction(dataset: &Dataset, valid_fraction: f64) -> SieveResult<TrainValidSplit> {
    if !(valid_fraction > 0.0 && valid_fraction < 1.0) {
        return Err(validation_error!(
            "valid_fraction must lie strictly between 0 and 1, got {}",
            valid_fraction
        ));
    }
    let n = dataset.n_rows();
    if n < 2 {
        return Err(DataError::Empty {
            message: format!("{} row(s) cannot be split into train and validation", n),
        }
        .into());
    }
    let n_valid = ((n as f64) * valid_fraction).round().clamp(1.0, (n - 1) as f64) as usize;
    let (train, valid) = dataset.split_at(n - n_valid)?;
    TrainValidSplit::new(train, valid)
}

fn parse_f64(value_str: &str, column: &str, line: usize) -> SieveResult<f64> {
    let trimmed = value_str.trim();
    if trimmed.is_empty() {
        return Err(DataError::ParseError {
            message: format!("Empty value for column {} at line {}", column, line),
        }
        .into());
    }
    trimmed.parse::<f64>().map_err(|e| {
        DataError::ParseError {
            message: format!(
                "Could not parse {} value '{}' at line {}: {}",
                column, value_str, line, e
            ),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_types::SieveError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CSV: &str = "a,y,b\n1.0,10,2\n2.0,20,4\n3.0,30,6\n4.0,40,8\n5.0,50,10\n";

    #[test]
    fn target_column_is_split_off() {
        let data = CsvDatasetLoader::new("y").load_reader(CSV.as_bytes()).unwrap();
        assert_eq!(data.feature_names, vec!["a", "b"]);
        assert_eq!(data.n_rows(), 5);
        assert_eq!(data.target[2], 30.0);
        assert_eq!(data.features[[4, 1]], 10.0);
    }

    #[test]
    fn missing_target_column() {
        let err = CsvDatasetLoader::new("label")
            .load_reader(CSV.as_bytes())
            .unwrap_err();
        assert!(matches!(err, SieveError::Data(DataError::ColumnNotFound { .. })));
    }

    #[test]
    fn bad_value_reports_line() {
        let err = CsvDatasetLoader::new("y")
            .load_reader("a,y\n1,2\nx,3\n".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn semicolon_delimiter() {
        let data = CsvDatasetLoader::new("y")
            .with_delimiter(b';')
            .load_reader("a;y\n1;2\n3;4\n".as_bytes())
            .unwrap();
        assert_eq!(data.feature_names, vec!["a"]);
        assert_eq!(data.target.to_vec(), vec![2.0, 4.0]);
    }

    #[test]
    fn file_split_keeps_order() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();

        let split = CsvDatasetLoader::new("y").load_split(file.path(), 0.4).unwrap();
        assert_eq!(split.train.n_rows(), 3);
        assert_eq!(split.valid.n_rows(), 2);
        assert_eq!(split.valid.target.to_vec(), vec![40.0, 50.0]);
        assert_eq!(split.feature_names(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn split_fraction_bounds() {
        let data = CsvDatasetLoader::new("y").load_reader(CSV.as_bytes()).unwrap();
        assert!(split_by_fraction(&data, 0.0).is_err());
        assert!(split_by_fraction(&data, 1.0).is_err());
        // tiny fractions still leave one validation row
        assert_eq!(split_by_fraction(&data, 0.01).unwrap().valid.n_rows(), 1);
    }
}
