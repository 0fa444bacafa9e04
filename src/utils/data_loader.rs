//! CSV loading and saving, and conversion of frames into raw records

use crate::error::{PredictorError, Result};
use crate::features::RawRecord;
use polars::prelude::*;
use serde_json::Value;
use std::fs::File;
use std::path::Path;

/// CSV loader
pub struct DataLoader {
    /// Rows scanned to infer column types
    infer_schema_length: Option<usize>,
    /// Cell values read as null
    null_values: Vec<String>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(10_000),
            null_values: vec!["NA".to_string(), String::new()],
        }
    }

    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    pub fn with_null_values(mut self, values: Vec<String>) -> Self {
        self.null_values = values;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PredictorError::Data(format!("{}: {}", path.display(), e)))?;

        let null_values = (!self.null_values.is_empty()).then(|| {
            NullValues::AllColumns(self.null_values.iter().map(|v| v.as_str().into()).collect())
        });
        let parse_opts = CsvParseOptions::default().with_null_values(null_values);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()?;

        tracing::debug!(path = %path.display(), rows = df.height(), cols = df.width(), "CSV loaded");
        Ok(df)
    }
}

/// Save frames to disk
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV with a header row
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path.as_ref())?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        Ok(())
    }
}

fn any_to_json(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Float64(v) => Value::from(v),
        AnyValue::Float32(v) => Value::from(v as f64),
        AnyValue::String(v) => Value::from(v),
        AnyValue::StringOwned(v) => Value::from(v.as_str()),
        other => match other.extract::<f64>() {
            Some(v) => Value::from(v),
            None => Value::from(other.to_string()),
        },
    }
}

/// One [`RawRecord`] per frame row, keyed by column name.
///
/// Null cells are left out so they read as missing fields.
pub fn dataframe_to_records(df: &DataFrame) -> Result<Vec<RawRecord>> {
    let mut records = vec![RawRecord::new(); df.height()];
    for col in df.get_columns() {
        let name = col.name().to_string();
        for (i, record) in records.iter_mut().enumerate() {
            let value = any_to_json(col.get(i)?);
            if !value.is_null() {
                record.insert(name.clone(), value);
            }
        }
    }
    Ok(records)
}

/// Column cast to f64, nulls kept as `None`
pub fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PredictorError::Data(format!("column '{}' not found", name)))?;
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}
