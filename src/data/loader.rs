//! CSV Data Loader Module
//! Reads the posts CSV with Polars, validates the schema by column name and
//! coerces every required column to its semantic type.

use crate::data::schema::{self, ColumnKind, REQUIRED_COLUMNS};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Input file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Schema mismatch, missing columns: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },
    #[error("Column '{column}' should be {expected}, found {found}")]
    ColumnType {
        column: String,
        expected: &'static str,
        found: String,
    },
    #[error("Unparseable timestamp '{value}' at row {row}")]
    DateParse { row: usize, value: String },
    #[error("Column '{column}' has non-boolean value '{value}' at row {row}")]
    FlagParse {
        column: String,
        row: usize,
        value: String,
    },
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Loads the posts table.
pub struct DataLoader;

impl DataLoader {
    /// Load a CSV file using Polars and coerce it into the Post table.
    pub fn load_csv(file_path: &Path) -> Result<DataFrame, LoaderError> {
        if !file_path.exists() {
            return Err(LoaderError::NotFound(file_path.to_path_buf()));
        }

        info!("Loading dataset from {}", file_path.display());
        let raw = LazyCsvReader::new(file_path)
            .with_has_header(true)
            .with_infer_schema_length(Some(10000))
            .finish()?
            .collect()?;
        debug!("Raw CSV shape: {:?}", raw.shape());

        let df = Self::from_frame(&raw)?;
        Self::log_summary(&df);
        Ok(df)
    }

    /// Select the required columns from an already-read frame by name and
    /// coerce their types. Extra columns are dropped.
    pub fn from_frame(raw: &DataFrame) -> Result<DataFrame, LoaderError> {
        let missing = schema::missing_columns(
            raw.get_column_names().iter().map(|name| name.as_str()),
        );
        if !missing.is_empty() {
            return Err(LoaderError::SchemaMismatch {
                missing: missing.into_iter().map(String::from).collect(),
            });
        }

        let mut columns = Vec::with_capacity(REQUIRED_COLUMNS.len());
        for spec in REQUIRED_COLUMNS.iter() {
            let source = raw.column(spec.name)?.as_materialized_series();
            let series = match spec.kind {
                ColumnKind::Text => source.cast(&DataType::String)?,
                ColumnKind::Numeric => {
                    Self::require_numeric(source)?;
                    source.cast(&DataType::Float64)?
                }
                ColumnKind::Count => {
                    Self::require_numeric(source)?;
                    source.cast(&DataType::Int64)?
                }
                ColumnKind::Flag => Self::normalize_flag(source)?,
                ColumnKind::Timestamp => Self::parse_timestamps(source)?,
            };
            let name = schema::output_name(spec.name);
            columns.push(series.with_name(name.into()).into_column());
        }

        Ok(DataFrame::new(columns)?)
    }

    fn is_numeric(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Float32
                | DataType::Float64
                | DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    fn require_numeric(series: &Series) -> Result<(), LoaderError> {
        if Self::is_numeric(series.dtype()) {
            Ok(())
        } else {
            Err(LoaderError::ColumnType {
                column: series.name().to_string(),
                expected: "numeric",
                found: series.dtype().to_string(),
            })
        }
    }

    /// Normalize booleans, 0/1 integers and true/false style strings to Boolean.
    fn normalize_flag(series: &Series) -> Result<Series, LoaderError> {
        let name = series.name().clone();
        match series.dtype() {
            DataType::Boolean => Ok(series.clone()),
            dtype if Self::is_numeric(dtype) => {
                let values = series.cast(&DataType::Float64)?;
                let flags: Vec<Option<bool>> = values
                    .f64()?
                    .into_iter()
                    .map(|v| v.map(|x| x != 0.0))
                    .collect();
                Ok(Series::new(name, flags))
            }
            DataType::String => {
                let mut flags: Vec<Option<bool>> = Vec::with_capacity(series.len());
                for (row, value) in series.str()?.into_iter().enumerate() {
                    let Some(value) = value else {
                        flags.push(None);
                        continue;
                    };
                    let flag = parse_flag(value).ok_or_else(|| LoaderError::FlagParse {
                        column: name.to_string(),
                        row,
                        value: value.to_string(),
                    })?;
                    flags.push(Some(flag));
                }
                Ok(Series::new(name, flags))
            }
            other => Err(LoaderError::ColumnType {
                column: name.to_string(),
                expected: "boolean",
                found: other.to_string(),
            }),
        }
    }

    /// Convert the timestamp column to a millisecond Datetime.
    fn parse_timestamps(series: &Series) -> Result<Series, LoaderError> {
        let target = DataType::Datetime(TimeUnit::Milliseconds, None);
        match series.dtype() {
            DataType::Datetime(..) | DataType::Date => Ok(series.cast(&target)?),
            DataType::String => {
                let mut millis: Vec<Option<i64>> = Vec::with_capacity(series.len());
                for (row, value) in series.str()?.into_iter().enumerate() {
                    let Some(value) = value else {
                        millis.push(None);
                        continue;
                    };
                    let parsed = parse_timestamp_millis(value).ok_or_else(|| {
                        LoaderError::DateParse {
                            row,
                            value: value.to_string(),
                        }
                    })?;
                    millis.push(Some(parsed));
                }
                Ok(Series::new(series.name().clone(), millis).cast(&target)?)
            }
            other => Err(LoaderError::ColumnType {
                column: series.name().to_string(),
                expected: "timestamp text",
                found: other.to_string(),
            }),
        }
    }

    fn log_summary(df: &DataFrame) {
        let (rows, cols) = df.shape();
        info!("Dataset loaded: {} rows x {} columns", rows, cols);

        for column in df.get_columns() {
            debug!("  {:<28} {}", column.name(), column.dtype());
        }

        let nulls: Vec<String> = df
            .get_columns()
            .iter()
            .filter(|column| column.null_count() > 0)
            .map(|column| format!("{}={}", column.name(), column.null_count()))
            .collect();
        if !nulls.is_empty() {
            warn!("Dataset contains null values: {}", nulls.join(", "));
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" | "1.0" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "0.0" => Some(false),
        _ => None,
    }
}

/// Parse a timestamp string into milliseconds since the Unix epoch.
pub fn parse_timestamp_millis(value: &str) -> Option<i64> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}
