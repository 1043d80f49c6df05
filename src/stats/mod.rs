//! Stats module - descriptive statistics, crosstabs and chi-squared tests

mod chi_square;
mod contingency;
pub mod descriptive;

use polars::prelude::PolarsError;
use thiserror::Error;

pub use chi_square::{ChiSquareResult, ChiSquareTest, SIGNIFICANCE_THRESHOLD};
pub use contingency::{Crosstab, NormalizedCrosstab, MARGINS_NAME};
pub use descriptive::{describe, histogram, GroupStats, HistogramBin};

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Test not applicable: {0}")]
    NotApplicable(String),
    #[error("Invalid distribution: {0}")]
    Distribution(String),
}
