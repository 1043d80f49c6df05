//! Data Processor Module
//! Appends the derived columns (AI flag, total positivity, per-country
//! follower rank) to the loaded posts table.

use crate::data::schema::{
    AUTHOR_FOLLOWERS, COUNTRY, COUNTRY_FOLLOWER_RANK, DETECTED_AI, DETECTED_SYNTHETIC_SCORE,
    SENTIMENT_SCORE, TOTAL_POSITIVITY, TOXICITY_SCORE,
};
use polars::prelude::*;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Derived column '{0}' already present")]
    AlreadyDerived(&'static str),
}

/// Derives computed columns from the typed source columns.
pub struct DataProcessor;

impl DataProcessor {
    /// Return a new table with `detected_AI`, `total_positivity` and
    /// `country_follower_count_rank` appended. The input is left untouched.
    pub fn derive_columns(df: &DataFrame, ai_threshold: f64) -> Result<DataFrame, ProcessorError> {
        for name in [DETECTED_AI, TOTAL_POSITIVITY, COUNTRY_FOLLOWER_RANK] {
            if df.column(name).is_ok() {
                return Err(ProcessorError::AlreadyDerived(name));
            }
        }

        let mut derived = df
            .clone()
            .lazy()
            .with_columns([
                col(DETECTED_SYNTHETIC_SCORE)
                    .gt(lit(ai_threshold))
                    .alias(DETECTED_AI),
                (col(SENTIMENT_SCORE) - col(TOXICITY_SCORE)).alias(TOTAL_POSITIVITY),
            ])
            .collect()?;

        let ranks = Self::follower_ranks(df)?;
        derived.with_column(Series::new(COUNTRY_FOLLOWER_RANK.into(), ranks))?;

        debug!("Derived columns appended, width now {}", derived.width());
        Ok(derived)
    }

    /// Rank of `author_followers` within each country, highest first, ties
    /// resolved by row order.
    fn follower_ranks(df: &DataFrame) -> Result<Vec<Option<u32>>, ProcessorError> {
        let countries = df.column(COUNTRY)?.cast(&DataType::String)?;
        let followers = df.column(AUTHOR_FOLLOWERS)?.cast(&DataType::Float64)?;

        let keys: Vec<Option<String>> = countries
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect();
        let values: Vec<Option<f64>> = followers.f64()?.into_iter().collect();

        Ok(rank_within_groups(&keys, &values))
    }
}

/// Ordinal 1..=n ranking per key, descending by value, stable on row order.
/// Rows with a null key or value get no rank.
pub fn rank_within_groups<K>(keys: &[Option<K>], values: &[Option<f64>]) -> Vec<Option<u32>>
where
    K: std::hash::Hash + Eq,
{
    let mut groups: HashMap<&K, Vec<usize>> = HashMap::new();
    for (row, (key, value)) in keys.iter().zip(values).enumerate() {
        if let (Some(key), Some(_)) = (key, value) {
            groups.entry(key).or_default().push(row);
        }
    }

    let mut ranks = vec![None; keys.len()];
    for rows in groups.values_mut() {
        // sort_by is stable, so equal follower counts keep their row order
        rows.sort_by(|&a, &b| {
            let (va, vb) = (values[a].unwrap_or(f64::NAN), values[b].unwrap_or(f64::NAN));
            vb.partial_cmp(&va).unwrap_or(std::cmp::Ordering::Equal)
        });
        for (position, &row) in rows.iter().enumerate() {
            ranks[row] = Some(position as u32 + 1);
        }
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> DataFrame {
        df!(
            "country" => ["A", "B", "A", "A", "B"],
            "author_followers" => [100i64, 50, 200, 300, 400],
            "detected_synthetic_score" => [0.9, 0.5, 0.51, 0.1, 0.7],
            "sentiment_score" => [0.5, 0.2, 0.1, 0.9, 0.0],
            "toxicity_score" => [0.25, 0.2, 0.6, 0.4, 1.0]
        )
        .unwrap()
    }

    fn ranks(df: &DataFrame) -> Vec<Option<u32>> {
        df.column(COUNTRY_FOLLOWER_RANK)
            .unwrap()
            .u32()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn ranks_followers_within_country() {
        let df = DataProcessor::derive_columns(&sample(), 0.5).unwrap();
        // A: 100 -> 3, 200 -> 2, 300 -> 1; B: 50 -> 2, 400 -> 1
        assert_eq!(ranks(&df), vec![Some(3), Some(2), Some(2), Some(1), Some(1)]);
    }

    #[test]
    fn ties_keep_row_order() {
        let keys = vec![Some("X"), Some("X"), Some("Y"), Some("X")];
        let values = vec![Some(10.0), Some(20.0), Some(5.0), Some(20.0)];
        assert_eq!(
            rank_within_groups(&keys, &values),
            vec![Some(3), Some(1), Some(1), Some(2)]
        );
    }

    #[test]
    fn null_rows_are_unranked() {
        let keys = vec![Some("X"), None, Some("X")];
        let values = vec![Some(1.0), Some(2.0), None];
        assert_eq!(rank_within_groups(&keys, &values), vec![Some(1), None, None]);
    }

    #[test]
    fn detected_ai_is_strictly_above_threshold() {
        let df = DataProcessor::derive_columns(&sample(), 0.5).unwrap();
        let flags: Vec<Option<bool>> = df
            .column(DETECTED_AI)
            .unwrap()
            .bool()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            flags,
            vec![Some(true), Some(false), Some(true), Some(false), Some(true)]
        );
    }

    #[test]
    fn total_positivity_is_sentiment_minus_toxicity() {
        let df = DataProcessor::derive_columns(&sample(), 0.5).unwrap();
        let positivity = df.column(TOTAL_POSITIVITY).unwrap().f64().unwrap();
        let expected = [0.25, 0.0, -0.5, 0.5, -1.0];
        for (got, want) in positivity.into_iter().zip(expected) {
            assert!((got.unwrap() - want).abs() < 1e-12);
        }
    }

    #[test]
    fn deriving_twice_is_rejected() {
        let df = DataProcessor::derive_columns(&sample(), 0.5).unwrap();
        assert!(matches!(
            DataProcessor::derive_columns(&df, 0.5),
            Err(ProcessorError::AlreadyDerived(_))
        ));
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = DataProcessor::derive_columns(&sample(), 0.5).unwrap();
        let b = DataProcessor::derive_columns(&sample(), 0.5).unwrap();
        assert!(a.equals(&b));
    }
}
