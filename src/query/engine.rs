//! Query Engine
//! Read-only reductions over the posts table: proportions, means, grouped
//! counts and multi-column aggregations. Every query clones the (cheap,
//! Arc-backed) frame into a lazy plan and never mutates its input.

use polars::prelude::*;
use regex::Regex;
use thiserror::Error;

/// Column holding group sizes in count-style outputs.
pub const COUNT_COLUMN: &str = "count";
/// Column holding normalized counts in value-count outputs.
pub const PROPORTION_COLUMN: &str = "proportion";

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Invalid text pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("No rows to aggregate for '{0}'")]
    Empty(String),
}

/// Aggregation applied to one column within each group. Output columns are
/// named `{column}_{suffix}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Mean,
}

impl Aggregation {
    fn apply(self, column: &str) -> Expr {
        let expr = match self {
            Aggregation::Mean => col(column).cast(DataType::Float64).mean(),
        };
        expr.alias(format!("{}_{}", column, self.suffix()))
    }

    fn suffix(self) -> &'static str {
        match self {
            Aggregation::Mean => "mean",
        }
    }
}

fn key_exprs(keys: &[&str]) -> Vec<Expr> {
    keys.iter().map(|k| col(*k)).collect()
}

/// Read-only queries over a `DataFrame`.
pub struct QueryEngine;

impl QueryEngine {
    /// Fraction of rows for which `predicate` holds. Null predicate results
    /// are excluded from both numerator and denominator.
    pub fn proportion(df: &DataFrame, predicate: Expr) -> Result<f64, QueryError> {
        let out = df
            .clone()
            .lazy()
            .select([predicate.cast(DataType::Float64).mean().alias("value")])
            .collect()?;
        Self::scalar(&out, "value")?.ok_or_else(|| QueryError::Empty("predicate".to_string()))
    }

    /// Mean of a numeric (or boolean) column.
    pub fn mean(df: &DataFrame, column: &str) -> Result<f64, QueryError> {
        let out = df
            .clone()
            .lazy()
            .select([col(column).cast(DataType::Float64).mean().alias("value")])
            .collect()?;
        Self::scalar(&out, "value")?.ok_or_else(|| QueryError::Empty(column.to_string()))
    }

    /// Rows satisfying `predicate`.
    pub fn filter(df: &DataFrame, predicate: Expr) -> Result<DataFrame, QueryError> {
        Ok(df.clone().lazy().filter(predicate).collect()?)
    }

    /// Rows whose text `column` matches `pattern` anywhere in the value.
    pub fn filter_matching(
        df: &DataFrame,
        column: &str,
        pattern: &Regex,
    ) -> Result<DataFrame, QueryError> {
        let text = df.column(column)?.cast(&DataType::String)?;
        let mask: BooleanChunked = text
            .str()?
            .into_iter()
            .map(|value| Some(value.is_some_and(|s| pattern.is_match(s))))
            .collect();
        Ok(df.filter(&mask)?)
    }

    /// Projection onto a subset of columns.
    pub fn select(df: &DataFrame, columns: &[&str]) -> Result<DataFrame, QueryError> {
        Ok(df.select(columns.iter().copied())?)
    }

    /// Distinct values of `column` with their counts and share of all rows,
    /// most frequent first.
    pub fn value_counts(df: &DataFrame, column: &str) -> Result<DataFrame, QueryError> {
        if df.height() == 0 {
            return Err(QueryError::Empty(column.to_string()));
        }
        let total = df.height() as f64;

        Ok(df
            .clone()
            .lazy()
            .group_by([col(column)])
            .agg([len().alias(COUNT_COLUMN)])
            .with_column(
                (col(COUNT_COLUMN).cast(DataType::Float64) / lit(total)).alias(PROPORTION_COLUMN),
            )
            .sort_by_exprs(
                [col(COUNT_COLUMN), col(column)],
                SortMultipleOptions::default().with_order_descending_multi([true, false]),
            )
            .collect()?)
    }

    /// Value counts of `column` within each `key` group, normalized by the
    /// group size.
    pub fn grouped_value_counts(
        df: &DataFrame,
        key: &str,
        column: &str,
    ) -> Result<DataFrame, QueryError> {
        let counts = df
            .clone()
            .lazy()
            .group_by([col(key), col(column)])
            .agg([len().alias(COUNT_COLUMN)]);
        let totals = df
            .clone()
            .lazy()
            .group_by([col(key)])
            .agg([len().alias("group_total")]);

        Ok(counts
            .join(totals, [col(key)], [col(key)], JoinArgs::new(JoinType::Inner))
            .with_column(
                (col(COUNT_COLUMN).cast(DataType::Float64)
                    / col("group_total").cast(DataType::Float64))
                .alias(PROPORTION_COLUMN),
            )
            .select([col(key), col(column), col(COUNT_COLUMN), col(PROPORTION_COLUMN)])
            .sort_by_exprs([col(key), col(column)], SortMultipleOptions::default())
            .collect()?)
    }

    /// Mean of `column` per distinct combination of `keys`. Groups with no
    /// rows produce no output row.
    pub fn grouped_mean(
        df: &DataFrame,
        keys: &[&str],
        column: &str,
    ) -> Result<DataFrame, QueryError> {
        let keys = key_exprs(keys);
        Ok(df
            .clone()
            .lazy()
            .group_by(keys.clone())
            .agg([col(column).cast(DataType::Float64).mean()])
            .sort_by_exprs(keys, SortMultipleOptions::default())
            .collect()?)
    }

    /// Non-null count of `column` per distinct combination of `keys`.
    pub fn grouped_count(
        df: &DataFrame,
        keys: &[&str],
        column: &str,
    ) -> Result<DataFrame, QueryError> {
        let keys = key_exprs(keys);
        Ok(df
            .clone()
            .lazy()
            .group_by(keys.clone())
            .agg([col(column).count().alias(COUNT_COLUMN)])
            .sort_by_exprs(keys, SortMultipleOptions::default())
            .collect()?)
    }

    /// Several aggregations over several columns in one pass. Output columns
    /// are named `{column}_{aggregation}`.
    pub fn grouped_agg(
        df: &DataFrame,
        keys: &[&str],
        aggregations: &[(&str, Aggregation)],
    ) -> Result<DataFrame, QueryError> {
        let keys = key_exprs(keys);
        let aggs: Vec<Expr> = aggregations
            .iter()
            .map(|(column, agg)| agg.apply(column))
            .collect();
        Ok(df
            .clone()
            .lazy()
            .group_by(keys.clone())
            .agg(aggs)
            .sort_by_exprs(keys, SortMultipleOptions::default())
            .collect()?)
    }

    /// Groups of `key` whose mean of `column` is exactly `target`, e.g. the
    /// groups where every row of a boolean column is true when `target` is 1.0.
    pub fn groups_with_mean(
        df: &DataFrame,
        key: &str,
        column: &str,
        target: f64,
    ) -> Result<DataFrame, QueryError> {
        let means = Self::grouped_mean(df, &[key], column)?;
        Ok(means.lazy().filter(col(column).eq(lit(target))).collect()?)
    }

    /// Values of `column` split by the distinct values of `key`, keys sorted.
    pub fn values_by_group(
        df: &DataFrame,
        key: &str,
        column: &str,
    ) -> Result<Vec<(String, Vec<f64>)>, QueryError> {
        let keys = df.column(key)?.cast(&DataType::String)?;
        let values = df.column(column)?.cast(&DataType::Float64)?;

        let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
        for (k, v) in keys.str()?.into_iter().zip(values.f64()?.into_iter()) {
            let (Some(k), Some(v)) = (k, v) else {
                continue;
            };
            if v.is_nan() {
                continue;
            }
            match groups.iter_mut().find(|(name, _)| name == k) {
                Some((_, vals)) => vals.push(v),
                None => groups.push((k.to_string(), vec![v])),
            }
        }
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(groups)
    }

    /// First value of a Float64 column, `None` when the column is empty or null.
    pub fn scalar(df: &DataFrame, column: &str) -> Result<Option<f64>, QueryError> {
        let values = df.column(column)?.cast(&DataType::Float64)?;
        Ok(values.f64()?.get(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn posts() -> DataFrame {
        df!(
            "platform" => ["Reddit", "Twitter", "Reddit", "Telegram", "Twitter", "Reddit"],
            "city" => ["Munich", "Berlin", "Manchester", "Mumbai", "Madrid", "Lyon"],
            "score" => [0.9, 0.2, 0.6, 0.7, 0.4, 0.1],
            "engagement" => [6000.0, 7000.0, 4000.0, 8000.0, 5500.0, 9000.0],
            "flag" => [true, false, true, true, false, false]
        )
        .unwrap()
    }

    fn f64s(df: &DataFrame, column: &str) -> Vec<f64> {
        df.column(column)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect()
    }

    fn strings(df: &DataFrame, column: &str) -> Vec<String> {
        df.column(column)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap().to_string())
            .collect()
    }

    #[test]
    fn proportion_of_predicate() {
        let p = QueryEngine::proportion(&posts(), col("score").gt(lit(0.5))).unwrap();
        assert!((p - 0.5).abs() < 1e-12);
    }

    #[test]
    fn proportion_of_empty_table_is_an_error() {
        let empty = posts().head(Some(0));
        assert!(matches!(
            QueryEngine::proportion(&empty, col("flag")),
            Err(QueryError::Empty(_))
        ));
    }

    #[test]
    fn mean_of_boolean_column() {
        let m = QueryEngine::mean(&posts(), "flag").unwrap();
        assert!((m - 0.5).abs() < 1e-12);
    }

    #[test]
    fn grouped_mean_sorted_by_key() {
        let out = QueryEngine::grouped_mean(&posts(), &["platform"], "score").unwrap();
        assert_eq!(strings(&out, "platform"), vec!["Reddit", "Telegram", "Twitter"]);
        let means = f64s(&out, "score");
        assert!((means[0] - 1.6 / 3.0).abs() < 1e-12);
        assert!((means[1] - 0.7).abs() < 1e-12);
        assert!((means[2] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn filter_then_group_matches_group_of_subset() {
        let df = posts();
        let predicate = col("score").gt(lit(0.3));
        let filtered = QueryEngine::filter(&df, predicate.clone()).unwrap();
        let via_engine = QueryEngine::grouped_mean(&filtered, &["platform"], "engagement").unwrap();

        let manual = df
            .clone()
            .lazy()
            .filter(predicate)
            .group_by([col("platform")])
            .agg([col("engagement").mean()])
            .sort_by_exprs([col("platform")], SortMultipleOptions::default())
            .collect()
            .unwrap();
        assert!(via_engine.equals(&manual));
    }

    #[test]
    fn empty_groups_produce_no_rows() {
        let filtered = QueryEngine::filter(&posts(), col("score").gt(lit(0.65))).unwrap();
        let out = QueryEngine::grouped_count(&filtered, &["platform"], "score").unwrap();
        // Twitter has no score above 0.65 and must not appear as a zero row
        assert_eq!(strings(&out, "platform"), vec!["Reddit", "Telegram"]);
    }

    #[test]
    fn value_counts_are_fractions() {
        let out = QueryEngine::value_counts(&posts(), "platform").unwrap();
        assert_eq!(strings(&out, "platform")[0], "Reddit");
        let proportions = f64s(&out, PROPORTION_COLUMN);
        assert!((proportions.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((proportions[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn grouped_value_counts_normalize_within_group() {
        let out = QueryEngine::grouped_value_counts(&posts(), "platform", "flag").unwrap();
        // Reddit: false 1/3, true 2/3; Telegram: true 1; Twitter: false 1
        let proportions = f64s(&out, PROPORTION_COLUMN);
        assert_eq!(out.height(), 4);
        assert!((proportions[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((proportions[1] - 2.0 / 3.0).abs() < 1e-12);
        assert!((proportions[2] - 1.0).abs() < 1e-12);
        assert!((proportions[3] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn regex_filter_combined_with_threshold() {
        let pattern = Regex::new("M").unwrap();
        let m_cities = QueryEngine::filter_matching(&posts(), "city", &pattern).unwrap();
        let busy = QueryEngine::filter(&m_cities, col("engagement").gt(lit(5000.0))).unwrap();
        let out = QueryEngine::grouped_mean(&busy, &["city"], "engagement").unwrap();
        assert_eq!(strings(&out, "city"), vec!["Madrid", "Mumbai", "Munich"]);
    }

    #[test]
    fn multi_key_multi_column_aggregation() {
        let out = QueryEngine::grouped_agg(
            &posts(),
            &["platform", "flag"],
            &[("score", Aggregation::Mean), ("engagement", Aggregation::Mean)],
        )
        .unwrap();
        assert_eq!(out.height(), 4);
        assert!(out.column("score_mean").is_ok());
        assert!(out.column("engagement_mean").is_ok());
    }

    #[test]
    fn groups_where_every_row_is_true() {
        let out = QueryEngine::groups_with_mean(&posts(), "platform", "flag", 1.0).unwrap();
        assert_eq!(strings(&out, "platform"), vec!["Telegram"]);
    }

    #[test]
    fn values_by_group_keeps_all_values() {
        let groups = QueryEngine::values_by_group(&posts(), "platform", "score").unwrap();
        let names: Vec<&str> = groups.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Reddit", "Telegram", "Twitter"]);
        assert_eq!(groups[0].1, vec![0.9, 0.6, 0.1]);
    }

    #[test]
    fn queries_do_not_mutate_input() {
        let df = posts();
        let before = df.clone();
        let _ = QueryEngine::grouped_value_counts(&df, "platform", "flag").unwrap();
        let _ = QueryEngine::filter(&df, col("flag")).unwrap();
        assert!(df.equals(&before));
    }
}
