//! Contingency Tables
//! Cross-tabulation of two categorical columns, with optional normalization
//! and `Total` margins.

use crate::stats::StatsError;
use polars::prelude::*;
use serde::Serialize;

/// Label used for the margin row and column.
pub const MARGINS_NAME: &str = "Total";

/// Joint frequency counts of two categorical columns. Labels are sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct Crosstab {
    pub row_variable: String,
    pub column_variable: String,
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    pub counts: Vec<Vec<u64>>,
}

/// A crosstab as proportions of the grand total, margins included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedCrosstab {
    pub row_variable: String,
    pub column_variable: String,
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    /// Last row and last column are the `Total` margins.
    pub values: Vec<Vec<f64>>,
}

fn label(value: &AnyValue) -> String {
    value.to_string().trim_matches('"').to_string()
}

impl Crosstab {
    /// Count co-occurrences of `row_col` and `column_col`. Rows where either
    /// value is null are skipped.
    pub fn from_columns(
        df: &DataFrame,
        row_col: &str,
        column_col: &str,
    ) -> Result<Self, StatsError> {
        let rows = df.column(row_col)?.as_materialized_series();
        let cols = df.column(column_col)?.as_materialized_series();

        let pairs: Vec<(String, String)> = rows
            .iter()
            .zip(cols.iter())
            .filter(|(r, c)| !r.is_null() && !c.is_null())
            .map(|(r, c)| (label(&r), label(&c)))
            .collect();

        let mut row_labels: Vec<String> = pairs.iter().map(|(r, _)| r.clone()).collect();
        row_labels.sort();
        row_labels.dedup();
        let mut column_labels: Vec<String> = pairs.iter().map(|(_, c)| c.clone()).collect();
        column_labels.sort();
        column_labels.dedup();

        let mut counts = vec![vec![0u64; column_labels.len()]; row_labels.len()];
        for (r, c) in &pairs {
            // labels were built from these pairs, so both lookups succeed
            if let (Ok(i), Ok(j)) = (row_labels.binary_search(r), column_labels.binary_search(c)) {
                counts[i][j] += 1;
            }
        }

        Ok(Self {
            row_variable: row_col.to_string(),
            column_variable: column_col.to_string(),
            row_labels,
            column_labels,
            counts,
        })
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn row_totals(&self) -> Vec<u64> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn column_totals(&self) -> Vec<u64> {
        (0..self.column_labels.len())
            .map(|j| self.counts.iter().map(|row| row[j]).sum())
            .collect()
    }

    /// Divide every cell by the grand total and append `Total` margins.
    pub fn normalized(&self) -> Result<NormalizedCrosstab, StatsError> {
        let total = self.total();
        if total == 0 {
            return Err(StatsError::NotApplicable(format!(
                "crosstab of '{}' and '{}' has no observations",
                self.row_variable, self.column_variable
            )));
        }
        let n = total as f64;

        let mut values: Vec<Vec<f64>> = self
            .counts
            .iter()
            .zip(self.row_totals())
            .map(|(row, row_total)| {
                let mut cells: Vec<f64> = row.iter().map(|&c| c as f64 / n).collect();
                cells.push(row_total as f64 / n);
                cells
            })
            .collect();
        let mut margin: Vec<f64> = self
            .column_totals()
            .into_iter()
            .map(|c| c as f64 / n)
            .collect();
        margin.push(1.0);
        values.push(margin);

        let mut row_labels = self.row_labels.clone();
        row_labels.push(MARGINS_NAME.to_string());
        let mut column_labels = self.column_labels.clone();
        column_labels.push(MARGINS_NAME.to_string());

        Ok(NormalizedCrosstab {
            row_variable: self.row_variable.clone(),
            column_variable: self.column_variable.clone(),
            row_labels,
            column_labels,
            values,
        })
    }
}

impl NormalizedCrosstab {
    pub fn to_frame(&self) -> Result<DataFrame, StatsError> {
        let mut columns = vec![Column::new(
            self.row_variable.as_str().into(),
            self.row_labels.clone(),
        )];
        for (j, name) in self.column_labels.iter().enumerate() {
            let cells: Vec<f64> = self.values.iter().map(|row| row[j]).collect();
            columns.push(Column::new(name.as_str().into(), cells));
        }
        Ok(DataFrame::new(columns)?)
    }

    /// Cells without the margins, for heatmaps.
    pub fn body(&self) -> Vec<Vec<f64>> {
        let rows = self.values.len().saturating_sub(1);
        self.values[..rows]
            .iter()
            .map(|row| row[..row.len().saturating_sub(1)].to_vec())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame() -> DataFrame {
        df!(
            "model" => ["gpt", "human", "gpt", "llama", "human", "gpt"],
            "ai" => [true, false, true, false, true, false]
        )
        .unwrap()
    }

    #[test]
    fn counts_with_sorted_labels() {
        let ct = Crosstab::from_columns(&frame(), "model", "ai").unwrap();
        assert_eq!(ct.row_labels, vec!["gpt", "human", "llama"]);
        assert_eq!(ct.column_labels, vec!["false", "true"]);
        assert_eq!(ct.counts, vec![vec![1, 2], vec![1, 1], vec![1, 0]]);
        assert_eq!(ct.total(), 6);
        assert_eq!(ct.row_totals(), vec![3, 2, 1]);
        assert_eq!(ct.column_totals(), vec![3, 3]);
    }

    #[test]
    fn normalized_with_margins() {
        let ct = Crosstab::from_columns(&frame(), "model", "ai").unwrap();
        let norm = ct.normalized().unwrap();
        assert_eq!(norm.row_labels.last().unwrap(), MARGINS_NAME);
        assert_eq!(norm.column_labels.last().unwrap(), MARGINS_NAME);
        assert_eq!(norm.values[3][2], 1.0);
        assert!((norm.values[0][1] - 2.0 / 6.0).abs() < 1e-12);
        assert!((norm.values[0][2] - 0.5).abs() < 1e-12);
        assert_eq!(norm.body().len(), 3);
        assert_eq!(norm.body()[0].len(), 2);
    }

    #[test]
    fn marginal_share_of_detected_posts() {
        let mut flags = vec![true; 242];
        flags.extend(vec![false; 258]);
        let misinfo: Vec<bool> = (0..500).map(|i| i % 2 == 0).collect();
        let df = df!("is_misinformation" => misinfo, "detected_AI" => flags).unwrap();

        let ct = Crosstab::from_columns(&df, "is_misinformation", "detected_AI").unwrap();
        assert_eq!(ct.total(), 500);
        let norm = ct.normalized().unwrap();
        let total_row = norm.values.last().unwrap();
        let ai = norm.column_labels.iter().position(|l| l == "true").unwrap();
        assert!((total_row[ai] - 0.484).abs() < 1e-12);
    }

    #[test]
    fn frame_has_one_column_per_label() {
        let ct = Crosstab::from_columns(&frame(), "model", "ai").unwrap();
        assert_eq!(ct.counts.len(), 3);
        let norm = ct.normalized().unwrap().to_frame().unwrap();
        assert_eq!(norm.shape(), (4, 4));
        assert!(norm.column(MARGINS_NAME).is_ok());
    }
}
