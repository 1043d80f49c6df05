//! Chi-Squared Test of Independence
//! Pearson's test on a contingency table, with Yates' continuity correction
//! for 2x2 tables.

use crate::stats::{Crosstab, StatsError};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use tracing::debug;

/// Significance threshold for the independence test
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone, Serialize)]
pub struct ChiSquareResult {
    pub row_variable: String,
    pub column_variable: String,
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
    pub expected: Vec<Vec<f64>>,
    pub corrected: bool,
    pub significant: bool,
}

pub struct ChiSquareTest {
    /// Apply Yates' correction when the table has one degree of freedom.
    pub correction: bool,
    pub alpha: f64,
}

impl Default for ChiSquareTest {
    fn default() -> Self {
        Self {
            correction: true,
            alpha: SIGNIFICANCE_THRESHOLD,
        }
    }
}

impl ChiSquareTest {
    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            alpha,
            ..Self::default()
        }
    }

    /// Expected frequencies under independence.
    pub fn expected_frequencies(table: &Crosstab) -> Vec<Vec<f64>> {
        let total = table.total() as f64;
        let col_totals = table.column_totals();
        table
            .row_totals()
            .into_iter()
            .map(|r| {
                col_totals
                    .iter()
                    .map(|&c| r as f64 * c as f64 / total)
                    .collect()
            })
            .collect()
    }

    pub fn run(&self, table: &Crosstab) -> Result<ChiSquareResult, StatsError> {
        if table.total() == 0 {
            return Err(StatsError::NotApplicable(format!(
                "no observations for '{}' x '{}'",
                table.row_variable, table.column_variable
            )));
        }

        let rows = table.row_labels.len();
        let cols = table.column_labels.len();
        let dof = (rows.saturating_sub(1)) * (cols.saturating_sub(1));
        if dof == 0 {
            return Err(StatsError::NotApplicable(format!(
                "'{}' x '{}' is a {}x{} table with zero degrees of freedom",
                table.row_variable, table.column_variable, rows, cols
            )));
        }

        let expected = Self::expected_frequencies(table);
        for (i, row) in expected.iter().enumerate() {
            if let Some(j) = row.iter().position(|&e| e == 0.0) {
                return Err(StatsError::NotApplicable(format!(
                    "expected frequency is zero at ({}, {})",
                    table.row_labels[i], table.column_labels[j]
                )));
            }
        }

        let corrected = self.correction && dof == 1;
        let statistic: f64 = table
            .counts
            .iter()
            .zip(&expected)
            .flat_map(|(observed, expected)| observed.iter().zip(expected))
            .map(|(&o, &e)| {
                let mut diff = o as f64 - e;
                if corrected {
                    diff = diff.signum() * (diff.abs() - diff.abs().min(0.5));
                }
                diff * diff / e
            })
            .sum();

        let dist = ChiSquared::new(dof as f64)
            .map_err(|e| StatsError::Distribution(e.to_string()))?;
        let p_value = dist.sf(statistic);
        debug!(
            "chi2({}) = {:.4}, p = {:.4} for {} x {}",
            dof, statistic, p_value, table.row_variable, table.column_variable
        );

        Ok(ChiSquareResult {
            row_variable: table.row_variable.clone(),
            column_variable: table.column_variable.clone(),
            statistic,
            p_value,
            dof,
            expected,
            corrected,
            significant: p_value < self.alpha,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(counts: Vec<Vec<u64>>) -> Crosstab {
        Crosstab {
            row_variable: "r".to_string(),
            column_variable: "c".to_string(),
            row_labels: (0..counts.len()).map(|i| format!("r{}", i)).collect(),
            column_labels: (0..counts[0].len()).map(|j| format!("c{}", j)).collect(),
            counts,
        }
    }

    #[test]
    fn two_by_two_with_yates_correction() {
        // known values for [[10, 20], [30, 40]]
        let result = ChiSquareTest::default()
            .run(&table(vec![vec![10, 20], vec![30, 40]]))
            .unwrap();
        assert_eq!(result.dof, 1);
        assert!(result.corrected);
        assert!((result.statistic - 0.4464285714285714).abs() < 1e-9);
        assert!((result.p_value - 0.5040358664525046).abs() < 1e-6);
        assert!(!result.significant);
        assert!((result.expected[0][0] - 12.0).abs() < 1e-12);
    }

    #[test]
    fn two_by_two_without_correction() {
        let test = ChiSquareTest {
            correction: false,
            alpha: 0.05,
        };
        let result = test.run(&table(vec![vec![10, 20], vec![30, 40]])).unwrap();
        assert!((result.statistic - 0.7936507936507936).abs() < 1e-9);
    }

    #[test]
    fn larger_table_is_uncorrected() {
        let result = ChiSquareTest::default()
            .run(&table(vec![vec![50, 10], vec![10, 50], vec![30, 30]]))
            .unwrap();
        assert_eq!(result.dof, 2);
        assert!(!result.corrected);
        // sum((O-E)^2/E) with E = 30 everywhere: (400*4)/30 = 53.33
        assert!((result.statistic - 1600.0 / 30.0).abs() < 1e-9);
        assert!(result.significant);
    }

    #[test]
    fn zero_expected_frequency_is_not_applicable() {
        let err = ChiSquareTest::default()
            .run(&table(vec![vec![5, 3], vec![0, 0]]))
            .unwrap_err();
        assert!(matches!(err, StatsError::NotApplicable(_)));
    }

    #[test]
    fn single_category_is_not_applicable() {
        let err = ChiSquareTest::default()
            .run(&table(vec![vec![5, 3]]))
            .unwrap_err();
        assert!(matches!(err, StatsError::NotApplicable(_)));
    }

    #[test]
    fn small_cells_correction_does_not_overshoot() {
        // |O - E| below 0.5 is clamped to zero rather than flipping sign
        let result = ChiSquareTest::default()
            .run(&table(vec![vec![5, 5], vec![5, 6]]))
            .unwrap();
        assert_eq!(result.statistic, 0.0);
        assert!((result.p_value - 1.0).abs() < 1e-12);
    }
}
