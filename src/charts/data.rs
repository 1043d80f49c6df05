//! Chart Data
//! Pure chart descriptions built from the posts table. Rendering lives in
//! `renderer`; everything here is a function of the data only.

use crate::config::AnalysisConfig;
use crate::data::schema::{DETECTED_SYNTHETIC_SCORE, MONTH, PLATFORM, TOXICITY_SCORE};
use crate::query::{QueryEngine, QueryError};
use crate::stats::{describe, histogram, GroupStats, HistogramBin, NormalizedCrosstab};
use polars::prelude::*;

pub type Rgb = (u8, u8, u8);

pub const YELLOW: Rgb = (255, 221, 0);
pub const RED: Rgb = (214, 39, 40);
pub const ORANGE: Rgb = (255, 165, 0);
pub const BLUE: Rgb = (91, 155, 213);
pub const DARK_BLUE: Rgb = (31, 78, 121);

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

#[derive(Debug, Clone)]
pub enum ChartKind {
    Bar {
        categories: Vec<String>,
        values: Vec<f64>,
    },
    BoxPlot {
        groups: Vec<(GroupStats, Vec<f64>)>,
    },
    Histogram {
        bins: Vec<HistogramBin>,
    },
    Heatmap {
        table: NormalizedCrosstab,
    },
}

/// One chart: labels, colours and the data to draw.
#[derive(Debug, Clone)]
pub struct ChartData {
    pub file_stem: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub fill: Rgb,
    pub edge: Rgb,
    pub kind: ChartKind,
}

/// Calendar position of an English month name or abbreviation.
fn month_index(name: &str) -> Option<usize> {
    let lower = name.trim().to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    MONTHS.iter().position(|m| m.starts_with(&lower) || lower == *m)
}

fn bar_series(df: &DataFrame, key: &str, column: &str) -> Result<(Vec<String>, Vec<f64>), QueryError> {
    let means = QueryEngine::grouped_mean(df, &[key], column)?;
    let keys = means.column(key)?.cast(&DataType::String)?;
    let values = means.column(column)?.cast(&DataType::Float64)?;

    Ok(keys
        .str()?
        .into_iter()
        .zip(values.f64()?.into_iter())
        .filter_map(|(k, v)| Some((k?.to_string(), v?)))
        .unzip())
}

impl ChartData {
    /// Bar chart of mean DSS per month, months in calendar order when every
    /// label is a recognisable month name.
    pub fn dss_by_month(df: &DataFrame) -> Result<Self, QueryError> {
        let (mut categories, mut values) = bar_series(df, MONTH, DETECTED_SYNTHETIC_SCORE)?;

        if categories.iter().all(|c| month_index(c).is_some()) {
            let mut pairs: Vec<(String, f64)> = categories.into_iter().zip(values).collect();
            pairs.sort_by_key(|(c, _)| month_index(c));
            (categories, values) = pairs.into_iter().unzip();
        }

        Ok(Self {
            file_stem: "dss_by_month".to_string(),
            title: "Average DSS per Month".to_string(),
            x_label: "Month".to_string(),
            y_label: "Average DSS".to_string(),
            fill: YELLOW,
            edge: YELLOW,
            kind: ChartKind::Bar { categories, values },
        })
    }

    pub fn dss_by_platform(df: &DataFrame) -> Result<Self, QueryError> {
        let groups = QueryEngine::values_by_group(df, PLATFORM, DETECTED_SYNTHETIC_SCORE)?
            .into_iter()
            .map(|(name, values)| (describe(&name, &values), values))
            .collect();

        Ok(Self {
            file_stem: "dss_by_platform_box".to_string(),
            title: "Post AI Likeliness By Platform".to_string(),
            x_label: "Platform".to_string(),
            y_label: "Detected Synthetic Score".to_string(),
            fill: BLUE,
            edge: DARK_BLUE,
            kind: ChartKind::BoxPlot { groups },
        })
    }

    pub fn dss_histogram(df: &DataFrame, bins: usize) -> Result<Self, QueryError> {
        let scores = df.column(DETECTED_SYNTHETIC_SCORE)?.cast(&DataType::Float64)?;
        let values: Vec<f64> = scores.f64()?.into_iter().flatten().collect();

        Ok(Self {
            file_stem: "dss_histogram".to_string(),
            title: "Frequency of DSS".to_string(),
            x_label: "Detected Synthetic Score".to_string(),
            y_label: "Frequency".to_string(),
            fill: ORANGE,
            edge: RED,
            kind: ChartKind::Histogram {
                bins: histogram(&values, bins),
            },
        })
    }

    pub fn toxicity_by_platform(df: &DataFrame) -> Result<Self, QueryError> {
        let (categories, values) = bar_series(df, PLATFORM, TOXICITY_SCORE)?;

        Ok(Self {
            file_stem: "toxicity_by_platform".to_string(),
            title: "Average Toxicity per Platform".to_string(),
            x_label: "Platform".to_string(),
            y_label: "Average Toxicity".to_string(),
            fill: RED,
            edge: RED,
            kind: ChartKind::Bar { categories, values },
        })
    }

    /// Heatmap of the joint shares of a normalized crosstab. The `Total`
    /// margins stay in the printed and JSON report but are not drawn, so the
    /// colour scale spans the body cells only.
    pub fn heatmap(table: &NormalizedCrosstab) -> Self {
        Self {
            file_stem: format!(
                "heatmap_{}_vs_{}",
                table.row_variable.to_lowercase(),
                table.column_variable.to_lowercase()
            ),
            title: format!(
                "{} vs {} (share of posts)",
                table.row_variable, table.column_variable
            ),
            x_label: table.column_variable.clone(),
            y_label: table.row_variable.clone(),
            fill: (255, 245, 235),
            edge: (165, 15, 21),
            kind: ChartKind::Heatmap {
                table: table.clone(),
            },
        }
    }

    /// The four distribution charts plus one heatmap per crosstab.
    pub fn standard_set(
        df: &DataFrame,
        config: &AnalysisConfig,
        crosstabs: &[NormalizedCrosstab],
    ) -> Result<Vec<Self>, QueryError> {
        let mut charts = vec![
            Self::dss_by_month(df)?,
            Self::dss_by_platform(df)?,
            Self::dss_histogram(df, config.histogram_bins)?,
            Self::toxicity_by_platform(df)?,
        ];
        charts.extend(crosstabs.iter().map(Self::heatmap));
        Ok(charts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn posts() -> DataFrame {
        df!(
            "month" => ["March", "January", "March", "December"],
            "platform" => ["Reddit", "Twitter", "Twitter", "Reddit"],
            "detected_synthetic_score" => [0.2, 0.4, 0.6, 1.0],
            "toxicity_score" => [0.1, 0.3, 0.5, 0.7]
        )
        .unwrap()
    }

    #[test]
    fn months_in_calendar_order() {
        let chart = ChartData::dss_by_month(&posts()).unwrap();
        match chart.kind {
            ChartKind::Bar { categories, values } => {
                assert_eq!(categories, vec!["January", "March", "December"]);
                assert!((values[1] - 0.4).abs() < 1e-12);
            }
            other => panic!("expected bar chart, got {:?}", other),
        }
    }

    #[test]
    fn month_index_accepts_abbreviations() {
        assert_eq!(month_index("Sep"), Some(8));
        assert_eq!(month_index("september"), Some(8));
        assert_eq!(month_index("Ma"), None);
    }

    #[test]
    fn box_plot_groups_per_platform() {
        let chart = ChartData::dss_by_platform(&posts()).unwrap();
        match chart.kind {
            ChartKind::BoxPlot { groups } => {
                let names: Vec<&str> = groups.iter().map(|(s, _)| s.group_name.as_str()).collect();
                assert_eq!(names, vec!["Reddit", "Twitter"]);
                assert_eq!(groups[0].0.count, 2);
                assert!((groups[0].0.median - 0.6).abs() < 1e-12);
            }
            other => panic!("expected box plot, got {:?}", other),
        }
    }

    #[test]
    fn standard_set_is_deterministic() {
        let config = AnalysisConfig::default();
        let a = ChartData::standard_set(&posts(), &config, &[]).unwrap();
        let b = ChartData::standard_set(&posts(), &config, &[]).unwrap();
        assert_eq!(a.len(), 4);
        assert_eq!(format!("{:?}", a), format!("{:?}", b));
    }
}
