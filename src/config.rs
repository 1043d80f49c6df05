//! Analysis Configuration
//! Thresholds and output settings shared by every pipeline stage.

use serde::Serialize;
use std::path::PathBuf;

/// DSS above this value counts as AI-detected.
pub const DEFAULT_AI_THRESHOLD: f64 = 0.5;

/// Significance threshold for the chi-squared tests
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Histogram bin count for the DSS frequency chart
pub const DEFAULT_HISTOGRAM_BINS: usize = 30;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisConfig {
    pub ai_threshold: f64,
    pub alpha: f64,
    pub histogram_bins: usize,
    /// Posts ranked at or above this within their country are "top" posts.
    pub top_rank: u32,
    pub engagement_threshold: f64,
    /// Regex applied to `city` for the high-engagement question.
    pub city_pattern: String,
    /// Regex applied to `factcheck_verdict` to isolate entirely false posts.
    pub verdict_pattern: String,
    pub output_dir: PathBuf,
    pub render_charts: bool,
    pub chart_width: u32,
    pub chart_height: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ai_threshold: DEFAULT_AI_THRESHOLD,
            alpha: DEFAULT_ALPHA,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            top_rank: 2,
            engagement_threshold: 5000.0,
            city_pattern: "M".to_string(),
            verdict_pattern: "FALSE".to_string(),
            output_dir: PathBuf::from("./outputs"),
            render_charts: true,
            chart_width: 900,
            chart_height: 600,
        }
    }
}
