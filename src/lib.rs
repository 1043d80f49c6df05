//! Misinfo Lens - exploratory analysis of social media posts
//!
//! Loads a posts CSV, derives the AI-detection columns, answers a fixed set
//! of questions about synthetic content and misinformation, and renders the
//! supporting charts.

pub mod charts;
pub mod config;
pub mod data;
pub mod query;
pub mod report;
pub mod stats;

use charts::{ChartData, ChartError, StaticChartRenderer};
use config::AnalysisConfig;
use data::{DataLoader, DataProcessor, LoaderError, ProcessorError};
use polars::prelude::DataFrame;
use report::{AnalysisReport, DatasetInfo};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// File name of the JSON report inside the output directory.
pub const REPORT_FILE: &str = "report.json";

/// Errors that stop the whole run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Load(#[from] LoaderError),
    #[error(transparent)]
    Derive(#[from] ProcessorError),
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Load, derive, question and chart one posts file.
pub struct Pipeline {
    config: AnalysisConfig,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, input: &Path) -> Result<AnalysisReport, AnalysisError> {
        let raw = DataLoader::load_csv(input)?;
        let mut report = self.analyze(&raw, input)?;

        if self.config.render_charts {
            report.charts = self.render_charts(&raw, &report)?;
        }

        fs::create_dir_all(&self.config.output_dir)?;
        let report_path = self.config.output_dir.join(REPORT_FILE);
        report.write_json(&report_path)?;
        info!("Report written to {}", report_path.display());

        Ok(report)
    }

    /// Derive columns and answer every question for an already-loaded table.
    /// Writes nothing to disk.
    pub fn analyze(&self, raw: &DataFrame, source: &Path) -> Result<AnalysisReport, AnalysisError> {
        let df = DataProcessor::derive_columns(raw, self.config.ai_threshold)?;
        let findings = query::run_all(&df, &self.config);

        Ok(AnalysisReport {
            dataset: DatasetInfo {
                path: source.to_path_buf(),
                rows: df.height(),
                columns: df
                    .get_column_names()
                    .iter()
                    .map(|name| name.to_string())
                    .collect(),
            },
            config: self.config.clone(),
            findings,
            charts: Vec::new(),
        })
    }

    /// Charts that cannot be built are logged and skipped; only IO failures
    /// abort the run.
    fn render_charts(
        &self,
        raw: &DataFrame,
        report: &AnalysisReport,
    ) -> Result<Vec<PathBuf>, AnalysisError> {
        let charts = match ChartData::standard_set(raw, &self.config, &report.crosstabs()) {
            Ok(charts) => charts,
            Err(e) => {
                warn!("Skipping charts: {}", e);
                return Ok(Vec::new());
            }
        };

        let renderer = StaticChartRenderer::new(self.config.chart_width, self.config.chart_height);
        match renderer.render_all(&charts, &self.config.output_dir) {
            Ok(paths) => Ok(paths),
            Err(ChartError::Io(e)) => Err(AnalysisError::Io(e)),
            Err(e) => {
                warn!("Chart rendering failed: {}", e);
                Ok(Vec::new())
            }
        }
    }
}

