//! Misinfo Lens - AI-generated content and misinformation analysis
//!
//! Command-line entry point: parses flags, initialises logging and runs the
//! analysis pipeline over one posts CSV.

use anyhow::{Context, Result};
use clap::Parser;
use misinfo_lens::config::{
    AnalysisConfig, DEFAULT_AI_THRESHOLD, DEFAULT_ALPHA, DEFAULT_HISTOGRAM_BINS,
};
use misinfo_lens::Pipeline;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    author = "misinfo-lens contributors",
    version,
    about = "Exploratory analysis of AI-generated content and misinformation in social media posts",
    long_about = "Loads a posts CSV, derives AI-detection columns, answers a fixed set of\n\
                  questions about synthetic content and misinformation and renders SVG charts.\n\n\
                  EXAMPLES:\n  \
                  misinfo-lens -i posts.csv\n\n  \
                  misinfo-lens -i posts.csv -o results/ --no-charts\n\n  \
                  misinfo-lens -i posts.csv --json | jq '.findings[0]'"
)]
struct Args {
    /// Path to the posts CSV file
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for charts and report.json
    #[arg(short, long, default_value = "./outputs")]
    output: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Print the JSON report to stdout instead of the text report
    ///
    /// Disables all logging so stdout only contains JSON.
    #[arg(long)]
    json: bool,

    /// Skip chart rendering
    #[arg(long)]
    no_charts: bool,

    /// Open the rendered charts with the system viewer
    #[arg(long)]
    open: bool,

    /// Number of bins in the DSS histogram
    #[arg(long, default_value_t = DEFAULT_HISTOGRAM_BINS)]
    bins: usize,

    /// DSS above this value marks a post as AI-detected
    #[arg(long, default_value_t = DEFAULT_AI_THRESHOLD)]
    ai_threshold: f64,

    /// Significance level for the chi-squared tests
    #[arg(long, default_value_t = DEFAULT_ALPHA)]
    alpha: f64,
}

impl Args {
    fn config(&self) -> AnalysisConfig {
        AnalysisConfig {
            ai_threshold: self.ai_threshold,
            alpha: self.alpha,
            histogram_bins: self.bins,
            output_dir: self.output.clone(),
            render_charts: !self.no_charts,
            ..AnalysisConfig::default()
        }
    }
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr so stdout carries only the report. With `json_output`
/// no subscriber is installed at all.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);

    // Show whole result tables in the text report
    if std::env::var_os("POLARS_FMT_MAX_ROWS").is_none() {
        std::env::set_var("POLARS_FMT_MAX_ROWS", "200");
    }

    let pipeline = Pipeline::new(args.config());
    let report = pipeline
        .run(&args.input)
        .inspect_err(|e| error!("Analysis failed: {}", e))
        .with_context(|| format!("analysing {}", args.input.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        report.print();
    }

    let failed = report.failures();
    if failed > 0 {
        warn!("{} question(s) could not be answered", failed);
    }
    info!(
        "Done: {} findings, {} charts",
        report.findings.len(),
        report.charts.len()
    );

    if args.open {
        for chart in &report.charts {
            if let Err(e) = open::that(chart) {
                warn!("Could not open {}: {}", chart.display(), e);
            }
        }
    }

    Ok(())
}
