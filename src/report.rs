//! Analysis Report
//! Collects every finding, prints the human-readable report and serializes
//! it to JSON.

use crate::config::AnalysisConfig;
use crate::stats::{ChiSquareResult, NormalizedCrosstab};
use polars::prelude::*;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Initial,
    Slicing,
    Advanced,
    Charts,
}

impl Section {
    pub fn heading(self) -> &'static str {
        match self {
            Section::Initial => "Initial Questions",
            Section::Slicing => "Slicing and Dicing",
            Section::Advanced => "Advanced Analysis",
            Section::Charts => "Chart Aggregates",
        }
    }
}

/// Result of a single question.
#[derive(Debug, Clone)]
pub enum Answer {
    /// A proportion in [0, 1], printed as a percentage.
    Fraction(f64),
    Value(f64),
    Table(DataFrame),
    Crosstab(NormalizedCrosstab),
    ChiSquare(ChiSquareResult),
}

#[derive(Debug, Clone)]
pub struct Finding {
    pub id: &'static str,
    pub section: Section,
    pub question: &'static str,
    /// Error message when the question could not be answered.
    pub outcome: Result<Answer, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub dataset: DatasetInfo,
    pub config: AnalysisConfig,
    pub findings: Vec<Finding>,
    pub charts: Vec<PathBuf>,
}

fn any_to_json(value: &AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Int8(v) => json!(v),
        AnyValue::Int16(v) => json!(v),
        AnyValue::Int32(v) => json!(v),
        AnyValue::Int64(v) => json!(v),
        AnyValue::UInt8(v) => json!(v),
        AnyValue::UInt16(v) => json!(v),
        AnyValue::UInt32(v) => json!(v),
        AnyValue::UInt64(v) => json!(v),
        AnyValue::Float32(v) => json!(v),
        AnyValue::Float64(v) => json!(v),
        other => Value::String(other.to_string()),
    }
}

/// One JSON object per row, keyed by column name.
pub fn frame_to_records(df: &DataFrame) -> Vec<Value> {
    let columns: Vec<(String, Vec<Value>)> = df
        .get_columns()
        .iter()
        .map(|column| {
            let values = column
                .as_materialized_series()
                .iter()
                .map(|v| any_to_json(&v))
                .collect();
            (column.name().to_string(), values)
        })
        .collect();

    (0..df.height())
        .map(|row| {
            let record: Map<String, Value> = columns
                .iter()
                .map(|(name, values)| (name.clone(), values[row].clone()))
                .collect();
            Value::Object(record)
        })
        .collect()
}

impl Answer {
    pub fn to_json(&self) -> Value {
        match self {
            Answer::Fraction(v) => json!({ "kind": "fraction", "value": v }),
            Answer::Value(v) => json!({ "kind": "value", "value": v }),
            Answer::Table(df) => json!({ "kind": "table", "rows": frame_to_records(df) }),
            Answer::Crosstab(t) => json!({ "kind": "crosstab", "table": t }),
            Answer::ChiSquare(r) => json!({ "kind": "chi_square", "result": r }),
        }
    }

    fn print(&self) {
        match self {
            Answer::Fraction(v) => println!("{:.1}%", v * 100.0),
            Answer::Value(v) => println!("{:.4}", v),
            Answer::Table(df) => println!("{}", df),
            Answer::Crosstab(t) => match t.to_frame() {
                Ok(df) => println!("{}", df),
                Err(e) => println!("(crosstab unavailable: {})", e),
            },
            Answer::ChiSquare(r) => {
                println!(
                    "chi2 = {:.4}, p = {:.4}, dof = {}{}",
                    r.statistic,
                    r.p_value,
                    r.dof,
                    if r.corrected { " (Yates corrected)" } else { "" }
                );
                println!(
                    "significant at alpha: {}",
                    if r.significant { "yes" } else { "no" }
                );
            }
        }
    }
}

impl AnalysisReport {
    pub fn finding(&self, id: &str) -> Option<&Finding> {
        self.findings.iter().find(|f| f.id == id)
    }

    pub fn answer(&self, id: &str) -> Option<&Answer> {
        self.finding(id).and_then(|f| f.outcome.as_ref().ok())
    }

    pub fn failures(&self) -> usize {
        self.findings.iter().filter(|f| f.outcome.is_err()).count()
    }

    /// Normalized crosstabs among the findings, in question order.
    pub fn crosstabs(&self) -> Vec<NormalizedCrosstab> {
        self.findings
            .iter()
            .filter_map(|f| match &f.outcome {
                Ok(Answer::Crosstab(t)) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn to_json(&self) -> Value {
        let findings: Vec<Value> = self
            .findings
            .iter()
            .map(|f| {
                let mut entry = json!({
                    "id": f.id,
                    "section": f.section,
                    "question": f.question,
                });
                match &f.outcome {
                    Ok(answer) => entry["answer"] = answer.to_json(),
                    Err(error) => entry["error"] = json!(error),
                }
                entry
            })
            .collect();

        json!({
            "dataset": self.dataset,
            "config": self.config,
            "findings": findings,
            "charts": self.charts,
        })
    }

    pub fn write_json(&self, path: &Path) -> Result<(), std::io::Error> {
        let text = serde_json::to_string_pretty(&self.to_json())?;
        fs::write(path, text)
    }

    /// Print every finding grouped by section.
    pub fn print(&self) {
        println!(
            "Dataset: {} ({} rows, {} columns)",
            self.dataset.path.display(),
            self.dataset.rows,
            self.dataset.columns.len()
        );

        let mut current: Option<Section> = None;
        for finding in &self.findings {
            if current != Some(finding.section) {
                println!();
                println!("== {} ==", finding.section.heading());
                current = Some(finding.section);
            }
            println!();
            println!("{}", finding.question);
            match &finding.outcome {
                Ok(answer) => answer.print(),
                Err(error) => println!("FAILED: {}", error),
            }
        }

        if !self.charts.is_empty() {
            println!();
            println!("== Charts ==");
            for path in &self.charts {
                println!("{}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn records_keep_column_types() {
        let df = df!(
            "platform" => ["Reddit", "Twitter"],
            "count" => [3u32, 2],
            "share" => [0.6, 0.4],
            "flag" => [true, false]
        )
        .unwrap();
        let records = frame_to_records(&df);
        assert_eq!(
            records[0],
            json!({ "platform": "Reddit", "count": 3, "share": 0.6, "flag": true })
        );
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn failed_findings_serialize_their_error() {
        let report = AnalysisReport {
            dataset: DatasetInfo {
                path: PathBuf::from("posts.csv"),
                rows: 0,
                columns: vec![],
            },
            config: AnalysisConfig::default(),
            findings: vec![
                Finding {
                    id: "ok",
                    section: Section::Initial,
                    question: "q1",
                    outcome: Ok(Answer::Fraction(0.484)),
                },
                Finding {
                    id: "broken",
                    section: Section::Slicing,
                    question: "q2",
                    outcome: Err("boom".to_string()),
                },
            ],
            charts: vec![],
        };

        assert_eq!(report.failures(), 1);
        let value = report.to_json();
        assert_eq!(value["findings"][0]["answer"]["value"], json!(0.484));
        assert_eq!(value["findings"][1]["error"], json!("boom"));
        assert_eq!(value["findings"][1]["section"], json!("slicing"));
    }
}
