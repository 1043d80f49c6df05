//! Static Chart Renderer
//! Draws `ChartData` to SVG with plotters.
//!
//! Layout, all charts:
//! 1. Caption centered on top
//! 2. Categorical charts put one tick per category at integer x positions
//! 3. Axis descriptions from the chart's labels

use crate::charts::data::{ChartData, ChartKind, Rgb};
use crate::stats::{GroupStats, HistogramBin, NormalizedCrosstab};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const FONT: &str = "sans-serif";
const GRID: RGBColor = RGBColor(200, 200, 200);

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Failed to write chart: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to draw '{chart}': {reason}")]
    Draw { chart: String, reason: String },
    #[error("Chart '{0}' has no data")]
    Empty(String),
}

type DrawResult = Result<(), Box<dyn Error>>;
type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

fn rgb(c: Rgb) -> RGBColor {
    RGBColor(c.0, c.1, c.2)
}

/// Label for an integer tick on a categorical axis, blank between ticks.
fn category_label(names: &[String], x: f64) -> String {
    let idx = x.round();
    if (x - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    names.get(idx as usize).cloned().unwrap_or_default()
}

/// Value range padded by 10%, always including zero when `from_zero`.
fn padded_range(lo: f64, hi: f64, from_zero: bool) -> (f64, f64) {
    let (mut lo, mut hi) = if from_zero {
        (lo.min(0.0), hi.max(0.0))
    } else {
        (lo, hi)
    };
    let span = (hi - lo).abs();
    let pad = if span > 0.0 { span * 0.1 } else { 0.5 };
    if !from_zero || lo < 0.0 {
        lo -= pad;
    }
    hi += pad;
    (lo, hi)
}

pub struct StaticChartRenderer {
    width: u32,
    height: u32,
}

impl StaticChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Render a chart to an SVG document.
    pub fn render_svg(&self, chart: &ChartData) -> Result<String, ChartError> {
        if Self::is_empty(chart) {
            return Err(ChartError::Empty(chart.file_stem.clone()));
        }

        let draw_err = |e: Box<dyn Error>| ChartError::Draw {
            chart: chart.file_stem.clone(),
            reason: e.to_string(),
        };

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (self.width, self.height))
                .into_drawing_area();
            root.fill(&WHITE).map_err(|e| draw_err(Box::new(e)))?;

            let drawn = match &chart.kind {
                ChartKind::Bar { categories, values } => {
                    Self::draw_bar(&root, chart, categories, values)
                }
                ChartKind::BoxPlot { groups } => Self::draw_boxplot(&root, chart, groups),
                ChartKind::Histogram { bins } => Self::draw_histogram(&root, chart, bins),
                ChartKind::Heatmap { table } => Self::draw_heatmap(&root, chart, table),
            };
            drawn.map_err(draw_err)?;

            root.present().map_err(|e| draw_err(Box::new(e)))?;
        }
        Ok(svg)
    }

    /// Render and write `{file_stem}.svg` into `dir`.
    pub fn render_to_file(&self, chart: &ChartData, dir: &Path) -> Result<PathBuf, ChartError> {
        let svg = self.render_svg(chart)?;
        let path = dir.join(format!("{}.svg", chart.file_stem));
        fs::write(&path, svg)?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Render every chart; a chart that fails is logged and skipped.
    pub fn render_all(&self, charts: &[ChartData], dir: &Path) -> Result<Vec<PathBuf>, ChartError> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(charts.len());
        for chart in charts {
            match self.render_to_file(chart, dir) {
                Ok(path) => written.push(path),
                Err(ChartError::Io(e)) => return Err(ChartError::Io(e)),
                Err(e) => warn!("Skipping chart: {}", e),
            }
        }
        info!("Rendered {} of {} charts to {}", written.len(), charts.len(), dir.display());
        Ok(written)
    }

    fn is_empty(chart: &ChartData) -> bool {
        match &chart.kind {
            ChartKind::Bar { values, .. } => values.is_empty(),
            ChartKind::BoxPlot { groups } => groups.is_empty(),
            ChartKind::Histogram { bins } => bins.is_empty(),
            ChartKind::Heatmap { table } => table.body().iter().all(|row| row.is_empty()),
        }
    }

    fn draw_bar(root: &Area, chart: &ChartData, categories: &[String], values: &[f64]) -> DrawResult {
        let n = categories.len();
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (y_min, y_max) = padded_range(lo, hi, true);

        let mut ctx = ChartBuilder::on(root)
            .caption(&chart.title, (FONT, 24))
            .margin(15)
            .x_label_area_size(90)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_min..y_max)?;

        let label = |x: &f64| category_label(categories, *x);
        ctx.configure_mesh()
            .disable_x_mesh()
            .light_line_style(WHITE.stroke_width(1))
            .bold_line_style(GRID.stroke_width(1))
            .x_labels(n)
            .x_label_formatter(&label)
            .x_label_style((FONT, 12).into_font().transform(FontTransform::Rotate90))
            .x_desc(&chart.x_label)
            .y_desc(&chart.y_label)
            .draw()?;

        let fill = rgb(chart.fill);
        let edge = rgb(chart.edge);
        ctx.draw_series(values.iter().enumerate().map(|(i, &v)| {
            let x = i as f64;
            Rectangle::new([(x - 0.4, 0.0), (x + 0.4, v)], fill.filled())
        }))?;
        ctx.draw_series(values.iter().enumerate().map(|(i, &v)| {
            let x = i as f64;
            Rectangle::new([(x - 0.4, 0.0), (x + 0.4, v)], edge.stroke_width(1))
        }))?;
        Ok(())
    }

    fn draw_boxplot(root: &Area, chart: &ChartData, groups: &[(GroupStats, Vec<f64>)]) -> DrawResult {
        let n = groups.len();
        let names: Vec<String> = groups.iter().map(|(s, _)| s.group_name.clone()).collect();
        let lo = groups.iter().map(|(s, _)| s.min).fold(f64::INFINITY, f64::min);
        let hi = groups.iter().map(|(s, _)| s.max).fold(f64::NEG_INFINITY, f64::max);
        let (y_min, y_max) = padded_range(lo, hi, false);

        let mut ctx = ChartBuilder::on(root)
            .caption(&chart.title, (FONT, 24))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), y_min..y_max)?;

        let label = |x: &f64| category_label(&names, *x);
        ctx.configure_mesh()
            .disable_x_mesh()
            .light_line_style(WHITE.stroke_width(1))
            .bold_line_style(GRID.stroke_width(1))
            .x_labels(n)
            .x_label_formatter(&label)
            .x_desc(&chart.x_label)
            .y_desc(&chart.y_label)
            .draw()?;

        let fill = rgb(chart.fill).mix(0.4);
        let line = rgb(chart.edge);
        let half = 0.25;
        let cap = 0.1;

        for (i, (stats, values)) in groups.iter().enumerate() {
            if stats.count == 0 {
                continue;
            }
            let cx = i as f64;

            // Box and outline
            ctx.draw_series(std::iter::once(Rectangle::new(
                [(cx - half, stats.q1), (cx + half, stats.q3)],
                fill.filled(),
            )))?;
            ctx.draw_series(std::iter::once(Rectangle::new(
                [(cx - half, stats.q1), (cx + half, stats.q3)],
                line.stroke_width(1),
            )))?;

            // Median, whiskers and caps
            let segments = [
                [(cx - half, stats.median), (cx + half, stats.median)],
                [(cx, stats.whisker_low), (cx, stats.q1)],
                [(cx, stats.q3), (cx, stats.whisker_high)],
                [(cx - cap, stats.whisker_low), (cx + cap, stats.whisker_low)],
                [(cx - cap, stats.whisker_high), (cx + cap, stats.whisker_high)],
            ];
            ctx.draw_series(
                segments
                    .into_iter()
                    .map(|seg| PathElement::new(seg.to_vec(), line.stroke_width(2))),
            )?;

            // Outliers
            ctx.draw_series(
                stats
                    .outliers(values)
                    .into_iter()
                    .map(|&v| Circle::new((cx, v), 3, line.stroke_width(1))),
            )?;
        }
        Ok(())
    }

    fn draw_histogram(root: &Area, chart: &ChartData, bins: &[HistogramBin]) -> DrawResult {
        let x_min = bins.first().map(|b| b.start).unwrap_or(0.0);
        let x_max = bins.last().map(|b| b.end).unwrap_or(1.0);
        let top = bins.iter().map(|b| b.count).max().unwrap_or(0) as f64;
        let (_, y_max) = padded_range(0.0, top, true);

        let mut ctx = ChartBuilder::on(root)
            .caption(&chart.title, (FONT, 24))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, 0f64..y_max)?;

        ctx.configure_mesh()
            .light_line_style(WHITE.stroke_width(1))
            .bold_line_style(GRID.stroke_width(1))
            .x_desc(&chart.x_label)
            .y_desc(&chart.y_label)
            .draw()?;

        let fill = rgb(chart.fill);
        let edge = rgb(chart.edge);
        ctx.draw_series(
            bins.iter()
                .map(|b| Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], fill.filled())),
        )?;
        ctx.draw_series(
            bins.iter()
                .map(|b| Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], edge.stroke_width(1))),
        )?;
        Ok(())
    }

    fn draw_heatmap(root: &Area, chart: &ChartData, table: &NormalizedCrosstab) -> DrawResult {
        let body = table.body();
        let rows = body.len();
        let cols = body.first().map(|r| r.len()).unwrap_or(0);
        let row_labels: Vec<String> = table.row_labels[..rows].to_vec();
        let col_labels: Vec<String> = table.column_labels[..cols].to_vec();
        let max = body.iter().flatten().copied().fold(0.0f64, f64::max);

        let mut ctx = ChartBuilder::on(root)
            .caption(&chart.title, (FONT, 22))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(120)
            .build_cartesian_2d(-0.5f64..(cols as f64 - 0.5), -0.5f64..(rows as f64 - 0.5))?;

        // Row 0 is drawn at the top
        let x_label = |x: &f64| category_label(&col_labels, *x);
        let y_label = |y: &f64| category_label(&row_labels, rows as f64 - 1.0 - *y);
        ctx.configure_mesh()
            .disable_mesh()
            .x_labels(cols)
            .y_labels(rows)
            .x_label_formatter(&x_label)
            .y_label_formatter(&y_label)
            .x_desc(&chart.x_label)
            .y_desc(&chart.y_label)
            .draw()?;

        let (low, high) = (chart.fill, chart.edge);
        let shade = |v: f64| {
            let t = if max > 0.0 { (v / max).clamp(0.0, 1.0) } else { 0.0 };
            let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
            RGBColor(mix(low.0, high.0), mix(low.1, high.1), mix(low.2, high.2))
        };

        let text_style = (FONT, 14)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Center));

        for (i, row) in body.iter().enumerate() {
            let y = (rows - 1 - i) as f64;
            for (j, &v) in row.iter().enumerate() {
                let x = j as f64;
                ctx.draw_series(std::iter::once(Rectangle::new(
                    [(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)],
                    shade(v).filled(),
                )))?;
                ctx.draw_series(std::iter::once(Text::new(
                    format!("{:.3}", v),
                    (x, y),
                    text_style.clone(),
                )))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::data::{ORANGE, RED, YELLOW};
    use crate::stats::{describe, histogram, Crosstab};

    fn bar() -> ChartData {
        ChartData {
            file_stem: "bar".to_string(),
            title: "Average DSS per Month".to_string(),
            x_label: "Month".to_string(),
            y_label: "Average DSS".to_string(),
            fill: YELLOW,
            edge: YELLOW,
            kind: ChartKind::Bar {
                categories: vec!["January".to_string(), "February".to_string()],
                values: vec![0.4, 0.6],
            },
        }
    }

    #[test]
    fn category_labels_only_on_integer_ticks() {
        let names = vec!["a".to_string(), "b".to_string()];
        assert_eq!(category_label(&names, 1.0), "b");
        assert_eq!(category_label(&names, 0.5), "");
        assert_eq!(category_label(&names, 2.0), "");
        assert_eq!(category_label(&names, -1.0), "");
    }

    #[test]
    fn padded_range_includes_zero_for_bars() {
        let (lo, hi) = padded_range(0.4, 0.6, true);
        assert_eq!(lo, 0.0);
        assert!(hi > 0.6);
        let (lo, _) = padded_range(0.4, 0.6, false);
        assert!(lo < 0.4 && lo > 0.0);
    }

    #[test]
    fn bar_chart_svg_contains_title() {
        let svg = StaticChartRenderer::new(640, 480).render_svg(&bar()).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Average DSS per Month"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let renderer = StaticChartRenderer::new(640, 480);
        assert_eq!(
            renderer.render_svg(&bar()).unwrap(),
            renderer.render_svg(&bar()).unwrap()
        );
    }

    #[test]
    fn box_and_histogram_render() {
        let values = vec![0.1, 0.2, 0.2, 0.5, 0.9, 0.95];
        let boxes = ChartData {
            file_stem: "box".to_string(),
            title: "Box".to_string(),
            x_label: "Platform".to_string(),
            y_label: "DSS".to_string(),
            fill: ORANGE,
            edge: RED,
            kind: ChartKind::BoxPlot {
                groups: vec![(describe("Reddit", &values), values.clone())],
            },
        };
        let hist = ChartData {
            kind: ChartKind::Histogram {
                bins: histogram(&values, 30),
            },
            ..boxes.clone()
        };
        let renderer = StaticChartRenderer::new(640, 480);
        assert!(renderer.render_svg(&boxes).is_ok());
        assert!(renderer.render_svg(&hist).is_ok());
    }

    #[test]
    fn empty_chart_is_an_error() {
        let mut chart = bar();
        chart.kind = ChartKind::Bar {
            categories: vec![],
            values: vec![],
        };
        assert!(matches!(
            StaticChartRenderer::new(640, 480).render_svg(&chart),
            Err(ChartError::Empty(_))
        ));
    }

    #[test]
    fn heatmap_draws_body_cells_only() {
        let table = Crosstab {
            row_variable: "is_misinformation".to_string(),
            column_variable: "detected_AI".to_string(),
            row_labels: vec!["false".to_string(), "true".to_string()],
            column_labels: vec!["false".to_string(), "true".to_string()],
            counts: vec![vec![3, 1], vec![2, 4]],
        }
        .normalized()
        .unwrap();
        let chart = ChartData::heatmap(&table);
        assert_eq!(chart.file_stem, "heatmap_is_misinformation_vs_detected_ai");

        let svg = StaticChartRenderer::new(640, 480).render_svg(&chart).unwrap();
        for cell in ["0.300", "0.100", "0.200", "0.400"] {
            assert!(svg.contains(cell), "missing cell {}", cell);
        }
        assert!(!svg.contains("Total"));
    }
}
