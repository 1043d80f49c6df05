//! Charts module - Chart data and SVG rendering

mod data;
mod renderer;

pub use data::{ChartData, ChartKind, Rgb};
pub use renderer::{ChartError, StaticChartRenderer};
