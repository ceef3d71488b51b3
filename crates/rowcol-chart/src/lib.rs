//! Terminal charts as fixed-size character grids.
//!
//! The renderer is pure: it never touches a store, only the bounded outputs of
//! `rowcol-stats` (bucket counts, a point sample, a five-number summary). Output geometry
//! depends on the chart and [`Geometry`] alone, never on the [`Style`].

#![forbid(unsafe_code)]

mod grid;
mod render;
mod style;

use rowcol_stats::{Histogram, NumericSummary, ScatterSample};
use thiserror::Error;

pub use crate::grid::{Geometry, Grid, DEFAULT_HEIGHT, DEFAULT_WIDTH};
pub use crate::style::Style;

/// Default width of the box plot glyph column.
pub const DEFAULT_BOX_WIDTH: usize = 7;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChartError {
    #[error("invalid geometry {width}x{height}: at least {min_width}x{min_height} is required")]
    InvalidGeometry {
        width: usize,
        height: usize,
        min_width: usize,
        min_height: usize,
    },
    #[error("nothing to plot: {0}")]
    EmptyInput(&'static str),
}

pub type Result<T> = std::result::Result<T, ChartError>;

/// Five-number summary drawn by a box plot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxStats {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl BoxStats {
    /// `None` for columns without values.
    pub fn from_summary(summary: &NumericSummary) -> Option<Self> {
        Some(Self {
            min: summary.min?.as_f64(),
            q1: summary.q1?.as_f64(),
            median: summary.median?.as_f64(),
            q3: summary.q3?.as_f64(),
            max: summary.max?.as_f64(),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Chart {
    /// Bucket counts, lowest bucket first.
    Histogram(Vec<u64>),
    Scatter(Vec<(f64, f64)>),
    BoxPlot(BoxStats),
}

impl From<&Histogram> for Chart {
    fn from(histogram: &Histogram) -> Self {
        Chart::Histogram(histogram.counts.clone())
    }
}

impl From<&ScatterSample> for Chart {
    fn from(sample: &ScatterSample) -> Self {
        Chart::Scatter(sample.points.clone())
    }
}

impl From<BoxStats> for Chart {
    fn from(stats: BoxStats) -> Self {
        Chart::BoxPlot(stats)
    }
}

pub fn render(chart: &Chart, geometry: Geometry, style: Style) -> Result<Grid> {
    match chart {
        Chart::Histogram(counts) => render::histogram(counts, geometry, style),
        Chart::Scatter(points) => render::scatter(points, geometry, style),
        Chart::BoxPlot(stats) => render::box_plot(stats, geometry, style),
    }
}
