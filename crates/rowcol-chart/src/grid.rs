use std::fmt;

use serde::Serialize;

use crate::style::Style;
use crate::{ChartError, Result};

pub const DEFAULT_WIDTH: usize = 60;
pub const DEFAULT_HEIGHT: usize = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub width: usize,
    pub height: usize,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl Geometry {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub(crate) fn require(self, min_width: usize, min_height: usize) -> Result<Self> {
        if self.width < min_width || self.height < min_height {
            return Err(ChartError::InvalidGeometry {
                width: self.width,
                height: self.height,
                min_width,
                min_height,
            });
        }
        Ok(self)
    }
}

/// A rendered chart: exactly `height` rows of exactly `width` characters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Grid {
    pub width: usize,
    pub height: usize,
    pub style: Style,
    pub rows: Vec<String>,
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            f.write_str(row)?;
        }
        Ok(())
    }
}

/// Mutable cell buffer the renderers paint into.
pub(crate) struct Canvas {
    geometry: Geometry,
    cells: Vec<char>,
}

impl Canvas {
    pub fn new(geometry: Geometry, blank: char) -> Self {
        Self {
            geometry,
            cells: vec![blank; geometry.width * geometry.height],
        }
    }

    pub fn set(&mut self, x: usize, y: usize, glyph: char) {
        if x < self.geometry.width && y < self.geometry.height {
            self.cells[y * self.geometry.width + x] = glyph;
        }
    }

    pub fn into_grid(self, style: Style) -> Grid {
        let rows = self
            .cells
            .chunks(self.geometry.width)
            .map(|row| row.iter().collect())
            .collect();
        Grid {
            width: self.geometry.width,
            height: self.geometry.height,
            style,
            rows,
        }
    }
}
