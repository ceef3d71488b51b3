use crate::grid::{Canvas, Geometry, Grid};
use crate::style::Style;
use crate::{BoxStats, ChartError, Result};

/// Map `v` in `[lo, hi]` onto `0..=steps`; a degenerate range maps to the middle.
fn scale(v: f64, lo: f64, hi: f64, steps: usize) -> usize {
    if hi <= lo {
        return steps / 2;
    }
    let t = ((v - lo) / (hi - lo)).clamp(0.0, 1.0);
    (t * steps as f64).round() as usize
}

pub(crate) fn histogram(counts: &[u64], geometry: Geometry, style: Style) -> Result<Grid> {
    let Geometry { width, height } = geometry.require(1, 1)?;
    if counts.is_empty() {
        return Err(ChartError::EmptyInput("histogram has no buckets"));
    }
    let glyphs = style.glyphs();
    let mut canvas = Canvas::new(geometry, glyphs.blank);

    let buckets = counts.len();
    let max = counts.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return Ok(canvas.into_grid(style));
    }

    for (b, &count) in counts.iter().enumerate() {
        let bar = ((count as u128 * height as u128).div_ceil(max as u128)) as usize;
        let (first, last) = (b * width / buckets, (b + 1) * width / buckets);
        for x in first..last {
            for y in height - bar..height {
                canvas.set(x, y, glyphs.bar);
            }
        }
    }
    Ok(canvas.into_grid(style))
}

pub(crate) fn scatter(points: &[(f64, f64)], geometry: Geometry, style: Style) -> Result<Grid> {
    let Geometry { width, height } = geometry.require(1, 1)?;
    let finite = || {
        points
            .iter()
            .copied()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
    };
    let Some((x0, y0)) = finite().next() else {
        return Err(ChartError::EmptyInput("scatter plot has no finite points"));
    };
    let (mut x_lo, mut x_hi, mut y_lo, mut y_hi) = (x0, x0, y0, y0);
    for (x, y) in finite() {
        x_lo = x_lo.min(x);
        x_hi = x_hi.max(x);
        y_lo = y_lo.min(y);
        y_hi = y_hi.max(y);
    }

    let mut hits = vec![0u32; width * height];
    for (x, y) in finite() {
        let col = scale(x, x_lo, x_hi, width - 1);
        // Top row holds the largest y.
        let row = height - 1 - scale(y, y_lo, y_hi, height - 1);
        hits[row * width + col] = hits[row * width + col].saturating_add(1);
    }

    let glyphs = style.glyphs();
    let mut canvas = Canvas::new(geometry, glyphs.blank);
    for (i, &n) in hits.iter().enumerate() {
        let glyph = match n {
            0 => continue,
            1 => glyphs.point,
            _ => glyphs.points,
        };
        canvas.set(i % width, i / width, glyph);
    }
    Ok(canvas.into_grid(style))
}

pub(crate) fn box_plot(stats: &BoxStats, geometry: Geometry, style: Style) -> Result<Grid> {
    let Geometry { width, height } = geometry.require(3, 1)?;
    let values = [stats.min, stats.q1, stats.median, stats.q3, stats.max];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ChartError::EmptyInput("box plot needs finite quartiles"));
    }
    let glyphs = style.glyphs();
    let mut canvas = Canvas::new(geometry, glyphs.blank);

    let row = |v: f64| height - 1 - scale(v, stats.min, stats.max, height - 1);
    let (r_max, r_q3, r_median, r_q1, r_min) = (
        row(stats.max),
        row(stats.q3),
        row(stats.median),
        row(stats.q1),
        row(stats.min),
    );
    let center = width / 2;
    let right = width - 1;

    for y in r_max..=r_min {
        canvas.set(center, y, glyphs.whisker);
    }
    for y in r_q3..=r_q1 {
        canvas.set(center, y, glyphs.blank);
        canvas.set(0, y, glyphs.box_vertical);
        canvas.set(right, y, glyphs.box_vertical);
    }
    for x in 1..right {
        canvas.set(x, r_q3, glyphs.box_horizontal);
        canvas.set(x, r_q1, glyphs.box_horizontal);
    }
    canvas.set(0, r_q3, glyphs.top_left);
    canvas.set(right, r_q3, glyphs.top_right);
    canvas.set(0, r_q1, glyphs.bottom_left);
    canvas.set(right, r_q1, glyphs.bottom_right);
    for x in 1..right {
        canvas.set(x, r_median, glyphs.median);
    }
    for x in 1..right.max(2) {
        canvas.set(x, r_max, glyphs.cap);
        canvas.set(x, r_min, glyphs.cap);
    }
    Ok(canvas.into_grid(style))
}
