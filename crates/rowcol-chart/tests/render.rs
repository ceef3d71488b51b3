use pretty_assertions::assert_eq;
use rowcol_chart::{
    render, BoxStats, Chart, ChartError, Geometry, Style, DEFAULT_BOX_WIDTH, DEFAULT_HEIGHT,
    DEFAULT_WIDTH,
};

fn rows(grid: &rowcol_chart::Grid) -> Vec<&str> {
    grid.rows.iter().map(String::as_str).collect()
}

/// Which cells are painted, independent of the glyph.
fn mask(grid: &rowcol_chart::Grid) -> Vec<Vec<bool>> {
    grid.rows
        .iter()
        .map(|row| row.chars().map(|c| c != ' ').collect())
        .collect()
}

fn assert_shape(grid: &rowcol_chart::Grid, geometry: Geometry) {
    assert_eq!(grid.width, geometry.width);
    assert_eq!(grid.height, geometry.height);
    assert_eq!(grid.rows.len(), geometry.height);
    assert!(grid.rows.iter().all(|r| r.chars().count() == geometry.width));
}

fn one_to_nine() -> BoxStats {
    BoxStats {
        min: 1.0,
        q1: 3.0,
        median: 5.0,
        q3: 7.0,
        max: 9.0,
    }
}

#[test]
fn histogram_bars_fill_their_columns() {
    let grid = render(
        &Chart::Histogram(vec![1, 4, 2]),
        Geometry::new(6, 4),
        Style::Ascii,
    )
    .expect("render");
    assert_eq!(rows(&grid), vec!["  ##  ", "  ##  ", "  ####", "######"]);
    assert_eq!(grid.to_string(), "  ##  \n  ##  \n  ####\n######");
}

#[test]
fn scatter_marks_collisions() {
    let points = vec![(0.0, 0.0), (10.0, 10.0), (10.0, 10.0), (5.0, 5.0)];
    let grid = render(&Chart::Scatter(points), Geometry::new(3, 3), Style::Ascii).expect("render");
    assert_eq!(rows(&grid), vec!["  @", " * ", "*  "]);

    let grid = render(
        &Chart::Scatter(vec![(1.0, 1.0), (1.0, 1.0), (1.0, 1.0)]),
        Geometry::new(5, 3),
        Style::Unicode,
    )
    .expect("render");
    assert_eq!(rows(&grid), vec!["     ", "  ◉  ", "     "]);
}

#[test]
fn box_plot_of_one_to_nine() {
    let grid = render(
        &Chart::BoxPlot(one_to_nine()),
        Geometry::new(DEFAULT_BOX_WIDTH, 9),
        Style::Ascii,
    )
    .expect("render");
    assert_eq!(
        rows(&grid),
        vec![
            " ----- ", "   |   ", "+-----+", "|     |", "|=====|", "|     |", "+-----+",
            "   |   ", " ----- ",
        ]
    );

    let unicode = render(
        &Chart::BoxPlot(one_to_nine()),
        Geometry::new(DEFAULT_BOX_WIDTH, 9),
        Style::Unicode,
    )
    .expect("render");
    assert_eq!(
        rows(&unicode),
        vec![
            " ───── ", "   │   ", "┌─────┐", "│     │", "│━━━━━│", "│     │", "└─────┘",
            "   │   ", " ───── ",
        ]
    );
}

#[test]
fn styles_share_geometry() {
    let charts = [
        Chart::Histogram(vec![3, 0, 7, 1, 9, 2, 2, 5, 0, 4]),
        Chart::Scatter((0..40).map(|i| (i as f64, ((i * 7) % 13) as f64)).collect()),
        Chart::BoxPlot(one_to_nine()),
    ];
    for chart in &charts {
        let geometry = match chart {
            Chart::BoxPlot(_) => Geometry::new(DEFAULT_BOX_WIDTH, DEFAULT_HEIGHT),
            _ => Geometry::default(),
        };
        let ascii = render(chart, geometry, Style::Ascii).expect("ascii");
        let unicode = render(chart, geometry, Style::Unicode).expect("unicode");
        assert_shape(&ascii, geometry);
        assert_shape(&unicode, geometry);
        assert_eq!(mask(&ascii), mask(&unicode));
    }
    assert_eq!(Geometry::default(), Geometry::new(DEFAULT_WIDTH, DEFAULT_HEIGHT));
    assert_eq!(Style::default(), Style::Ascii);
}

#[test]
fn bad_geometry_and_empty_input_are_errors() {
    assert!(matches!(
        render(&Chart::Histogram(vec![1]), Geometry::new(0, 5), Style::Ascii),
        Err(ChartError::InvalidGeometry { .. })
    ));
    assert!(matches!(
        render(&Chart::BoxPlot(one_to_nine()), Geometry::new(2, 5), Style::Ascii),
        Err(ChartError::InvalidGeometry { min_width: 3, .. })
    ));
    assert_eq!(
        render(&Chart::Scatter(Vec::new()), Geometry::default(), Style::Ascii),
        Err(ChartError::EmptyInput("scatter plot has no finite points"))
    );
    assert!(matches!(
        render(&Chart::Histogram(Vec::new()), Geometry::default(), Style::Ascii),
        Err(ChartError::EmptyInput(_))
    ));
}
