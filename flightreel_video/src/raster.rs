//! Rasterization of figure specs into PNG files.

use crate::figure::{FigureSpec, LineStyle, PanelSpec, Rgb, SeriesSpec};
use flightreel_core::{ReelError, ReelResult};
use plotters::backend::BitMapBackend;
use plotters::chart::{ChartBuilder, DualCoordChartContext};
use plotters::coord::types::RangedCoordf64;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::Shift;
use plotters::drawing::{DrawingArea, IntoDrawingArea};
use plotters::element::Text;
use plotters::series::{DashedLineSeries, LineSeries};
use plotters::style::colors::{BLACK, RED, WHITE};
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{Color, IntoFont, RGBColor};
use std::error::Error;
use std::ops::Range;
use std::path::Path;

/// Header band holding the title and status line.
const HEADER_PX: i32 = 64;

/// Room on the right of each panel for current-value labels.
const VALUE_LABEL_PX: i32 = 90;

/// Turns a figure description into an image file.
///
/// # Implementations
///
/// - **Production**: `PlottersRasterizer` - draws with plotters' bitmap backend
/// - **Tests**: in-process doubles that write solid images
///
/// Implementations must be pure: the same figure always produces the same
/// pixels, and no state carries over between calls.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, figure: &FigureSpec, path: &Path) -> ReelResult<()>;
}

/// Rasterizer backed by plotters.
#[derive(Debug, Clone, Default)]
pub struct PlottersRasterizer;

impl PlottersRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl Rasterizer for PlottersRasterizer {
    fn rasterize(&self, figure: &FigureSpec, path: &Path) -> ReelResult<()> {
        draw_figure(figure, path).map_err(|e| ReelError::Render {
            frame: figure.index,
            reason: e.to_string(),
        })
    }
}

fn rgb(c: Rgb) -> RGBColor {
    RGBColor(c.0, c.1, c.2)
}

/// Y-range covering `values`, padded so lines do not touch the frame.
pub fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() {
        return 0.0..1.0;
    }
    let span = max - min;
    let pad = if span < 1e-6 { 0.5 } else { span * 0.15 };
    (min - pad)..(max + pad)
}

fn draw_figure(figure: &FigureSpec, path: &Path) -> Result<(), Box<dyn Error>> {
    let (w, h) = (figure.size.width, figure.size.height);
    let root = BitMapBackend::new(path, (w, h)).into_drawing_area();
    root.fill(&WHITE)?;

    let (header, body) = root.split_vertically(HEADER_PX);
    let centered = Pos::new(HPos::Center, VPos::Top);
    header.draw(&Text::new(
        figure.title.clone(),
        (w as i32 / 2, 8),
        ("sans-serif", 22).into_font().color(&BLACK).pos(centered),
    ))?;
    if let Some(status) = &figure.status {
        header.draw(&Text::new(
            status.clone(),
            (w as i32 / 2, 36),
            ("sans-serif", 14).into_font().color(&BLACK).pos(centered),
        ))?;
    }

    if figure.panels.is_empty() {
        root.present()?;
        return Ok(());
    }

    let areas = body.split_evenly((figure.panels.len(), 1));
    let last = figure.panels.len() - 1;
    for (i, (area, panel)) in areas.iter().zip(&figure.panels).enumerate() {
        if panel.has_data() {
            draw_panel(&root, area, figure, panel, i == last)?;
        } else {
            draw_placeholder(area, panel)?;
        }
    }

    root.present()?;
    Ok(())
}

fn draw_placeholder(
    area: &DrawingArea<BitMapBackend, Shift>,
    panel: &PanelSpec,
) -> Result<(), Box<dyn Error>> {
    let (w, h) = area.dim_in_pixel();
    let centered = Pos::new(HPos::Center, VPos::Center);
    area.draw(&Text::new(
        panel.title.clone(),
        (w as i32 / 2, 14),
        ("sans-serif", 16).into_font().color(&BLACK).pos(centered),
    ))?;
    let text = panel.placeholder.clone().unwrap_or_default();
    area.draw(&Text::new(
        text,
        (w as i32 / 2, h as i32 / 2),
        ("sans-serif", 16).into_font().color(&RED).pos(centered),
    ))?;
    Ok(())
}

type PanelChart<'a, 'b> = DualCoordChartContext<
    'a,
    BitMapBackend<'b>,
    Cartesian2d<RangedCoordf64, RangedCoordf64>,
    Cartesian2d<RangedCoordf64, RangedCoordf64>,
>;

fn draw_panel(
    root: &DrawingArea<BitMapBackend, Shift>,
    area: &DrawingArea<BitMapBackend, Shift>,
    figure: &FigureSpec,
    panel: &PanelSpec,
    bottom: bool,
) -> Result<(), Box<dyn Error>> {
    let x = figure.x_range.0..figure.x_range.1;
    let primary = padded_range(
        panel
            .series
            .iter()
            .filter(|s| !s.secondary)
            .flat_map(|s| s.points.iter().map(|p| p.1))
            .chain(panel.threshold.iter().map(|t| t.value)),
    );
    let secondary = padded_range(
        panel
            .series
            .iter()
            .filter(|s| s.secondary)
            .flat_map(|s| s.points.iter().map(|p| p.1)),
    );

    let mut chart: PanelChart = ChartBuilder::on(area)
        .caption(&panel.title, ("sans-serif", 16))
        .margin(5)
        .margin_right(VALUE_LABEL_PX)
        .x_label_area_size(if bottom { 30 } else { 18 })
        .y_label_area_size(50)
        .right_y_label_area_size(if panel.has_secondary() { 40 } else { 0 })
        .build_cartesian_2d(x.clone(), primary.clone())?
        .set_secondary_coord(x.clone(), secondary);

    chart
        .configure_mesh()
        .x_desc(if bottom { "Time (s)" } else { "" })
        .y_desc(panel.y_label.as_str())
        .x_labels(6)
        .y_labels(5)
        .light_line_style(&WHITE.mix(0.7))
        .label_style(("sans-serif", 11))
        .draw()?;
    if panel.has_secondary() {
        chart
            .configure_secondary_axes()
            .y_labels(5)
            .label_style(("sans-serif", 11))
            .draw()?;
    }

    for series in &panel.series {
        draw_series(&mut chart, series)?;
    }

    if let Some(threshold) = &panel.threshold {
        let style = RED.stroke_width(1);
        chart.draw_series(DashedLineSeries::new(
            vec![(x.start, threshold.value), (x.end, threshold.value)],
            6,
            4,
            style,
        ))?;
        let (px, py) = chart.backend_coord(&(x.start, threshold.value));
        root.draw(&Text::new(
            threshold.label.clone(),
            (px + 4, py - 14),
            ("sans-serif", 11).into_font().color(&RED),
        ))?;
    }

    // Current instant marker on the right edge.
    chart.draw_series(DashedLineSeries::new(
        vec![(x.end, primary.start), (x.end, primary.end)],
        4,
        4,
        BLACK.stroke_width(1),
    ))?;

    for series in &panel.series {
        let (Some(label), Some(value)) = (series.value_label(), series.current) else {
            continue;
        };
        let (px, py) = if series.secondary {
            chart.borrow_secondary().backend_coord(&(x.end, value))
        } else {
            chart.backend_coord(&(x.end, value))
        };
        root.draw(&Text::new(
            label,
            (px + 6, py - 6),
            ("sans-serif", 10).into_font().color(&rgb(series.color)),
        ))?;
    }
    Ok(())
}

fn draw_series(chart: &mut PanelChart<'_, '_>, series: &SeriesSpec) -> Result<(), Box<dyn Error>> {
    let style = rgb(series.color).stroke_width(2);
    let points = series.points.iter().copied();
    match (series.secondary, series.style) {
        (false, LineStyle::Solid) => {
            chart.draw_series(LineSeries::new(points, style))?;
        }
        (false, LineStyle::Dashed) => {
            chart.draw_series(DashedLineSeries::new(points, 6, 4, style))?;
        }
        (true, LineStyle::Solid) => {
            chart.draw_secondary_series(LineSeries::new(points, style))?;
        }
        (true, LineStyle::Dashed) => {
            chart.draw_secondary_series(DashedLineSeries::new(points, 6, 4, style))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::{PlotKey, Threshold};
    use approx::assert_relative_eq;
    use flightreel_env::FrameSize;
    use proptest::prelude::*;
    use tempfile::tempdir;

    /// Text rendering needs a system font; headless CI images may have none.
    fn fonts_available() -> bool {
        let mut buf = vec![0u8; 64 * 32 * 3];
        let root = BitMapBackend::with_buffer(&mut buf, (64, 32)).into_drawing_area();
        root.draw(&Text::new("Ag", (2, 2), ("sans-serif", 12).into_font())).is_ok()
    }

    fn series(label: &str, color: Rgb, style: LineStyle, secondary: bool, scale: f64) -> SeriesSpec {
        SeriesSpec {
            label: label.to_string(),
            abbr: label.to_string(),
            points: (0..30).map(|i| (-3.0 + i as f64 * 0.1, scale * (i as f64 * 0.3).sin())).collect(),
            current: Some(scale),
            color,
            style,
            secondary,
        }
    }

    fn panel(key: PlotKey, series: Vec<SeriesSpec>) -> PanelSpec {
        PanelSpec {
            key,
            title: key.title().to_string(),
            y_label: "value".to_string(),
            series,
            placeholder: None,
            threshold: None,
        }
    }

    fn sample_figure() -> FigureSpec {
        let mut speed = panel(
            PlotKey::Speed,
            vec![
                series("Gnd", Rgb::BLUE, LineStyle::Solid, false, 15.0),
                series("Air", Rgb::PURPLE, LineStyle::Dashed, false, 14.0),
            ],
        );
        speed.threshold = Some(Threshold {
            label: "12.0 Stall".to_string(),
            value: 12.0,
        });
        let battery = panel(
            PlotKey::Battery,
            vec![
                series("V", Rgb::GREEN, LineStyle::Solid, false, 12.0),
                series("A", Rgb::RED, LineStyle::Dashed, true, 30.0),
            ],
        );
        let mut flow = panel(PlotKey::OpticalFlow, Vec::new());
        flow.placeholder = Some("No Optical Flow data".to_string());
        FigureSpec {
            index: 4,
            title: "flight # 12:00:03.000".to_string(),
            status: Some("Mode 5 | Armed".to_string()),
            size: FrameSize::new(320, 480),
            x_range: (-3.0, 0.0),
            panels: vec![speed, battery, flow],
        }
    }

    #[test]
    fn test_padded_range() {
        let r = padded_range([1.0, 3.0, f64::NAN].into_iter());
        assert_relative_eq!(r.start, 0.7);
        assert_relative_eq!(r.end, 3.3);

        let flat = padded_range([5.0, 5.0].into_iter());
        assert_relative_eq!(flat.start, 4.5);
        assert_relative_eq!(flat.end, 5.5);

        assert_eq!(padded_range(std::iter::empty()), 0.0..1.0);
    }

    proptest! {
        #[test]
        fn prop_padded_range_covers_values(values in prop::collection::vec(-1e6f64..1e6, 1..50)) {
            let r = padded_range(values.iter().copied());
            prop_assert!(r.start < r.end);
            for v in values {
                prop_assert!(r.start < v && v < r.end);
            }
        }
    }

    #[test]
    fn test_rasterize_is_pixel_stable() {
        if !fonts_available() {
            eprintln!("no usable system font, skipping plotters rasterization");
            return;
        }
        let dir = tempdir().unwrap();
        let first = dir.path().join("a.png");
        let second = dir.path().join("b.png");
        let figure = sample_figure();
        assert!(figure.panels[1].has_secondary());
        assert!(!figure.panels[2].has_data());

        let raster = PlottersRasterizer::new();
        raster.rasterize(&figure, &first).unwrap();
        raster.rasterize(&figure, &second).unwrap();

        let a = image::open(&first).unwrap().to_rgb8();
        let b = image::open(&second).unwrap().to_rgb8();
        assert_eq!((a.width(), a.height()), (320, 480));
        assert_eq!(a.as_raw(), b.as_raw());
        assert!(a.pixels().any(|p| p.0 != [255, 255, 255]));
    }
}
