//! PNG rendering for the harness figures
//!
//! Text (captions, axis descriptions, legends) needs a registered TrueType
//! font. [`register_font`] tries an explicit path, then a few common system
//! locations; when none loads, charts are still drawn, just without text.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use plotters::coord::ranged1d::SegmentValue;
use plotters::prelude::*;
use plotters::style::FontStyle;

use crate::error::{Result, SurvivalError};

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

static TEXT_ENABLED: AtomicBool = AtomicBool::new(false);

/// register a sans-serif font for chart text; returns whether text is on
pub fn register_font(preferred: Option<&Path>) -> bool {
    if TEXT_ENABLED.load(Ordering::Acquire) {
        return true;
    }

    let candidates = preferred
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONTS.iter().map(PathBuf::from));

    for path in candidates {
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        // registered fonts live for the rest of the process
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        match plotters::style::register_font("sans-serif", FontStyle::Normal, bytes) {
            Ok(()) => {
                debug!("chart font: {}", path.display());
                TEXT_ENABLED.store(true, Ordering::Release);
                return true;
            }
            Err(_) => warn!("unusable font {}", path.display()),
        }
    }

    warn!("no truetype font found - figures will be drawn without text");
    false
}

pub fn text_enabled() -> bool {
    TEXT_ENABLED.load(Ordering::Acquire)
}

/// figure size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigureSize {
    pub width: u32,
    pub height: u32,
}

impl FigureSize {
    /// 6x4 inches at 150 dpi
    pub const KAPLAN_MEIER: FigureSize = FigureSize { width: 900, height: 600 };
    /// 7x5 inches at 150 dpi
    pub const COEFFICIENTS: FigureSize = FigureSize { width: 1050, height: 750 };
}

/// one labelled step curve
#[derive(Debug, Clone, PartialEq)]
pub struct CurveSeries {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

/// overlay survival step curves on one set of axes
pub fn draw_survival_curves(
    path: &Path,
    size: FigureSize,
    title: &str,
    curves: &[CurveSeries],
) -> Result<()> {
    survival_curves(path, size, title, curves, text_enabled())
}

fn survival_curves(
    path: &Path,
    size: FigureSize,
    title: &str,
    curves: &[CurveSeries],
    text: bool,
) -> Result<()> {
    let x_max = curves
        .iter()
        .flat_map(|c| c.points.iter().map(|p| p.0))
        .fold(0.0_f64, f64::max)
        .max(1.0);

    let root = BitMapBackend::new(path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE).map_err(SurvivalError::plot)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(15);
    if text {
        builder
            .caption(title, ("sans-serif", 22))
            .x_label_area_size(40)
            .y_label_area_size(55);
    }
    let mut chart = builder
        .build_cartesian_2d(0.0..x_max * 1.02, 0.0..1.05)
        .map_err(SurvivalError::plot)?;

    // without label areas the mesh draws no text
    let mut mesh = chart.configure_mesh();
    if text {
        mesh.x_desc("Time").y_desc("Survival probability");
    }
    mesh.draw().map_err(SurvivalError::plot)?;

    for (idx, curve) in curves.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        let series = chart
            .draw_series(LineSeries::new(curve.points.iter().copied(), color.stroke_width(2)))
            .map_err(SurvivalError::plot)?;
        if text {
            series
                .label(curve.label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        }
    }

    if text && !curves.is_empty() {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(SurvivalError::plot)?;
    }

    root.present().map_err(SurvivalError::plot)?;
    Ok(())
}

/// vertical bar chart, one bar per (label, value)
pub fn draw_bar_chart(
    path: &Path,
    size: FigureSize,
    title: &str,
    bars: &[(String, f64)],
) -> Result<()> {
    bar_chart(path, size, title, bars, text_enabled())
}

fn bar_chart(
    path: &Path,
    size: FigureSize,
    title: &str,
    bars: &[(String, f64)],
    text: bool,
) -> Result<()> {
    let n = bars.len().max(1);
    let lo = bars.iter().map(|b| b.1).fold(0.0_f64, f64::min);
    let hi = bars.iter().map(|b| b.1).fold(0.0_f64, f64::max);
    let pad = ((hi - lo) * 0.1).max(1e-3);

    let root = BitMapBackend::new(path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE).map_err(SurvivalError::plot)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(15);
    if text {
        builder
            .caption(title, ("sans-serif", 22))
            .x_label_area_size(140)
            .y_label_area_size(60);
    }
    let mut chart = builder
        .build_cartesian_2d((0..n).into_segmented(), (lo - pad)..(hi + pad))
        .map_err(SurvivalError::plot)?;

    let label_of = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(i) => bars.get(*i).map(|b| b.0.clone()).unwrap_or_default(),
        _ => String::new(),
    };

    // a segmented axis needs at least one key point, text or not
    let mut mesh = chart.configure_mesh();
    mesh.disable_x_mesh().x_labels(n);
    if text {
        mesh.x_desc("Feature")
            .y_desc("Coefficient")
            .x_label_formatter(&label_of)
            .x_label_style(("sans-serif", 11).into_font().transform(FontTransform::Rotate90));
    }
    mesh.draw().map_err(SurvivalError::plot)?;

    chart
        .draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
            Rectangle::new(
                [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *value)],
                BLUE.mix(0.7).filled(),
            )
        }))
        .map_err(SurvivalError::plot)?;

    root.present().map_err(SurvivalError::plot)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curves_png_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curves.png");
        let curves = vec![
            CurveSeries { label: "A".into(), points: vec![(0.0, 1.0), (2.0, 1.0), (2.0, 0.5), (5.0, 0.5)] },
            CurveSeries { label: "B".into(), points: vec![(0.0, 1.0), (4.0, 1.0), (4.0, 0.2)] },
        ];

        draw_survival_curves(&path, FigureSize::KAPLAN_MEIER, "test", &curves).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_bar_chart_png_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.png");
        let bars = vec![("a".to_string(), 0.7), ("b".to_string(), 0.1), ("c".to_string(), -0.4)];

        draw_bar_chart(&path, FigureSize::COEFFICIENTS, "test", &bars).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_charts_without_text() {
        let dir = tempfile::tempdir().unwrap();

        let bars: Vec<(String, f64)> = (0..20).map(|i| (format!("f{}", i), 0.5 - i as f64 * 0.05)).collect();
        let bar_path = dir.path().join("bars.png");
        bar_chart(&bar_path, FigureSize::COEFFICIENTS, "test", &bars, false).unwrap();
        assert!(bar_path.exists());

        let single = dir.path().join("single.png");
        bar_chart(&single, FigureSize::COEFFICIENTS, "test", &bars[..1], false).unwrap();
        assert!(single.exists());

        let curve_path = dir.path().join("curves.png");
        let curves = vec![CurveSeries { label: "A".into(), points: vec![(0.0, 1.0), (3.0, 1.0), (3.0, 0.4)] }];
        survival_curves(&curve_path, FigureSize::KAPLAN_MEIER, "test", &curves, false).unwrap();
        assert!(curve_path.exists());
    }
}
