use std::fs;
use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use plotters::style::FontTransform;
use tracing::info;

use crate::chart::{ChartDescriptor, Series};
use crate::error::{Error, Result};

const SIZE: (u32, u32) = (800, 500);

// Ten-colour categorical cycle, the sum line takes the first //
const PALETTE: [RGBColor; 10] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0xd6, 0x27, 0x28),
    RGBColor(0x94, 0x67, 0xbd),
    RGBColor(0x8c, 0x56, 0x4b),
    RGBColor(0xe3, 0x77, 0xc2),
    RGBColor(0x7f, 0x7f, 0x7f),
    RGBColor(0xbc, 0xbd, 0x22),
    RGBColor(0x17, 0xbe, 0xcf),
];

fn series_color(rank: usize) -> RGBColor {
    PALETTE[(rank + 1) % PALETTE.len()]
}

/// Bars sit on the bucket index, one unit wide. Each nonzero count becomes
/// a segment starting at its stack offset.
fn bar_corners(series: &Series) -> Vec<[(f64, f64); 2]> {
    series
        .counts
        .iter()
        .zip(&series.offsets)
        .enumerate()
        .filter(|(_, (count, _))| **count > 0)
        .map(|(index, (&count, &offset))| {
            let x = index as f64;
            [(x - 0.5, offset as f64), (x + 0.5, (offset + count) as f64)]
        })
        .collect()
}

/// Label for a tick at bucket position `x`. Only whole bucket positions get
/// a label, so every label names a real bucket start.
fn bucket_label(first: NaiveDateTime, interval_seconds: u32, x: f64) -> String {
    if x < 0.0 || (x - x.round()).abs() > 1e-6 {
        return String::new();
    }
    let offset = i64::from(interval_seconds) * x.round() as i64;
    (first + Duration::seconds(offset)).format("%b %d %H00").to_string()
}

fn draw<DB: DrawingBackend>(
    chart: &ChartDescriptor,
    root: &DrawingArea<DB, Shift>,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;

    let first = chart.buckets[0];
    let last_index = chart.buckets.len() as f64 - 1.0;
    let max_value = chart.max_value().max(1);

    let mut cc = ChartBuilder::on(root)
        .caption(&chart.title, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(90)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5..last_index + 0.5, 0f64..max_value as f64 * 1.05)?;

    let x_formatter = |x: &f64| bucket_label(first, chart.interval_seconds, *x);
    let y_formatter = |y: &f64| format!("{:.0}", y);
    cc.configure_mesh()
        .disable_mesh()
        .x_labels(chart.buckets.len().min(24))
        .y_labels((max_value as usize + 1).min(10))
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter)
        .x_label_style(("sans-serif", 10).into_font().transform(FontTransform::Rotate90))
        .draw()?;

    for (rank, series) in chart.series.iter().enumerate() {
        let color = series_color(rank);
        cc.draw_series(
            bar_corners(series)
                .into_iter()
                .map(move |corners| Rectangle::new(corners, color.filled())),
        )?
        .label(series.command.as_str())
        .legend(move |(x, y)| Rectangle::new([(x, y - 4), (x + 16, y + 4)], color.filled()));
    }

    let sum_color = PALETTE[0];
    cc.draw_series(LineSeries::new(
        chart.total.iter().enumerate().map(|(index, &total)| (index as f64, total as f64)),
        sum_color.stroke_width(1),
    ))?
    .label("sum")
    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 16, y)], sum_color.stroke_width(2)));

    cc.configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()
}

pub fn svg_document(chart: &ChartDescriptor) -> Result<String> {
    if chart.is_empty() {
        return Err(Error::EmptyChart);
    }
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        draw(chart, &root).map_err(|e| Error::Render(e.to_string()))?;
    }
    Ok(svg)
}

/// Renders `chart` and writes it to `path`, replacing any existing file.
pub fn write_svg(chart: &ChartDescriptor, path: &Path) -> Result<()> {
    let document = svg_document(chart)?;
    fs::write(path, document).map_err(|e| Error::io(path, e))?;
    info!(path = %path.display(), buckets = chart.buckets.len(), "wrote chart");
    Ok(())
}
