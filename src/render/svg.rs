//! Charts drawn with plotters into an in-memory SVG document. Every function
//! returns a complete `<svg>` element, or a placeholder `<div>` when there is
//! nothing to draw.

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::label;
use crate::aggregate::PivotTable;

const PALETTE: [RGBColor; 10] = [
    RGBColor(0x63, 0x6e, 0xfa),
    RGBColor(0xef, 0x55, 0x3b),
    RGBColor(0x00, 0xcc, 0x96),
    RGBColor(0xab, 0x63, 0xfa),
    RGBColor(0xff, 0xa1, 0x5a),
    RGBColor(0x19, 0xd3, 0xf3),
    RGBColor(0xff, 0x66, 0x92),
    RGBColor(0xb6, 0xe8, 0x80),
    RGBColor(0xff, 0x97, 0xff),
    RGBColor(0xfe, 0xcb, 0x52),
];

const FONT: &str = "sans-serif";

/// Slices past this many are folded into "Other".
const MAX_SLICES: usize = 9;

fn placeholder() -> String {
    r#"<div class="empty">No data</div>"#.to_string()
}

fn color(i: usize) -> RGBColor {
    PALETTE[i % PALETTE.len()]
}

/// Run `draw` on a white canvas of `size` pixels and return the SVG text.
fn render<F>(size: (u32, u32), draw: F) -> Result<String>
where
    F: FnOnce(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<()>,
{
    let mut buf = String::new();
    {
        let root = SVGBackend::with_string(&mut buf, size).into_drawing_area();
        root.fill(&WHITE)?;
        draw(&root)?;
        root.present()?;
    }
    Ok(buf)
}

/// Axis label for a segment of a category axis.
fn segment_label(names: &[String], v: &SegmentValue<u32>) -> String {
    match v {
        SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => {
            names.get(*i as usize).cloned().unwrap_or_default()
        }
        SegmentValue::Last => String::new(),
    }
}

/// Pie with labelled slices. `data` should already be sorted largest first.
pub fn pie(data: &[(String, usize)]) -> Result<String> {
    let total: usize = data.iter().map(|(_, n)| n).sum();
    if total == 0 {
        return Ok(placeholder());
    }

    let mut slices: Vec<(String, usize)> = data.iter().take(MAX_SLICES).cloned().collect();
    if data.len() > MAX_SLICES {
        let rest: usize = data[MAX_SLICES..].iter().map(|(_, n)| n).sum();
        slices.push(("Other".to_string(), rest));
    }
    let sizes: Vec<f64> = slices.iter().map(|(_, n)| *n as f64).collect();
    let colors: Vec<RGBColor> = (0..slices.len()).map(color).collect();
    let labels: Vec<String> = slices
        .iter()
        .map(|(name, n)| format!("{} ({})", truncate(label(name), 20), n))
        .collect();

    render((480, 320), |root| {
        let center = (240, 160);
        let radius = 100.0;
        let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
        pie.start_angle(-90.0);
        pie.label_style((FONT, 12).into_font().color(&BLACK));
        pie.percentages((FONT, 11).into_font().color(&WHITE));
        root.draw(&pie)?;
        Ok(())
    })
}

/// Vertical bars, one per entry, in the given order.
pub fn bar(data: &[(String, usize)]) -> Result<String> {
    let max = data.iter().map(|(_, n)| *n).max().unwrap_or(0);
    if data.is_empty() || max == 0 {
        return Ok(placeholder());
    }

    let names: Vec<String> = data
        .iter()
        .map(|(name, _)| truncate(label(name), 14))
        .collect();
    let width = (100 + data.len() as u32 * 64).max(360);

    render((width, 340), |root| {
        let mut chart = ChartBuilder::on(root)
            .margin(10)
            .x_label_area_size(50)
            .y_label_area_size(50)
            .build_cartesian_2d(
                (0u32..data.len() as u32).into_segmented(),
                0u32..(max as u32 + 1),
            )?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(data.len())
            .x_label_formatter(&|v: &SegmentValue<u32>| segment_label(&names, v))
            .y_desc("Companies")
            .label_style((FONT, 11))
            .draw()?;

        chart.draw_series(
            Histogram::vertical(&chart)
                .style(color(0).filled())
                .margin(8)
                .data(data.iter().enumerate().map(|(i, (_, n))| (i as u32, *n as u32))),
        )?;
        Ok(())
    })
}

/// Line over dates; x is proportional to elapsed days.
pub fn line(points: &[(NaiveDate, usize)]) -> Result<String> {
    let max = points.iter().map(|(_, n)| *n).max().unwrap_or(0);
    if points.is_empty() || max == 0 {
        return Ok(placeholder());
    }

    let first = points[0].0;
    let span = (points[points.len() - 1].0 - first).num_days().max(1);
    let xy: Vec<(i64, u32)> = points
        .iter()
        .map(|(d, n)| ((*d - first).num_days(), *n as u32))
        .collect();
    let day = |offset: &i64| {
        (first + Duration::days(*offset))
            .format("%Y-%m-%d")
            .to_string()
    };

    render((760, 320), |root| {
        let mut chart = ChartBuilder::on(root)
            .margin(16)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(0i64..span, 0u32..(max as u32 + 1))?;

        chart
            .configure_mesh()
            .x_labels(6)
            .x_label_formatter(&day)
            .y_desc("Records")
            .label_style((FONT, 11))
            .draw()?;

        chart.draw_series(LineSeries::new(xy.iter().copied(), color(0).stroke_width(2)))?;
        chart.draw_series(xy.iter().map(|&p| Circle::new(p, 3, color(0).filled())))?;
        Ok(())
    })
}

/// Shaded grid of counts; the first pivot row is drawn at the top.
pub fn heatmap(table: &PivotTable) -> Result<String> {
    let max = table.max();
    if table.is_empty() || max == 0 {
        return Ok(placeholder());
    }

    let (nr, nc) = (table.rows.len() as u32, table.cols.len() as u32);
    let col_names: Vec<String> = table
        .cols
        .iter()
        .map(|c| truncate(label(c), 12))
        .collect();
    // y grows upwards, so the label list runs bottom to top
    let row_names: Vec<String> = table
        .rows
        .iter()
        .rev()
        .map(|r| truncate(label(r), 20))
        .collect();
    let cell_font = TextStyle::from((FONT, 11).into_font()).pos(Pos::new(HPos::Center, VPos::Center));

    render((200 + nc * 72, 90 + nr * 32), |root| {
        let mut chart = ChartBuilder::on(root)
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(150)
            .build_cartesian_2d((0u32..nc).into_segmented(), (0u32..nr).into_segmented())?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(nc as usize)
            .y_labels(nr as usize)
            .x_label_formatter(&|v: &SegmentValue<u32>| segment_label(&col_names, v))
            .y_label_formatter(&|v: &SegmentValue<u32>| segment_label(&row_names, v))
            .x_desc(table.col_field.canonical_name())
            .y_desc(table.row_field.canonical_name())
            .label_style((FONT, 11))
            .draw()?;

        let cells = || {
            table.cells.iter().enumerate().flat_map(move |(i, row)| {
                let y = nr - 1 - i as u32;
                row.iter().enumerate().map(move |(j, n)| (j as u32, y, *n))
            })
        };
        chart.draw_series(cells().map(|(x, y, n)| {
            let t = n as f64 / max as f64;
            Rectangle::new(
                [
                    (SegmentValue::Exact(x), SegmentValue::Exact(y)),
                    (SegmentValue::Exact(x + 1), SegmentValue::Exact(y + 1)),
                ],
                color(0).mix(0.06 + 0.94 * t).filled(),
            )
        }))?;
        chart.draw_series(cells().map(|(x, y, n)| {
            Text::new(
                n.to_string(),
                (SegmentValue::CenterOf(x), SegmentValue::CenterOf(y)),
                cell_font.clone(),
            )
        }))?;
        Ok(())
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max - 1).collect();
        out.push('…');
        out
    }
}
