use crate::chart::LegendPosition;
use crate::data::days_to_date;
use crate::error::{Error, Result};
use crate::ir::{AxisKind, DrawCommand, LegendEntry, LegendKind, Scale, SceneGraph};
use crate::labels::{place_labels, text_extent, LabelRequest, PixelRect};
use crate::theme_resolve::ResolvedTheme;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::FontTransform;

/// Style configuration for line layers
#[derive(Debug, Clone, PartialEq)]
pub struct LineStyle {
    pub color: RGBColor,
    /// Stroke width in pixels
    pub width: f64,
    pub alpha: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointShape {
    Circle,
    Triangle,
    Square,
    Cross,
}

impl PointShape {
    /// Shape for the n-th series, cycling.
    pub fn from_index(index: usize) -> Self {
        [PointShape::Circle, PointShape::Triangle, PointShape::Square, PointShape::Cross][index % 4]
    }
}

/// Style configuration for point layers
#[derive(Debug, Clone, PartialEq)]
pub struct PointStyle {
    pub color: RGBColor,
    /// Radius in pixels
    pub size: f64,
    pub shape: PointShape,
    pub alpha: f64,
}

/// Style configuration for bars and boxes
#[derive(Debug, Clone, PartialEq)]
pub struct BarStyle {
    pub fill: RGBColor,
    pub alpha: f64,
    pub outline: Option<RGBColor>,
    /// Fraction of a category slot
    pub width: f64,
}

/// Style configuration for filled regions
#[derive(Debug, Clone, PartialEq)]
pub struct AreaStyle {
    pub fill: RGBColor,
    pub alpha: f64,
    pub outline: Option<RGBColor>,
    /// Fraction of a category slot (violins)
    pub width: f64,
}

const OUTER_MARGIN: u32 = 12;
const TICK_TARGET: usize = 6;
const TICK_LEN: i32 = 5;

/// Draw a compiled scene onto any plotters drawing area.
pub fn draw_scene<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    scene: &SceneGraph,
    theme: &ResolvedTheme,
) -> Result<()> {
    root.fill(&theme.background).map_err(Error::render)?;
    let family = theme.font_family.as_str();

    // Header: title and subtitle
    let mut body = root.clone();
    let header_h = header_height(scene, theme);
    if header_h > 0 {
        let (header, rest) = body.split_vertically(header_h);
        let mut y = OUTER_MARGIN as i32;
        if let Some(title) = &scene.labels.title {
            let font = (family, theme.title_size, FontStyle::Bold).into_font().color(&theme.text_color);
            header.draw(&Text::new(title.clone(), (OUTER_MARGIN as i32, y), font)).map_err(Error::render)?;
            y += (theme.title_size * 1.4) as i32;
        }
        if let Some(subtitle) = &scene.labels.subtitle {
            let font = (family, theme.subtitle_size).into_font().color(&theme.subtle_text_color);
            header.draw(&Text::new(subtitle.clone(), (OUTER_MARGIN as i32, y), font)).map_err(Error::render)?;
        }
        body = rest;
    }

    // Footer: caption
    if let Some(caption) = &scene.labels.caption {
        let footer_h = (theme.caption_size * 2.0) as u32;
        let (_, h) = body.dim_in_pixel();
        let (upper, footer) = body.split_vertically(h.saturating_sub(footer_h));
        let font = (family, theme.caption_size, FontStyle::Italic).into_font().color(&theme.subtle_text_color);
        let (w, _) = footer.dim_in_pixel();
        let (text_w, _) = text_extent(caption, theme.caption_size);
        let x = (w as f64 - text_w - OUTER_MARGIN as f64).max(OUTER_MARGIN as f64) as i32;
        footer.draw(&Text::new(caption.clone(), (x, (theme.caption_size * 0.4) as i32), font)).map_err(Error::render)?;
        body = upper;
    }

    let plot_area = draw_outer_legend(&body, scene, theme)?;
    draw_chart(root, &plot_area, scene, theme)
}

fn header_height(scene: &SceneGraph, theme: &ResolvedTheme) -> u32 {
    let mut h = 0.0;
    if scene.labels.title.is_some() {
        h += theme.title_size * 1.4;
    }
    if scene.labels.subtitle.is_some() {
        h += theme.subtitle_size * 1.4;
    }
    if h > 0.0 {
        h += OUTER_MARGIN as f64 * 1.5;
    }
    h as u32
}

/// Carve out and draw a legend beside the plot; returns the remaining area.
fn draw_outer_legend<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    scene: &SceneGraph,
    theme: &ResolvedTheme,
) -> Result<DrawingArea<DB, Shift>> {
    if scene.legend.is_empty() {
        return Ok(area.clone());
    }
    let (w, h) = area.dim_in_pixel();
    let row_h = (theme.legend_text_size * 1.6) as u32;
    let column_w = legend_column_width(&scene.legend, theme);
    let row_w: u32 = scene.legend.iter().map(|e| legend_item_width(e, theme)).sum();
    let column_top = (h / 2) as i32 - (row_h * scene.legend.len() as u32 / 2) as i32;

    match scene.legend_position {
        LegendPosition::Right => {
            let (plot, legend) = area.split_horizontally(w.saturating_sub(column_w));
            draw_legend_column(&legend, &scene.legend, theme, (8, column_top))?;
            Ok(plot)
        }
        LegendPosition::Left => {
            let (legend, plot) = area.split_horizontally(column_w);
            draw_legend_column(&legend, &scene.legend, theme, (8, column_top))?;
            Ok(plot)
        }
        LegendPosition::Top => {
            let (legend, plot) = area.split_vertically(row_h + 8);
            draw_legend_row(&legend, &scene.legend, theme, ((w.saturating_sub(row_w) / 2) as i32, 4))?;
            Ok(plot)
        }
        LegendPosition::Bottom => {
            let (plot, legend) = area.split_vertically(h.saturating_sub(row_h + 8));
            draw_legend_row(&legend, &scene.legend, theme, ((w.saturating_sub(row_w) / 2) as i32, 4))?;
            Ok(plot)
        }
        LegendPosition::Inside | LegendPosition::None => Ok(area.clone()),
    }
}

fn legend_item_width(entry: &LegendEntry, theme: &ResolvedTheme) -> u32 {
    let (text_w, _) = text_extent(&entry.label, theme.legend_text_size);
    (text_w + theme.legend_text_size * 3.0) as u32
}

fn legend_column_width(entries: &[LegendEntry], theme: &ResolvedTheme) -> u32 {
    entries.iter().map(|e| legend_item_width(e, theme)).max().unwrap_or(0) + 16
}

fn draw_legend_column<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    entries: &[LegendEntry],
    theme: &ResolvedTheme,
    origin: (i32, i32),
) -> Result<()> {
    let row_h = (theme.legend_text_size * 1.6) as i32;
    for (i, entry) in entries.iter().enumerate() {
        draw_legend_item(area, entry, theme, (origin.0, origin.1.max(0) + i as i32 * row_h))?;
    }
    Ok(())
}

fn draw_legend_row<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    entries: &[LegendEntry],
    theme: &ResolvedTheme,
    origin: (i32, i32),
) -> Result<()> {
    let mut x = origin.0;
    for entry in entries {
        draw_legend_item(area, entry, theme, (x, origin.1))?;
        x += legend_item_width(entry, theme) as i32;
    }
    Ok(())
}

fn draw_legend_item<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    entry: &LegendEntry,
    theme: &ResolvedTheme,
    (x, y): (i32, i32),
) -> Result<()> {
    let key = (theme.legend_text_size * 1.1) as i32;
    let mid = y + key / 2;
    match entry.kind {
        LegendKind::Line => area.draw(&PathElement::new(
            vec![(x, mid), (x + key, mid)],
            entry.color.stroke_width(3),
        )),
        LegendKind::Point => area.draw(&Circle::new((x + key / 2, mid), key / 3, entry.color.filled())),
        LegendKind::Swatch => area.draw(&Rectangle::new([(x, y), (x + key, y + key)], entry.color.filled())),
    }
    .map_err(Error::render)?;

    let font = (theme.font_family.as_str(), theme.legend_text_size).into_font().color(&theme.text_color);
    area.draw(&Text::new(entry.label.clone(), (x + key + 6, y), font)).map_err(Error::render)?;
    Ok(())
}

/// Tick positions, minor positions and label text for one axis.
struct AxisTicks {
    major: Vec<f64>,
    minor: Vec<f64>,
}

fn axis_ticks(scale: &Scale, minor: bool) -> AxisTicks {
    let (lo, hi) = scale.domain;
    let major = match scale.kind {
        AxisKind::Categorical => (0..scale.categories.len()).map(|i| i as f64).collect(),
        AxisKind::Date => date_ticks(lo, hi, TICK_TARGET),
        AxisKind::Continuous => nice_ticks(lo, hi, TICK_TARGET),
    };
    let minor = if minor && scale.kind != AxisKind::Categorical && major.len() > 1 {
        let step = major[1] - major[0];
        let mut points: Vec<f64> = major.iter().map(|m| m - step / 2.0).collect();
        points.push(major[major.len() - 1] + step / 2.0);
        points.retain(|p| *p >= lo && *p <= hi);
        points
    } else {
        Vec::new()
    };
    AxisTicks { major, minor }
}

/// Round-number ticks covering `[lo, hi]`, roughly `target` of them.
pub fn nice_ticks(lo: f64, hi: f64, target: usize) -> Vec<f64> {
    let span = hi - lo;
    if !span.is_finite() || span <= 0.0 {
        return vec![lo];
    }
    let raw = span / target.max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let norm = raw / magnitude;
    let step = magnitude
        * if norm < 1.5 {
            1.0
        } else if norm < 3.0 {
            2.0
        } else if norm < 7.0 {
            5.0
        } else {
            10.0
        };
    let first = (lo / step).ceil();
    (0..)
        .map(|i| (first + i as f64) * step)
        .take_while(|v| *v <= hi + step * 1e-9)
        .map(|v| if v.abs() < step * 1e-9 { 0.0 } else { v })
        .collect()
}

/// Day-aligned ticks with calendar-friendly steps.
fn date_ticks(lo: f64, hi: f64, target: usize) -> Vec<f64> {
    const STEPS: [f64; 9] = [1.0, 2.0, 7.0, 14.0, 28.0, 56.0, 91.0, 182.0, 365.0];
    let span = hi - lo;
    let step = STEPS
        .iter()
        .copied()
        .find(|s| span / s <= target as f64)
        .unwrap_or(365.0);
    let first = (lo / step).ceil();
    (0..)
        .map(|i| (first + i as f64) * step)
        .take_while(|v| *v <= hi)
        .collect()
}

/// Compact tick label: thousands as `k`, millions as `M`.
pub fn format_tick(v: f64) -> String {
    let trim = |s: String| {
        if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            s
        }
    };
    let abs = v.abs();
    if abs >= 1e6 {
        format!("{}M", trim(format!("{:.1}", v / 1e6)))
    } else if abs >= 1e4 {
        format!("{}k", trim(format!("{:.1}", v / 1e3)))
    } else if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        trim(format!("{:.2}", v))
    }
}

fn tick_label(scale: &Scale, v: f64) -> String {
    match scale.kind {
        AxisKind::Categorical => {
            let idx = v.round();
            if (v - idx).abs() > 1e-6 || idx < 0.0 {
                return String::new();
            }
            scale.categories.get(idx as usize).cloned().unwrap_or_default()
        }
        AxisKind::Date => days_to_date(v).map(|d| d.format("%b %d").to_string()).unwrap_or_default(),
        AxisKind::Continuous => format_tick(v),
    }
}

fn draw_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    area: &DrawingArea<DB, Shift>,
    scene: &SceneGraph,
    theme: &ResolvedTheme,
) -> Result<()> {
    let gridlines = scene.gridlines;
    let x_ticks = axis_ticks(&scene.x_scale, gridlines.minor_x());
    let y_ticks = axis_ticks(&scene.y_scale, gridlines.minor_y());

    let y_label_w = y_ticks
        .major
        .iter()
        .map(|v| text_extent(&tick_label(&scene.y_scale, *v), theme.axis_text_size).0)
        .fold(0.0, f64::max);
    let x_area = theme.axis_text_size * 2.0 + if scene.labels.x.is_some() { theme.axis_title_size * 1.6 } else { 0.0 };
    let y_area = y_label_w + 12.0 + if scene.labels.y.is_some() { theme.axis_title_size * 1.6 } else { 0.0 };

    let (x0, x1) = scene.x_scale.domain;
    let (y0, y1) = scene.y_scale.domain;

    let mut chart = ChartBuilder::on(area)
        .margin(OUTER_MARGIN)
        .x_label_area_size(x_area as u32)
        .y_label_area_size(y_area as u32)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(Error::render)?;

    // Minor lines first so majors draw over them
    let grid = [
        (&x_ticks.minor, gridlines.minor_x(), theme.grid_minor),
        (&y_ticks.minor, gridlines.minor_y(), theme.grid_minor),
        (&x_ticks.major, gridlines.major_x(), theme.grid_major),
        (&y_ticks.major, gridlines.major_y(), theme.grid_major),
    ];
    for (axis, (ticks, enabled, color)) in grid.into_iter().enumerate() {
        if !enabled {
            continue;
        }
        let vertical = axis % 2 == 0;
        chart
            .draw_series(ticks.iter().map(|&v| {
                let ends = if vertical { vec![(v, y0), (v, y1)] } else { vec![(x0, v), (x1, v)] };
                PathElement::new(ends, color.stroke_width(1))
            }))
            .map_err(Error::render)?;
    }

    for command in &scene.commands {
        match command {
            DrawCommand::DrawLine { points, style } => {
                let stroke = style.color.mix(style.alpha).stroke_width(pixels(style.width));
                chart
                    .draw_series(LineSeries::new(points.iter().copied(), stroke))
                    .map_err(Error::render)?;
            }
            DrawCommand::DrawPoint { points, style } => {
                let fill = style.color.mix(style.alpha).filled();
                let r = style.size.round().max(1.0) as i32;
                let pts = points.iter().copied();
                match style.shape {
                    PointShape::Circle => chart.draw_series(pts.map(|p| Circle::new(p, r, fill))),
                    PointShape::Triangle => chart.draw_series(pts.map(|p| TriangleMarker::new(p, r + 1, fill))),
                    PointShape::Cross => chart.draw_series(pts.map(|p| Cross::new(p, r, fill.stroke_width(2)))),
                    PointShape::Square => chart.draw_series(
                        pts.map(|p| EmptyElement::at(p) + Rectangle::new([(-r, -r), (r, r)], fill)),
                    ),
                }
                .map_err(Error::render)?;
            }
            DrawCommand::DrawRect { tl, br, style } => {
                chart
                    .draw_series(std::iter::once(Rectangle::new([*tl, *br], style.fill.mix(style.alpha).filled())))
                    .map_err(Error::render)?;
                if let Some(outline) = style.outline {
                    chart
                        .draw_series(std::iter::once(Rectangle::new([*tl, *br], outline.stroke_width(1))))
                        .map_err(Error::render)?;
                }
            }
            DrawCommand::DrawPolygon { points, style } => {
                chart
                    .draw_series(std::iter::once(Polygon::new(points.clone(), style.fill.mix(style.alpha).filled())))
                    .map_err(Error::render)?;
                if let Some(outline) = style.outline {
                    let mut closed = points.clone();
                    if let Some(first) = points.first() {
                        closed.push(*first);
                    }
                    chart
                        .draw_series(std::iter::once(PathElement::new(closed, outline.stroke_width(1))))
                        .map_err(Error::render)?;
                }
            }
        }
    }

    let (px, py) = chart.plotting_area().get_pixel_range();
    let bounds = PixelRect::new(px.start as f64, py.start as f64, px.end as f64, py.end as f64);

    let x_ticks_px: Vec<(i32, String)> = x_ticks
        .major
        .iter()
        .map(|&v| (chart.backend_coord(&(v, y0)).0, tick_label(&scene.x_scale, v)))
        .collect();
    let y_ticks_px: Vec<(i32, String)> = y_ticks
        .major
        .iter()
        .map(|&v| (chart.backend_coord(&(x0, v)).1, tick_label(&scene.y_scale, v)))
        .collect();
    draw_axes(root, scene, theme, bounds, &x_ticks_px, &y_ticks_px, y_label_w)?;

    if scene.legend_position == LegendPosition::Inside && !scene.legend.is_empty() {
        draw_inside_legend(root, &scene.legend, theme, bounds)?;
    }

    // Inline labels may run into the right margin
    if !scene.inline_labels.is_empty() {
        let (root_w, _) = root.dim_in_pixel();
        let label_bounds = PixelRect::new(bounds.left, bounds.top, root_w as f64, bounds.bottom);
        let requests: Vec<LabelRequest> = scene
            .inline_labels
            .iter()
            .map(|l| {
                let (ax, ay) = chart.backend_coord(&l.anchor);
                LabelRequest {
                    text: l.text.clone(),
                    anchor: (ax as f64, ay as f64),
                    priority: l.priority,
                }
            })
            .collect();
        for placed in place_labels(&requests, label_bounds, theme.inline_label_size) {
            let label = &scene.inline_labels[placed.request];
            let font = (theme.font_family.as_str(), theme.inline_label_size, FontStyle::Bold)
                .into_font()
                .color(&label.color);
            root.draw(&Text::new(
                label.text.clone(),
                (placed.rect.left as i32, placed.rect.top as i32),
                font,
            ))
            .map_err(Error::render)?;
        }
    }

    Ok(())
}

/// Axis lines, tick marks, tick labels and axis titles around the plot,
/// drawn in backend pixels. Ticks are `(pixel, label)` pairs.
fn draw_axes<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    scene: &SceneGraph,
    theme: &ResolvedTheme,
    plot: PixelRect,
    x_ticks: &[(i32, String)],
    y_ticks: &[(i32, String)],
    y_label_w: f64,
) -> Result<()> {
    let (left, top, right, bottom) = (plot.left as i32, plot.top as i32, plot.right as i32, plot.bottom as i32);
    let axis = theme.axis_line.stroke_width(1);
    let family = theme.font_family.as_str();
    let text = (family, theme.axis_text_size).into_font().color(&theme.subtle_text_color);

    root.draw(&PathElement::new(vec![(left, top), (left, bottom), (right, bottom)], axis))
        .map_err(Error::render)?;

    let below = text.pos(Pos::new(HPos::Center, VPos::Top));
    for (x, label) in x_ticks {
        root.draw(&PathElement::new(vec![(*x, bottom), (*x, bottom + TICK_LEN)], axis))
            .map_err(Error::render)?;
        if !label.is_empty() {
            root.draw(&Text::new(label.clone(), (*x, bottom + TICK_LEN + 3), below.clone()))
                .map_err(Error::render)?;
        }
    }

    let beside = text.pos(Pos::new(HPos::Right, VPos::Center));
    for (y, label) in y_ticks {
        root.draw(&PathElement::new(vec![(left - TICK_LEN, *y), (left, *y)], axis))
            .map_err(Error::render)?;
        if !label.is_empty() {
            root.draw(&Text::new(label.clone(), (left - TICK_LEN - 3, *y), beside.clone()))
                .map_err(Error::render)?;
        }
    }

    let title = (family, theme.axis_title_size).into_font().color(&theme.text_color);
    if let Some(x_title) = &scene.labels.x {
        let y = bottom + TICK_LEN + (theme.axis_text_size * 1.6) as i32;
        let style = title.pos(Pos::new(HPos::Center, VPos::Top));
        root.draw(&Text::new(x_title.clone(), ((left + right) / 2, y), style))
            .map_err(Error::render)?;
    }
    if let Some(y_title) = &scene.labels.y {
        let x = left - TICK_LEN - 3 - y_label_w as i32 - (theme.axis_title_size * 0.9) as i32;
        let style = title
            .transform(FontTransform::Rotate270)
            .pos(Pos::new(HPos::Center, VPos::Center));
        root.draw(&Text::new(y_title.clone(), (x, (top + bottom) / 2), style))
            .map_err(Error::render)?;
    }
    Ok(())
}

fn draw_inside_legend<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    entries: &[LegendEntry],
    theme: &ResolvedTheme,
    plot: PixelRect,
) -> Result<()> {
    let row_h = (theme.legend_text_size * 1.6) as i32;
    let w = legend_column_width(entries, theme) as i32;
    let h = row_h * entries.len() as i32 + 8;
    let right = plot.right as i32 - 8;
    let top = plot.top as i32 + 8;
    root.draw(&Rectangle::new([(right - w, top), (right, top + h)], theme.background.filled()))
        .map_err(Error::render)?;
    root.draw(&Rectangle::new([(right - w, top), (right, top + h)], theme.grid_major.stroke_width(1)))
        .map_err(Error::render)?;
    draw_legend_column(root, entries, theme, (right - w + 8, top + 4))
}

fn pixels(width: f64) -> u32 {
    width.round().max(1.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nice_ticks() {
        assert_eq!(nice_ticks(0.0, 10.0, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(nice_ticks(-0.3, 7.2, 6), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(nice_ticks(3.0, 3.0, 5), vec![3.0]);
    }

    #[test]
    fn test_format_tick() {
        assert_eq!(format_tick(2500.0), "2500");
        assert_eq!(format_tick(25000.0), "25k");
        assert_eq!(format_tick(1_500_000.0), "1.5M");
        assert_eq!(format_tick(0.25), "0.25");
        assert_eq!(format_tick(5.5), "5.5");
    }

    #[test]
    fn test_category_tick_labels() {
        let scale = Scale {
            domain: (-0.5, 1.5),
            kind: AxisKind::Categorical,
            categories: vec!["setosa".to_string(), "virginica".to_string()],
        };
        assert_eq!(tick_label(&scale, 1.0), "virginica");
        assert_eq!(tick_label(&scale, 0.5), "");
        assert_eq!(tick_label(&scale, 7.0), "");
    }

    #[test]
    fn test_date_tick_labels() {
        let scale = Scale {
            domain: (18283.0, 18400.0),
            kind: AxisKind::Date,
            categories: Vec::new(),
        };
        // 18283 days after the epoch is 2020-01-22
        assert_eq!(tick_label(&scale, 18283.0), "Jan 22");
        let ticks = date_ticks(18283.0, 18400.0, 6);
        assert!(ticks.windows(2).all(|w| w[1] - w[0] == 28.0));
    }

    #[test]
    fn test_minor_ticks_between_majors() {
        let scale = Scale {
            domain: (0.0, 10.0),
            kind: AxisKind::Continuous,
            categories: Vec::new(),
        };
        let ticks = axis_ticks(&scale, true);
        assert_eq!(ticks.minor, vec![1.0, 3.0, 5.0, 7.0, 9.0]);
        assert!(axis_ticks(&scale, false).minor.is_empty());
    }

    #[test]
    fn test_point_shapes_cycle() {
        assert_eq!(PointShape::from_index(0), PointShape::Circle);
        assert_eq!(PointShape::from_index(5), PointShape::Triangle);
    }
}
