use crate::chart::{Labels, LegendPosition};
use crate::data::{Dataset, Value};
use crate::error::Result;
use crate::graph::{BarStyle, LineStyle, PointShape, PointStyle};
use crate::ir::{
    AxisKind, DrawCommand, GroupData, GroupStat, InlineLabel, LegendEntry, RenderData, RenderStyle, ResolvedSpec,
    Scale, Scales, SceneGraph,
};
use crate::stat::{BoxStats, DensityCurve};
use crate::theme_resolve::{palette_color, parse_color, MUTED_GREY};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Columns of the per-series summary a highlight predicate is evaluated on,
/// after the series key column.
pub const SUMMARY_COLUMNS: [&str; 7] = ["min", "max", "mean", "sum", "first", "last", "n"];

// =============================================================================
// Boxplot Geometry Helpers
// =============================================================================

/// Computed geometry for a single boxplot in data orientation
struct BoxplotGeometry {
    lower_whisker: Vec<(f64, f64)>,
    upper_whisker: Vec<(f64, f64)>,
    min_cap: Vec<(f64, f64)>,
    max_cap: Vec<(f64, f64)>,
    box_corners: ((f64, f64), (f64, f64)),
    median_line: Vec<(f64, f64)>,
    outlier_points: Vec<(f64, f64)>,
}

fn compute_boxplot_geometry(x: f64, width: f64, stats: &BoxStats) -> BoxplotGeometry {
    let half_width = width / 2.0;
    let cap_half = width * 0.2;

    BoxplotGeometry {
        lower_whisker: vec![(x, stats.lower_whisker), (x, stats.q1)],
        upper_whisker: vec![(x, stats.q3), (x, stats.upper_whisker)],
        min_cap: vec![(x - cap_half, stats.lower_whisker), (x + cap_half, stats.lower_whisker)],
        max_cap: vec![(x - cap_half, stats.upper_whisker), (x + cap_half, stats.upper_whisker)],
        box_corners: ((x - half_width, stats.q3), (x + half_width, stats.q1)),
        median_line: vec![(x - half_width, stats.median), (x + half_width, stats.median)],
        outlier_points: stats.outliers.iter().map(|&v| (x, v)).collect(),
    }
}

/// Whisker, median and outlier styles derived from the box style.
fn boxplot_component_styles(style: &BarStyle) -> (LineStyle, LineStyle, PointStyle) {
    let ink = style.outline.unwrap_or(style.fill);
    let whisker = LineStyle {
        color: ink,
        width: 1.5,
        alpha: 1.0,
    };
    let median = LineStyle {
        color: ink,
        width: 2.5,
        alpha: 1.0,
    };
    let outlier = PointStyle {
        color: ink,
        size: 2.5,
        shape: PointShape::Circle,
        alpha: 1.0,
    };
    (whisker, median, outlier)
}

/// Mirrored density outline around `x`, widest point spanning `width`.
fn violin_outline(x: f64, width: f64, curve: &DensityCurve) -> Vec<(f64, f64)> {
    let peak = curve.max_density();
    if peak <= 0.0 {
        return Vec::new();
    }
    let scale = width / 2.0 / peak;
    let right = curve.x.iter().zip(&curve.density).map(|(&y, &d)| (x + d * scale, y));
    let left = curve.x.iter().zip(&curve.density).rev().map(|(&y, &d)| (x - d * scale, y));
    right.chain(left).collect()
}

/// Display-coordinate mapping: swaps axes under a flip and reverses category
/// positions so the first category ends up at the top.
struct Projector {
    flip: bool,
    categories: Option<usize>,
}

impl Projector {
    fn point(&self, (x, y): (f64, f64)) -> (f64, f64) {
        if !self.flip {
            return (x, y);
        }
        let x = match self.categories {
            Some(n) => (n as f64 - 1.0) - x,
            None => x,
        };
        (y, x)
    }

    fn points(&self, pts: impl IntoIterator<Item = (f64, f64)>) -> Vec<(f64, f64)> {
        pts.into_iter().map(|p| self.point(p)).collect()
    }
}

/// Slot width and centre offset of a dodged mark.
fn dodge_slot(width: f64, dodge: Option<(usize, usize)>) -> (f64, f64) {
    match dodge {
        Some((rank, count)) if count > 1 => {
            let slot = width / count as f64;
            let offset = (rank as f64 - (count as f64 - 1.0) / 2.0) * slot;
            (slot, offset)
        }
        _ => (width, 0.0),
    }
}

/// Expand x/y pairs into a staircase: hold each value until the next x.
fn stairs(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(points.len() * 2);
    for (i, &(x, y)) in points.iter().enumerate() {
        if i > 0 {
            out.push((x, points[i - 1].1));
        }
        out.push((x, y));
    }
    out
}

/// Compile data and scales into a SceneGraph of drawing commands
pub fn compile_geometry(mut data: RenderData, scales: Scales, spec: &ResolvedSpec) -> Result<SceneGraph> {
    let mut inline_labels = Vec::new();
    let highlighted = match &spec.highlight {
        Some(predicate) => {
            let outcome = evaluate_highlight(&data, spec, predicate)?;
            inline_labels = apply_highlight(&mut data, &outcome, &spec.series_colors);
            true
        }
        None => false,
    };

    let projector = Projector {
        flip: spec.flip,
        categories: (data.x_kind == AxisKind::Categorical).then_some(data.categories.len()),
    };

    let mut commands = Vec::new();
    let mut legend: Vec<LegendEntry> = Vec::new();

    for layer in &data.layers {
        for group in &layer.groups {
            compile_group(group, &scales, &projector, &mut commands);

            if group.in_legend && !highlighted && !legend.iter().any(|e| e.label == group.key) {
                legend.push(LegendEntry {
                    label: group.key.clone(),
                    color: group.style.color(),
                    kind: group.style.legend_kind(),
                });
            }
        }
    }

    if spec.legend == LegendPosition::None {
        legend.clear();
    }

    for label in &mut inline_labels {
        label.anchor = projector.point(label.anchor);
    }

    let (x_scale, y_scale, labels) = if spec.flip {
        let mut y_scale = scales.x;
        y_scale.categories.reverse();
        let labels = Labels {
            x: spec.labels.y.clone(),
            y: spec.labels.x.clone(),
            ..spec.labels.clone()
        };
        (scales.y, y_scale, labels)
    } else {
        (scales.x, scales.y, spec.labels.clone())
    };

    debug!(commands = commands.len(), legend = legend.len(), "compiled scene");

    Ok(SceneGraph {
        x_scale,
        y_scale,
        labels,
        gridlines: spec.gridlines,
        legend_position: spec.legend,
        legend,
        commands,
        inline_labels,
    })
}

fn compile_group(group: &GroupData, scales: &Scales, projector: &Projector, commands: &mut Vec<DrawCommand>) {
    let pairs = || group.x.iter().copied().zip(group.y.iter().copied());

    match &group.style {
        RenderStyle::Line(style) => {
            let points = pairs().map(|(x, y)| (x, scales.y.clamp(y)));
            commands.push(DrawCommand::DrawLine {
                points: projector.points(points),
                style: style.clone(),
            });
        }
        RenderStyle::Step(style) => {
            let points: Vec<_> = pairs().map(|(x, y)| (x, scales.y.clamp(y))).collect();
            commands.push(DrawCommand::DrawLine {
                points: projector.points(stairs(&points)),
                style: style.clone(),
            });
        }
        RenderStyle::Point(style) => {
            let width = group.x_width.unwrap_or(0.8);
            let (_, offset) = dodge_slot(width, group.dodge);
            let points = pairs()
                .map(|(x, y)| (x + offset, y))
                .filter(|&(x, y)| scales.x.contains(x) && scales.y.contains(y));
            commands.push(DrawCommand::DrawPoint {
                points: projector.points(points),
                style: style.clone(),
            });
        }
        RenderStyle::Bar(style) => {
            let (slot, offset) = dodge_slot(group.x_width.unwrap_or(style.width), group.dodge);
            let half = slot / 2.0;
            for i in 0..group.x.len() {
                let top = scales.y.clamp(group.y[i]);
                let bottom = scales.y.clamp(group.y_start[i]);
                // Entirely outside the visible range
                if top == bottom {
                    continue;
                }
                let x = group.x[i] + offset;
                commands.push(DrawCommand::DrawRect {
                    tl: projector.point((x - half, top)),
                    br: projector.point((x + half, bottom)),
                    style: style.clone(),
                });
            }
        }
        RenderStyle::Area(style) => {
            let upper = pairs().map(|(x, y)| (x, scales.y.clamp(y)));
            let lower = group
                .x
                .iter()
                .zip(&group.y_start)
                .rev()
                .map(|(&x, &y)| (x, scales.y.clamp(y)));
            commands.push(DrawCommand::DrawPolygon {
                points: projector.points(upper.chain(lower)),
                style: style.clone(),
            });
        }
        RenderStyle::Boxplot(style) => {
            let GroupStat::Boxes(boxes) = &group.stat else { return };
            let (slot, offset) = dodge_slot(style.width, group.dodge);
            let (whisker, median, outlier) = boxplot_component_styles(style);

            for (&x, stats) in group.x.iter().zip(boxes) {
                let geom = compute_boxplot_geometry(x + offset, slot, stats);
                for line in [geom.lower_whisker, geom.upper_whisker, geom.min_cap, geom.max_cap] {
                    commands.push(DrawCommand::DrawLine {
                        points: projector.points(line),
                        style: whisker.clone(),
                    });
                }
                commands.push(DrawCommand::DrawRect {
                    tl: projector.point(geom.box_corners.0),
                    br: projector.point(geom.box_corners.1),
                    style: style.clone(),
                });
                commands.push(DrawCommand::DrawLine {
                    points: projector.points(geom.median_line),
                    style: median.clone(),
                });
                if !geom.outlier_points.is_empty() {
                    commands.push(DrawCommand::DrawPoint {
                        points: projector.points(geom.outlier_points),
                        style: outlier.clone(),
                    });
                }
            }
        }
        RenderStyle::Violin(style) => {
            let GroupStat::Violins(curves) = &group.stat else { return };
            let (slot, offset) = dodge_slot(style.width, group.dodge);
            for (&x, curve) in group.x.iter().zip(curves) {
                let outline = violin_outline(x + offset, slot, curve);
                if outline.is_empty() {
                    continue;
                }
                commands.push(DrawCommand::DrawPolygon {
                    points: projector.points(outline),
                    style: style.clone(),
                });
            }
        }
        RenderStyle::ErrorBar(style) => {
            let (slot, offset) = dodge_slot(group.x_width.unwrap_or(0.8), group.dodge);
            let cap_half = slot * 0.15;
            for i in 0..group.x.len() {
                let x = group.x[i] + offset;
                let (lo, hi) = (scales.y.clamp(group.y_min[i]), scales.y.clamp(group.y_max[i]));
                for line in [
                    vec![(x, lo), (x, hi)],
                    vec![(x - cap_half, lo), (x + cap_half, lo)],
                    vec![(x - cap_half, hi), (x + cap_half, hi)],
                ] {
                    commands.push(DrawCommand::DrawLine {
                        points: projector.points(line),
                        style: style.clone(),
                    });
                }
            }
        }
    }
}

// =============================================================================
// Highlighting
// =============================================================================

/// Per-series summary of the first layer a series appears in: one row per
/// series key with [`SUMMARY_COLUMNS`].
pub fn series_summary(data: &RenderData, key_column: &str) -> Result<Dataset> {
    let mut columns = vec![key_column.to_string()];
    columns.extend(SUMMARY_COLUMNS.iter().map(|c| c.to_string()));

    let mut seen: Vec<&str> = Vec::new();
    let mut rows = Vec::new();
    for group in data.layers.iter().flat_map(|l| l.groups.iter()) {
        if seen.contains(&group.key.as_str()) {
            continue;
        }
        seen.push(&group.key);

        let ys: Vec<f64> = group.y.iter().copied().filter(|v| v.is_finite()).collect();
        let num = |v: Option<f64>| v.map_or(Value::Missing, Value::Num);
        let sum: f64 = ys.iter().sum();
        let min = ys.iter().copied().reduce(f64::min);
        let max = ys.iter().copied().reduce(f64::max);
        rows.push(vec![
            Value::Str(group.key.clone()),
            num(min),
            num(max),
            num((!ys.is_empty()).then(|| sum / ys.len() as f64)),
            Value::Num(sum),
            num(ys.first().copied()),
            num(ys.last().copied()),
            Value::Num(ys.len() as f64),
        ]);
    }
    Dataset::new(columns, rows)
}

/// Series key -> whether it passes the highlight predicate.
fn evaluate_highlight(
    data: &RenderData,
    spec: &ResolvedSpec,
    predicate: &crate::expr::Predicate,
) -> Result<HashMap<String, bool>> {
    let key_column = spec
        .layers
        .first()
        .and_then(|l| l.aesthetics.series_col.clone())
        .unwrap_or_else(|| "series".to_string());
    let summary = series_summary(data, &key_column)?;
    predicate.validate(&summary)?;

    let mut outcome = HashMap::new();
    for row in summary.iter() {
        let key = row.values()[0].to_string();
        outcome.insert(key, predicate.matches(&row)?);
    }
    debug!(
        predicate = predicate.source(),
        passing = outcome.values().filter(|p| **p).count(),
        "evaluated highlight"
    );
    Ok(outcome)
}

/// Recolour series by highlight outcome, draw muted series first, and
/// return one inline label per named passing series in data coordinates.
/// Passing series keep a pinned series colour; the rest take palette colours
/// in order of appearance.
fn apply_highlight(
    data: &mut RenderData,
    outcome: &HashMap<String, bool>,
    series_colors: &BTreeMap<String, String>,
) -> Vec<InlineLabel> {
    let passes = |key: &str| outcome.get(key).copied().unwrap_or(false);

    let mut rank: HashMap<String, usize> = HashMap::new();
    let mut labels = Vec::new();

    for layer in &mut data.layers {
        for group in &mut layer.groups {
            group.in_legend = false;
            if !passes(&group.key) {
                group.style.recolor(MUTED_GREY);
                continue;
            }
            let color = match series_colors.get(&group.key).and_then(|c| parse_color(c)) {
                Some(pinned) => pinned,
                None => {
                    let next = rank.len();
                    palette_color(*rank.entry(group.key.clone()).or_insert(next))
                }
            };
            group.style.recolor(color);

            // An unmapped layer is one unnamed series
            if group.key.is_empty() || labels.iter().any(|l: &InlineLabel| l.text == group.key) {
                continue;
            }
            if let (Some(&x), Some(&y)) = (group.x.last(), group.y.last()) {
                labels.push(InlineLabel {
                    text: group.key.clone(),
                    anchor: (x, y),
                    color,
                    priority: y,
                });
            }
        }
        layer.groups.sort_by_key(|g| passes(&g.key));
    }
    labels
}

/// Fraction of a scale's visible span covered by `[from, to]`.
pub fn visible_fraction(scale: &Scale, from: f64, to: f64) -> f64 {
    let span = scale.domain.1 - scale.domain.0;
    if span <= 0.0 {
        return 0.0;
    }
    (scale.clamp(to) - scale.clamp(from)).abs() / span
}
