use crate::chart::{Geometry, Position, Style};
use crate::data::{ColumnType, Dataset, Value};
use crate::error::{Error, Result};
use crate::graph::{AreaStyle, BarStyle, LineStyle, PointShape, PointStyle};
use crate::ir::{AxisKind, GroupData, GroupStat, LayerData, RenderData, RenderStyle, ResolvedLayer, ResolvedSpec};
use crate::stat;
use crate::theme_resolve::{palette_color, parse_color, resolve_color, DEFAULT_MARK};
use plotters::style::RGBColor;
use std::collections::HashMap;
use tracing::debug;

/// Turn rows into per-series geometry: pick x positions, split by the series
/// column, run each layer's statistic, then stack or dodge.
pub fn apply_transformations(spec: &ResolvedSpec, data: &Dataset) -> Result<RenderData> {
    let x_kind = x_axis_kind(spec, data)?;
    let categories = match (x_kind, spec.layers.first()) {
        (AxisKind::Categorical, Some(layer)) => distinct_in_order(data, &layer.aesthetics.x_col)?,
        _ => Vec::new(),
    };
    let series_keys = match spec.layers.first().and_then(|l| l.aesthetics.series_col.as_deref()) {
        Some(col) => distinct_in_order(data, col)?,
        None => Vec::new(),
    };

    let mut layers = Vec::with_capacity(spec.layers.len());
    for layer in &spec.layers {
        let ctx = LayerContext {
            spec,
            layer,
            x_kind,
            categories: &categories,
            series_keys: &series_keys,
        };
        let groups = process_layer(&ctx, data)?;
        debug!(
            geometry = layer.layer.geometry.name(),
            groups = groups.len(),
            "transformed layer"
        );
        layers.push(LayerData { groups });
    }

    Ok(RenderData {
        x_kind,
        categories,
        layers,
    })
}

struct LayerContext<'a> {
    spec: &'a ResolvedSpec,
    layer: &'a ResolvedLayer,
    x_kind: AxisKind,
    categories: &'a [String],
    series_keys: &'a [String],
}

/// The x axis follows the first layer that positions marks by the x column;
/// univariate layers put their values on a continuous axis.
fn x_axis_kind(spec: &ResolvedSpec, data: &Dataset) -> Result<AxisKind> {
    let Some(layer) = spec.layers.iter().find(|l| !l.layer.geometry.is_univariate()) else {
        return Ok(AxisKind::Continuous);
    };
    Ok(match data.column_type(&layer.aesthetics.x_col)? {
        ColumnType::Categorical => AxisKind::Categorical,
        ColumnType::Date => AxisKind::Date,
        ColumnType::Numeric => AxisKind::Continuous,
    })
}

/// Display strings of a column's non-missing values, in order of first
/// appearance.
fn distinct_in_order(data: &Dataset, column: &str) -> Result<Vec<String>> {
    let mut seen = Vec::new();
    for value in data.column(column)? {
        if value.is_missing() {
            continue;
        }
        let s = value.to_string();
        if !seen.contains(&s) {
            seen.push(s);
        }
    }
    Ok(seen)
}

/// One row's channel values, after dropping rows with missing inputs.
struct Obs {
    x: f64,
    y: f64,
    ymin: f64,
    ymax: f64,
}

fn process_layer(ctx: &LayerContext<'_>, data: &Dataset) -> Result<Vec<GroupData>> {
    let aes = &ctx.layer.aesthetics;
    let geometry = ctx.layer.layer.geometry;

    let x_idx = data.column_index(&aes.x_col)?;
    let y_vals = aes.y_col.as_deref().map(|c| data.numeric_column(c)).transpose()?;
    let ymin_vals = aes.ymin_col.as_deref().map(|c| data.numeric_column(c)).transpose()?;
    let ymax_vals = aes.ymax_col.as_deref().map(|c| data.numeric_column(c)).transpose()?;
    let series_idx = aes.series_col.as_deref().map(|c| data.column_index(c)).transpose()?;

    // Partition rows by series key, keeping first-encounter order
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<Obs>> = HashMap::new();

    for (r, row) in data.rows().iter().enumerate() {
        let Some(x) = x_position(&row[x_idx], ctx.x_kind, ctx.categories, geometry) else {
            continue;
        };
        let y = match &y_vals {
            Some(v) => v[r],
            None => Some(f64::NAN),
        };
        let ymin = ymin_vals.as_ref().map_or(Some(f64::NAN), |v| v[r]);
        let ymax = ymax_vals.as_ref().map_or(Some(f64::NAN), |v| v[r]);

        let needs_y = !geometry.is_univariate() && geometry != Geometry::ErrorBar;
        let (Some(y), Some(ymin), Some(ymax)) = (y, ymin, ymax) else {
            continue;
        };
        if needs_y && y.is_nan() {
            continue;
        }

        let key = match series_idx {
            Some(idx) => row[idx].to_string(),
            None => String::new(),
        };
        if !buckets.contains_key(&key) {
            order.push(key.clone());
        }
        buckets.entry(key).or_default().push(Obs { x, y, ymin, ymax });
    }

    // Histogram bins share one range across all series of the layer
    let layer_range = {
        let xs = buckets.values().flatten().map(|o| o.x);
        let (lo, hi) = xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        (lo.is_finite() && hi.is_finite()).then_some((lo, hi))
    };

    let mut groups = Vec::with_capacity(order.len());
    for key in order {
        let obs = buckets.remove(&key).unwrap_or_default();
        let series_index = ctx.series_keys.iter().position(|k| *k == key).unwrap_or(0);
        let (style, in_legend) = build_style(ctx, &key, series_index);
        let mut group = GroupData::new(key, series_index, style);
        group.in_legend = in_legend;
        apply_statistic(&mut group, geometry, obs, ctx.categories.len(), layer_range)?;
        groups.push(group);
    }

    match ctx.layer.layer.position {
        Position::Stack => stack_groups(&mut groups, geometry.includes_zero()),
        Position::Dodge => dodge_groups(&mut groups),
        Position::Identity => {}
    }

    if geometry == Geometry::Bar && ctx.x_kind != AxisKind::Categorical {
        let slot = min_spacing(&groups);
        for group in &mut groups {
            if let RenderStyle::Bar(style) = &group.style {
                group.x_width = Some(slot * style.width);
            }
        }
    }

    Ok(groups)
}

fn x_position(value: &Value, kind: AxisKind, categories: &[String], geometry: Geometry) -> Option<f64> {
    if geometry.is_univariate() {
        return value.as_f64();
    }
    match kind {
        AxisKind::Categorical => {
            if value.is_missing() {
                return None;
            }
            let label = value.to_string();
            categories.iter().position(|c| *c == label).map(|i| i as f64)
        }
        AxisKind::Date | AxisKind::Continuous => value.position(),
    }
}

fn apply_statistic(
    group: &mut GroupData,
    geometry: Geometry,
    mut obs: Vec<Obs>,
    n_categories: usize,
    layer_range: Option<(f64, f64)>,
) -> Result<()> {
    let base = Baseline {
        value: geometry.baseline(),
        in_extent: geometry.includes_zero(),
    };
    match geometry {
        Geometry::Bar | Geometry::Point => {
            for o in obs {
                push_identity(group, o.x, o.y, base);
            }
        }
        Geometry::Line | Geometry::Area | Geometry::Step => {
            obs.sort_by(|a, b| a.x.total_cmp(&b.x));
            for o in obs {
                push_identity(group, o.x, o.y, base);
            }
        }
        Geometry::ErrorBar => {
            for o in obs {
                let mid = if o.y.is_nan() { (o.ymin + o.ymax) / 2.0 } else { o.y };
                group.x.push(o.x);
                group.y.push(mid);
                group.y_start.push(mid);
                group.y_min.push(o.ymin.min(o.ymax));
                group.y_max.push(o.ymin.max(o.ymax));
            }
        }
        Geometry::Boxplot => {
            let mut boxes = Vec::new();
            for (x, ys) in by_category(&obs, n_categories) {
                let Some(b) = stat::box_stats(&ys) else { continue };
                let lowest = b.outliers.first().copied().unwrap_or(b.lower_whisker).min(b.lower_whisker);
                let highest = b.outliers.last().copied().unwrap_or(b.upper_whisker).max(b.upper_whisker);
                group.x.push(x);
                group.y.push(b.median);
                group.y_start.push(b.median);
                group.y_min.push(lowest);
                group.y_max.push(highest);
                boxes.push(b);
            }
            group.stat = GroupStat::Boxes(boxes);
        }
        Geometry::Violin => {
            let mut curves = Vec::new();
            for (x, ys) in by_category(&obs, n_categories) {
                if ys.is_empty() {
                    continue;
                }
                let curve = stat::kde(&ys, stat::silverman_bandwidth(&ys));
                let lo = curve.x.first().copied().unwrap_or(0.0);
                let hi = curve.x.last().copied().unwrap_or(0.0);
                group.x.push(x);
                group.y.push(stat::median(&ys).unwrap_or(lo));
                group.y_start.push(lo);
                group.y_min.push(lo);
                group.y_max.push(hi);
                curves.push(curve);
            }
            group.stat = GroupStat::Violins(curves);
        }
        Geometry::Histogram { bins } => {
            let Some((lo, hi)) = layer_range else { return Ok(()) };
            let values: Vec<f64> = obs.iter().map(|o| o.x).collect();
            let computed = stat::histogram(&values, bins, lo, hi);
            if let Some(first) = computed.first() {
                group.x_width = Some(first.upper - first.lower);
            }
            for bin in computed {
                push_identity(group, bin.center(), bin.count as f64, base);
            }
        }
        Geometry::Density => {
            let values: Vec<f64> = obs.iter().map(|o| o.x).collect();
            if values.len() < 2 {
                return Err(Error::InvalidSpec(format!(
                    "density for series '{}' needs at least two values",
                    group.key
                )));
            }
            let curve = stat::kde(&values, stat::silverman_bandwidth(&values));
            for (x, d) in curve.x.into_iter().zip(curve.density) {
                push_identity(group, x, d, base);
            }
        }
        Geometry::Ecdf => {
            let values: Vec<f64> = obs.iter().map(|o| o.x).collect();
            for (x, frac) in stat::ecdf(&values) {
                push_identity(group, x, frac, base);
            }
        }
    }
    Ok(())
}

/// Bottom of a filled mark; lines and points have none.
#[derive(Debug, Clone, Copy)]
struct Baseline {
    value: Option<f64>,
    /// Zero is a data value of the stat and counts toward the y extent
    in_extent: bool,
}

fn push_identity(group: &mut GroupData, x: f64, y: f64, base: Baseline) {
    let start = base.value.unwrap_or(y);
    let reach = if base.in_extent { 0.0 } else { y };
    group.x.push(x);
    group.y.push(y);
    group.y_start.push(start);
    group.y_min.push(y.min(reach));
    group.y_max.push(y.max(reach));
}

/// Y values per category index, in category order; empty categories skipped.
fn by_category(obs: &[Obs], n_categories: usize) -> Vec<(f64, Vec<f64>)> {
    let mut slots: Vec<Vec<f64>> = vec![Vec::new(); n_categories];
    for o in obs {
        if let Some(slot) = slots.get_mut(o.x as usize) {
            slot.push(o.y);
        }
    }
    slots
        .into_iter()
        .enumerate()
        .filter(|(_, ys)| !ys.is_empty())
        .map(|(i, ys)| (i as f64, ys))
        .collect()
}

/// Smallest gap between distinct x positions of a layer, 1.0 if there is none.
fn min_spacing(groups: &[GroupData]) -> f64 {
    let mut xs: Vec<f64> = groups.iter().flat_map(|g| g.x.iter().copied()).collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup();
    xs.windows(2)
        .map(|w| w[1] - w[0])
        .filter(|gap| *gap > 0.0)
        .fold(None, |acc: Option<f64>, gap| Some(acc.map_or(gap, |a| a.min(gap))))
        .unwrap_or(1.0)
}

/// Pile groups on top of each other at equal x, in group order. Segment
/// bottoms count toward the y extent only when `bottoms_in_extent`.
fn stack_groups(groups: &mut [GroupData], bottoms_in_extent: bool) {
    let mut running: HashMap<u64, f64> = HashMap::new();
    for group in groups.iter_mut() {
        for i in 0..group.x.len() {
            let base = running.entry(group.x[i].to_bits()).or_insert(0.0);
            let value = group.y[i] - group.y_start[i];
            group.y_start[i] = *base;
            group.y[i] = *base + value;
            let reach = if bottoms_in_extent { group.y_start[i] } else { group.y[i] };
            group.y_min[i] = reach.min(group.y[i]);
            group.y_max[i] = reach.max(group.y[i]);
            *base = group.y[i];
        }
    }
}

/// Give each non-empty group its own slot within a category.
fn dodge_groups(groups: &mut [GroupData]) {
    let count = groups.iter().filter(|g| !g.x.is_empty()).count();
    let mut rank = 0;
    for group in groups.iter_mut().filter(|g| !g.x.is_empty()) {
        group.dodge = Some((rank, count));
        rank += 1;
    }
}

/// Resolve the group's colours. A fixed layer style wins over the series
/// mapping; only mapped colours appear in the legend.
fn build_style(ctx: &LayerContext<'_>, key: &str, series_index: usize) -> (RenderStyle, bool) {
    let style: &Style = &ctx.layer.layer.style;
    let mapped = ctx.layer.aesthetics.series_col.is_some();
    let series_color = |fixed: Option<&str>| -> (RGBColor, bool) {
        if let Some(c) = fixed.and_then(parse_color) {
            return (c, false);
        }
        if let Some(c) = ctx.spec.series_colors.get(key).and_then(|c| parse_color(c)) {
            return (c, mapped);
        }
        if mapped {
            (palette_color(series_index), true)
        } else {
            (DEFAULT_MARK, false)
        }
    };
    let alpha = style.alpha;
    let outline = style.color.as_deref().and_then(parse_color);

    match ctx.layer.layer.geometry {
        Geometry::Line | Geometry::Step | Geometry::Ecdf | Geometry::ErrorBar | Geometry::Point => {
            let (color, legend) = series_color(style.color.as_deref());
            let line = LineStyle {
                color,
                width: style.width.unwrap_or(2.0),
                alpha: alpha.unwrap_or(1.0),
            };
            let render = match ctx.layer.layer.geometry {
                Geometry::Line => RenderStyle::Line(line),
                Geometry::ErrorBar => RenderStyle::ErrorBar(line),
                Geometry::Point => RenderStyle::Point(PointStyle {
                    color,
                    size: style.size.unwrap_or(3.0),
                    shape: PointShape::from_index(if mapped { series_index } else { 0 }),
                    alpha: alpha.unwrap_or(0.8),
                }),
                _ => RenderStyle::Step(line),
            };
            (render, legend)
        }
        Geometry::Bar | Geometry::Histogram { .. } => {
            let (fill, legend) = series_color(style.fill.as_deref());
            (
                RenderStyle::Bar(BarStyle {
                    fill,
                    alpha: alpha.unwrap_or(1.0),
                    outline,
                    width: style.width.unwrap_or(if ctx.x_kind == AxisKind::Categorical { 0.8 } else { 0.9 }),
                }),
                legend,
            )
        }
        Geometry::Boxplot => {
            let (fill, legend) = series_color(style.fill.as_deref());
            (
                RenderStyle::Boxplot(BarStyle {
                    fill,
                    alpha: alpha.unwrap_or(1.0),
                    outline: Some(outline.unwrap_or(RGBColor(50, 50, 50))),
                    width: style.width.unwrap_or(0.6),
                }),
                legend,
            )
        }
        Geometry::Area | Geometry::Density | Geometry::Violin => {
            let (fill, legend) = series_color(style.fill.as_deref());
            let area = AreaStyle {
                fill,
                alpha: alpha.unwrap_or(if ctx.layer.layer.geometry == Geometry::Area { 0.8 } else { 0.5 }),
                outline: Some(resolve_color(style.color.as_deref(), fill)),
                width: style.width.unwrap_or(0.9),
            };
            let render = if ctx.layer.layer.geometry == Geometry::Violin {
                RenderStyle::Violin(area)
            } else {
                RenderStyle::Area(area)
            };
            (render, legend)
        }
    }
}
