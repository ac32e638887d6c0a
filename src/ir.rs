use crate::chart::{AxisLimits, Gridlines, Labels, Layer, LegendPosition};
use crate::expr::Predicate;
use crate::graph::{AreaStyle, BarStyle, LineStyle, PointStyle};
use crate::stat::{BoxStats, DensityCurve};
use plotters::style::RGBColor;
use std::collections::BTreeMap;

// =============================================================================
// Phase 1: Resolution
// =============================================================================

/// A chart spec whose column references have been checked against the data.
#[derive(Debug, Clone)]
pub struct ResolvedSpec {
    pub layers: Vec<ResolvedLayer>,
    pub labels: Labels,
    pub gridlines: Gridlines,
    pub legend: LegendPosition,
    pub x_limits: AxisLimits,
    pub y_limits: AxisLimits,
    pub highlight: Option<Predicate>,
    pub flip: bool,
    pub series_colors: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedLayer {
    pub layer: Layer,
    pub aesthetics: ResolvedAesthetics,
}

/// Column names as spelled in the dataset.
#[derive(Debug, Clone)]
pub struct ResolvedAesthetics {
    pub x_col: String,
    pub y_col: Option<String>,
    pub ymin_col: Option<String>,
    pub ymax_col: Option<String>,
    /// Column splitting rows into series
    pub series_col: Option<String>,
}

// =============================================================================
// Phase 2: Transformation
// =============================================================================

/// How positions along the x axis are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    Continuous,
    /// Days since 1970-01-01
    Date,
    /// Category indices 0..n
    Categorical,
}

#[derive(Debug, Clone)]
pub struct RenderData {
    pub x_kind: AxisKind,
    /// Category labels in order of first appearance, when categorical
    pub categories: Vec<String>,
    /// Corresponds 1:1 with `ResolvedSpec.layers`
    pub layers: Vec<LayerData>,
}

#[derive(Debug, Clone)]
pub struct LayerData {
    pub groups: Vec<GroupData>,
}

/// The statistic a group carries beyond plain x/y.
#[derive(Debug, Clone)]
pub enum GroupStat {
    None,
    /// One summary per x position
    Boxes(Vec<BoxStats>),
    /// One density curve per x position (curve.x holds y values)
    Violins(Vec<DensityCurve>),
}

/// A set of marks sharing one visual style: a series.
#[derive(Debug, Clone)]
pub struct GroupData {
    /// Series key (legend label); empty when the layer is not split
    pub key: String,
    /// Index among the series of the whole chart, for palette lookup
    pub series_index: usize,

    pub x: Vec<f64>,
    /// Main value (top of a bar, line value)
    pub y: Vec<f64>,
    /// Bottom of a bar or area (non-zero when stacked)
    pub y_start: Vec<f64>,
    pub y_min: Vec<f64>,
    pub y_max: Vec<f64>,

    pub stat: GroupStat,
    /// (rank, count) of this group among dodged groups
    pub dodge: Option<(usize, usize)>,
    /// Bar width in x units; `None` means a fraction of a category slot
    pub x_width: Option<f64>,

    pub style: RenderStyle,
    /// Colour came from a data mapping, so the group earns a legend entry
    pub in_legend: bool,
}

impl GroupData {
    pub fn new(key: String, series_index: usize, style: RenderStyle) -> Self {
        GroupData {
            key,
            series_index,
            x: Vec::new(),
            y: Vec::new(),
            y_start: Vec::new(),
            y_min: Vec::new(),
            y_max: Vec::new(),
            stat: GroupStat::None,
            dodge: None,
            x_width: None,
            style,
            in_legend: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RenderStyle {
    Line(LineStyle),
    Step(LineStyle),
    Point(PointStyle),
    Bar(BarStyle),
    Area(AreaStyle),
    Boxplot(BarStyle),
    Violin(AreaStyle),
    ErrorBar(LineStyle),
}

impl RenderStyle {
    /// Swatch colour for legends and labels.
    pub fn color(&self) -> RGBColor {
        match self {
            RenderStyle::Line(s) | RenderStyle::Step(s) | RenderStyle::ErrorBar(s) => s.color,
            RenderStyle::Point(s) => s.color,
            RenderStyle::Bar(s) | RenderStyle::Boxplot(s) => s.fill,
            RenderStyle::Area(s) | RenderStyle::Violin(s) => s.fill,
        }
    }

    pub fn recolor(&mut self, color: RGBColor) {
        match self {
            RenderStyle::Line(s) | RenderStyle::Step(s) | RenderStyle::ErrorBar(s) => s.color = color,
            RenderStyle::Point(s) => s.color = color,
            RenderStyle::Bar(s) | RenderStyle::Boxplot(s) => s.fill = color,
            RenderStyle::Area(s) | RenderStyle::Violin(s) => s.fill = color,
        }
    }

    pub fn legend_kind(&self) -> LegendKind {
        match self {
            RenderStyle::Line(_) | RenderStyle::Step(_) | RenderStyle::ErrorBar(_) => LegendKind::Line,
            RenderStyle::Point(_) => LegendKind::Point,
            _ => LegendKind::Swatch,
        }
    }
}

// =============================================================================
// Phase 3: Scaling
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Scale {
    /// Visible data range
    pub domain: (f64, f64),
    pub kind: AxisKind,
    /// If categorical, maps index -> label
    pub categories: Vec<String>,
}

impl Scale {
    pub fn contains(&self, v: f64) -> bool {
        v >= self.domain.0 && v <= self.domain.1
    }

    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.domain.0, self.domain.1)
    }
}

#[derive(Debug, Clone)]
pub struct Scales {
    pub x: Scale,
    pub y: Scale,
}

// =============================================================================
// Phase 4: Compilation (Scene Graph)
// =============================================================================

/// Primitive drawing commands in display coordinates (after any flip).
/// The backend executes these blindly.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    pub x_scale: Scale,
    pub y_scale: Scale,
    pub labels: Labels,
    pub gridlines: Gridlines,
    pub legend_position: LegendPosition,
    pub legend: Vec<LegendEntry>,
    pub commands: Vec<DrawCommand>,
    pub inline_labels: Vec<InlineLabel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendKind {
    Line,
    Point,
    Swatch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub label: String,
    pub color: RGBColor,
    pub kind: LegendKind,
}

/// Text attached to the end of a highlighted series.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineLabel {
    pub text: String,
    pub anchor: (f64, f64),
    pub color: RGBColor,
    /// Higher is placed first
    pub priority: f64,
}

#[derive(Debug, Clone)]
pub enum DrawCommand {
    DrawLine {
        points: Vec<(f64, f64)>,
        style: LineStyle,
    },
    DrawPoint {
        points: Vec<(f64, f64)>,
        style: PointStyle,
    },
    DrawRect {
        // Top-Left, Bottom-Right
        tl: (f64, f64),
        br: (f64, f64),
        style: BarStyle,
    },
    DrawPolygon {
        points: Vec<(f64, f64)>,
        style: AreaStyle,
    },
}
