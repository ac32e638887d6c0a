//! Declarative chart specification.
//!
//! A [`ChartSpec`] is an immutable value: build it with the chained methods
//! below, or deserialize it from JSON. Rendering never mutates it.

use crate::error::{Error, Result};
use crate::expr::Predicate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mark type of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Geometry {
    /// One bar per row, height taken from `y`
    Bar,
    Boxplot,
    Violin,
    Line,
    /// Filled region between 0 and `y`
    Area,
    Point,
    Step,
    Histogram {
        #[serde(default = "default_bins")]
        bins: usize,
    },
    Density,
    Ecdf,
    /// Vertical interval from `ymin` to `ymax`
    ErrorBar,
}

fn default_bins() -> usize {
    30
}

impl Geometry {
    /// Geometries that compute their own statistic from the raw `x` column.
    pub fn is_univariate(&self) -> bool {
        matches!(self, Geometry::Histogram { .. } | Geometry::Density | Geometry::Ecdf)
    }

    pub fn is_distribution(&self) -> bool {
        matches!(self, Geometry::Boxplot | Geometry::Violin)
    }

    /// Value filled marks are drawn from. Only a drawing base: it does not
    /// widen the axis, so an unpinned bar axis starts near the data minimum.
    pub fn baseline(&self) -> Option<f64> {
        matches!(
            self,
            Geometry::Bar | Geometry::Area | Geometry::Histogram { .. } | Geometry::Density
        )
        .then_some(0.0)
    }

    /// Whether the mark's stat has 0 as a data value (counts, densities and
    /// cumulative shares), so the axis extent covers it.
    pub fn includes_zero(&self) -> bool {
        matches!(self, Geometry::Histogram { .. } | Geometry::Density | Geometry::Ecdf)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Geometry::Bar => "bar",
            Geometry::Boxplot => "boxplot",
            Geometry::Violin => "violin",
            Geometry::Line => "line",
            Geometry::Area => "area",
            Geometry::Point => "point",
            Geometry::Step => "step",
            Geometry::Histogram { .. } => "histogram",
            Geometry::Density => "density",
            Geometry::Ecdf => "ecdf",
            Geometry::ErrorBar => "error_bar",
        }
    }
}

/// How overlapping marks of different series share an x position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    #[default]
    Identity,
    Dodge,
    Stack,
}

/// Fixed (unmapped) visual properties of a layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    /// Stroke colour: name or `#rrggbb`
    pub color: Option<String>,
    pub fill: Option<String>,
    pub alpha: Option<f64>,
    /// Line width in pixels, or bar/box width as a fraction of a category slot
    pub width: Option<f64>,
    /// Point radius in pixels
    pub size: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub geometry: Geometry,
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub position: Position,
}

impl Layer {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            style: Style::default(),
            position: Position::Identity,
        }
    }

    #[must_use]
    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.style.color = Some(color.into());
        self
    }

    #[must_use]
    pub fn fill(mut self, fill: impl Into<String>) -> Self {
        self.style.fill = Some(fill.into());
        self
    }

    #[must_use]
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.style.alpha = Some(alpha);
        self
    }

    #[must_use]
    pub fn width(mut self, width: f64) -> Self {
        self.style.width = Some(width);
        self
    }

    #[must_use]
    pub fn size(mut self, size: f64) -> Self {
        self.style.size = Some(size);
        self
    }

    #[must_use]
    pub fn position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

/// Mapping from visual channels to column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Aesthetics {
    pub x: Option<String>,
    pub y: Option<String>,
    pub ymin: Option<String>,
    pub ymax: Option<String>,
    pub fill: Option<String>,
    pub color: Option<String>,
    pub shape: Option<String>,
    pub group: Option<String>,
}

impl Aesthetics {
    /// Column that splits rows into series: the first of fill, color, shape,
    /// group.
    pub fn series(&self) -> Option<&str> {
        self.fill
            .as_deref()
            .or(self.color.as_deref())
            .or(self.shape.as_deref())
            .or(self.group.as_deref())
    }
}

/// Visible range of one axis. Unset bounds follow the data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisLimits {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl AxisLimits {
    pub fn new(lower: Option<f64>, upper: Option<f64>) -> Self {
        Self { lower, upper }
    }

    pub fn is_auto(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }
}

/// Text around the plot. Units belong in the axis label text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    pub caption: Option<String>,
}

/// A set of axes, as displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axes {
    #[default]
    None,
    X,
    Y,
    Both,
}

impl Axes {
    pub fn x(self) -> bool {
        matches!(self, Axes::X | Axes::Both)
    }

    pub fn y(self) -> bool {
        matches!(self, Axes::Y | Axes::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gridlines {
    pub major: Axes,
    pub minor: Axes,
}

impl Default for Gridlines {
    fn default() -> Self {
        Self {
            major: Axes::Both,
            minor: Axes::None,
        }
    }
}

impl Gridlines {
    pub fn new(major: Axes, minor: Axes) -> Self {
        Self { major, minor }
    }

    pub fn major_x(&self) -> bool {
        self.major.x() || self.minor.x()
    }

    pub fn major_y(&self) -> bool {
        self.major.y() || self.minor.y()
    }

    pub fn minor_x(&self) -> bool {
        self.minor.x()
    }

    pub fn minor_y(&self) -> bool {
        self.minor.y()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegendPosition {
    None,
    Top,
    Bottom,
    Left,
    #[default]
    Right,
    Inside,
}

/// Everything needed to draw one chart from one dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSpec {
    pub layers: Vec<Layer>,
    pub aes: Aesthetics,
    pub x_limits: AxisLimits,
    pub y_limits: AxisLimits,
    pub labels: Labels,
    pub gridlines: Gridlines,
    pub legend: LegendPosition,
    /// Series failing this predicate are muted; passing ones get an inline
    /// label instead of a legend entry.
    pub highlight: Option<Predicate>,
    /// Swap the axes at draw time: categories run down the vertical axis.
    pub flip: bool,
    /// Fixed colours for particular series keys, overriding the palette
    pub series_colors: BTreeMap<String, String>,
}

impl ChartSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidSpec(e.to_string()))
    }

    #[must_use]
    pub fn layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Shorthand for a layer with default style.
    #[must_use]
    pub fn geom(self, geometry: Geometry) -> Self {
        self.layer(Layer::new(geometry))
    }

    #[must_use]
    pub fn x(mut self, column: impl Into<String>) -> Self {
        self.aes.x = Some(column.into());
        self
    }

    #[must_use]
    pub fn y(mut self, column: impl Into<String>) -> Self {
        self.aes.y = Some(column.into());
        self
    }

    #[must_use]
    pub fn ymin(mut self, column: impl Into<String>) -> Self {
        self.aes.ymin = Some(column.into());
        self
    }

    #[must_use]
    pub fn ymax(mut self, column: impl Into<String>) -> Self {
        self.aes.ymax = Some(column.into());
        self
    }

    #[must_use]
    pub fn fill(mut self, column: impl Into<String>) -> Self {
        self.aes.fill = Some(column.into());
        self
    }

    #[must_use]
    pub fn color(mut self, column: impl Into<String>) -> Self {
        self.aes.color = Some(column.into());
        self
    }

    #[must_use]
    pub fn shape(mut self, column: impl Into<String>) -> Self {
        self.aes.shape = Some(column.into());
        self
    }

    #[must_use]
    pub fn group(mut self, column: impl Into<String>) -> Self {
        self.aes.group = Some(column.into());
        self
    }

    #[must_use]
    pub fn x_limits(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.x_limits = AxisLimits::new(lower, upper);
        self
    }

    #[must_use]
    pub fn y_limits(mut self, lower: Option<f64>, upper: Option<f64>) -> Self {
        self.y_limits = AxisLimits::new(lower, upper);
        self
    }

    #[must_use]
    pub fn title(mut self, text: impl Into<String>) -> Self {
        self.labels.title = Some(text.into());
        self
    }

    #[must_use]
    pub fn subtitle(mut self, text: impl Into<String>) -> Self {
        self.labels.subtitle = Some(text.into());
        self
    }

    #[must_use]
    pub fn x_label(mut self, text: impl Into<String>) -> Self {
        self.labels.x = Some(text.into());
        self
    }

    #[must_use]
    pub fn y_label(mut self, text: impl Into<String>) -> Self {
        self.labels.y = Some(text.into());
        self
    }

    #[must_use]
    pub fn caption(mut self, text: impl Into<String>) -> Self {
        self.labels.caption = Some(text.into());
        self
    }

    #[must_use]
    pub fn gridlines(mut self, major: Axes, minor: Axes) -> Self {
        self.gridlines = Gridlines::new(major, minor);
        self
    }

    #[must_use]
    pub fn legend(mut self, position: LegendPosition) -> Self {
        self.legend = position;
        self
    }

    #[must_use]
    pub fn highlight(mut self, predicate: Predicate) -> Self {
        self.highlight = Some(predicate);
        self
    }

    /// Pin the colour of one series, e.g. `"other"` to a grey.
    #[must_use]
    pub fn series_color(mut self, key: impl Into<String>, color: impl Into<String>) -> Self {
        self.series_colors.insert(key.into(), color.into());
        self
    }

    #[must_use]
    pub fn flip(mut self) -> Self {
        self.flip = true;
        self
    }

    /// Structural checks that need no data.
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(Error::InvalidSpec("chart needs at least one layer".to_string()));
        }
        if self.aes.x.is_none() {
            return Err(Error::InvalidSpec("no column mapped to x".to_string()));
        }
        for layer in &self.layers {
            let needs_y = !layer.geometry.is_univariate() && layer.geometry != Geometry::ErrorBar;
            if needs_y && self.aes.y.is_none() {
                return Err(Error::InvalidSpec(format!(
                    "{} layer needs a column mapped to y",
                    layer.geometry.name()
                )));
            }
            if layer.geometry == Geometry::ErrorBar && (self.aes.ymin.is_none() || self.aes.ymax.is_none()) {
                return Err(Error::InvalidSpec(
                    "error_bar layer needs columns mapped to ymin and ymax".to_string(),
                ));
            }
            if let Geometry::Histogram { bins: 0 } = layer.geometry {
                return Err(Error::InvalidSpec("histogram needs at least one bin".to_string()));
            }
            if let Some(alpha) = layer.style.alpha {
                if !(0.0..=1.0).contains(&alpha) {
                    return Err(Error::InvalidSpec(format!("alpha {} is outside [0, 1]", alpha)));
                }
            }
        }
        for (axis, limits) in [("x", &self.x_limits), ("y", &self.y_limits)] {
            if let (Some(lo), Some(hi)) = (limits.lower, limits.upper) {
                if lo >= hi {
                    return Err(Error::InvalidSpec(format!(
                        "{} axis lower limit {} is not below upper limit {}",
                        axis, lo, hi
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chains() {
        let spec = ChartSpec::new()
            .x("species")
            .y("mean_length")
            .layer(Layer::new(Geometry::Bar).fill("steelblue"))
            .y_limits(Some(0.0), None)
            .title("Sepal length")
            .flip();
        assert_eq!(spec.layers.len(), 1);
        assert_eq!(spec.y_limits.lower, Some(0.0));
        assert!(spec.flip);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_layers_and_x() {
        assert!(matches!(ChartSpec::new().x("a").validate(), Err(Error::InvalidSpec(_))));
        let no_x = ChartSpec::new().y("b").geom(Geometry::Line);
        assert!(matches!(no_x.validate(), Err(Error::InvalidSpec(_))));
    }

    #[test]
    fn test_histogram_needs_no_y() {
        let spec = ChartSpec::new().x("v").geom(Geometry::Histogram { bins: 10 });
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_limits() {
        let spec = ChartSpec::new().x("a").y("b").geom(Geometry::Line).y_limits(Some(5.0), Some(1.0));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_minor_implies_major() {
        let grid = Gridlines::new(Axes::None, Axes::X);
        assert!(grid.major_x());
        assert!(!grid.major_y());
    }

    #[test]
    fn test_series_channel_precedence() {
        let aes = Aesthetics {
            color: Some("country".to_string()),
            group: Some("type".to_string()),
            ..Default::default()
        };
        assert_eq!(aes.series(), Some("country"));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "layers": [{"geometry": {"histogram": {"bins": 12}}}, {"geometry": "density"}],
            "aes": {"x": "petal_length", "fill": "species"},
            "legend": "bottom",
            "highlight": "mean > 3",
            "gridlines": {"minor": "both"}
        }"#;
        let spec = ChartSpec::from_json(json).unwrap();
        assert_eq!(spec.layers[0].geometry, Geometry::Histogram { bins: 12 });
        assert_eq!(spec.legend, LegendPosition::Bottom);
        assert_eq!(spec.gridlines.major, Axes::Both);
        assert!(spec.gridlines.minor_y());
        assert_eq!(spec.highlight.as_ref().map(|p| p.source()), Some("mean > 3"));
    }

    #[test]
    fn test_from_json_bad_predicate_is_invalid_spec() {
        let json = r#"{"layers": [{"geometry": "line"}], "highlight": "mean >"}"#;
        assert!(matches!(ChartSpec::from_json(json), Err(Error::InvalidSpec(_))));
    }
}
