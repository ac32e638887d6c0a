// Library exports for plotbook

pub mod data;
pub mod datasets;
pub mod error;
pub mod expr;
pub mod parser;
pub mod prep;
pub mod stat;

// Chart pipeline
pub mod chart;
pub mod ir;
pub mod resolve;
pub mod transform;
pub mod scale;
pub mod compiler;
pub mod theme_resolve;
pub mod labels;
pub mod graph;
pub mod runtime;
pub mod artifact;

pub mod recipes;

pub use artifact::{save, Artifact, ArtifactOptions, OutputFormat, TrimOutcome};
pub use chart::{Axes, ChartSpec, Geometry, Layer, LegendPosition, Position};
pub use data::{Dataset, Value};
pub use error::{Error, Result};
pub use expr::Predicate;
pub use runtime::{render_chart, Chart};
