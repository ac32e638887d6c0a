use crate::chart::ChartSpec;
use crate::compiler::compile_geometry;
use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::graph::draw_scene;
use crate::ir::SceneGraph;
use crate::resolve::resolve_chart;
use crate::scale::build_scales;
use crate::theme_resolve::ResolvedTheme;
use crate::transform::apply_transformations;
use image::{ImageEncoder, RgbImage};
use plotters::prelude::*;
use tracing::debug;

/// A rendered chart held in memory. Drawing it to pixels or SVG is
/// deferred until the output size is known.
#[derive(Debug, Clone)]
pub struct Chart {
    scene: SceneGraph,
}

/// Render a chart spec against a dataset.
///
/// Pipeline: Resolve -> Transform -> Scale -> Compile. Pure: neither input is
/// modified and nothing is written.
pub fn render_chart(spec: &ChartSpec, data: &Dataset) -> Result<Chart> {
    // 1. Resolve: check channels against the schema
    let resolved = resolve_chart(spec, data)?;

    // 2. Transform: group into series and compute stats
    let render_data = apply_transformations(&resolved, data)?;

    // 3. Scale: axis domains
    let scales = build_scales(&render_data, &resolved);

    // 4. Compile: primitive draw commands
    let scene = compile_geometry(render_data, scales, &resolved)?;
    debug!(rows = data.len(), commands = scene.commands.len(), "rendered chart");

    Ok(Chart { scene })
}

impl Chart {
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Draw into an RGB bitmap of `width` x `height` pixels.
    pub fn rasterize(&self, width: u32, height: u32) -> Result<RgbImage> {
        let len = check_size(width, height)?;
        let mut buffer = vec![0u8; len];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            draw_scene(&root, &self.scene, &ResolvedTheme::scaled(height))?;
            root.present().map_err(Error::render)?;
        }
        RgbImage::from_raw(width, height, buffer)
            .ok_or_else(|| Error::Render("bitmap buffer does not match the image size".to_string()))
    }

    /// Finalize and encode the chart as PNG
    pub fn to_png(&self, width: u32, height: u32) -> Result<Vec<u8>> {
        encode_png(&self.rasterize(width, height)?)
    }

    /// Draw as an SVG document.
    pub fn to_svg(&self, width: u32, height: u32) -> Result<String> {
        check_size(width, height)?;
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
            draw_scene(&root, &self.scene, &ResolvedTheme::scaled(height))?;
            root.present().map_err(Error::render)?;
        }
        Ok(svg)
    }
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png_bytes)
        .write_image(image.as_raw(), image.width(), image.height(), image::ColorType::Rgb8)
        .map_err(Error::render)?;
    Ok(png_bytes)
}

/// Largest canvas drawn, in pixels (100 megapixels).
pub const MAX_PIXELS: usize = 100_000_000;

/// Byte length of an RGB buffer for a `width` x `height` canvas.
fn check_size(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidArgument(format!(
            "image size must be positive, got {}x{}",
            width, height
        )));
    }
    let pixels = (width as usize)
        .checked_mul(height as usize)
        .filter(|p| *p <= MAX_PIXELS)
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "image size {}x{} exceeds {} pixels",
                width, height, MAX_PIXELS
            ))
        })?;
    Ok(pixels * 3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{Axes, Geometry, Layer};
    use crate::ir::DrawCommand;

    fn data() -> Dataset {
        Dataset::from_csv_reader("x,y,g\n1,2,a\n2,4,a\n3,3,b\n4,5,b\n".as_bytes()).unwrap()
    }

    #[test]
    fn test_render_chart_builds_scene() {
        let spec = ChartSpec::new().x("x").y("y").color("g").geom(Geometry::Line);
        let chart = render_chart(&spec, &data()).unwrap();
        let lines = chart
            .scene()
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::DrawLine { .. }))
            .count();
        assert_eq!(lines, 2);
        assert_eq!(chart.scene().legend.len(), 2);
    }

    #[test]
    fn test_render_does_not_touch_inputs() {
        let spec = ChartSpec::new().x("x").y("y").layer(Layer::new(Geometry::Point));
        let before = (spec.clone(), data());
        render_chart(&spec, &before.1).unwrap();
        assert_eq!(spec, before.0);
    }

    #[test]
    fn test_render_unknown_column() {
        let spec = ChartSpec::new().x("x").y("weight").geom(Geometry::Point);
        assert!(matches!(render_chart(&spec, &data()), Err(Error::SchemaMismatch { .. })));
    }

    #[test]
    fn test_png_output() {
        let spec = ChartSpec::new().x("x").y("y").geom(Geometry::Point).title("Points");
        let png = render_chart(&spec, &data()).unwrap().to_png(320, 240).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn test_svg_output() {
        let spec = ChartSpec::new().x("x").y("y").geom(Geometry::Bar);
        let svg = render_chart(&spec, &data()).unwrap().to_svg(320, 240).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("<rect"));
    }

    #[test]
    fn test_zero_size_rejected() {
        let spec = ChartSpec::new().x("x").y("y").geom(Geometry::Point);
        let chart = render_chart(&spec, &data()).unwrap();
        assert!(matches!(chart.rasterize(0, 100), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_oversized_canvas_rejected() {
        let spec = ChartSpec::new().x("x").y("y").geom(Geometry::Point);
        let chart = render_chart(&spec, &data()).unwrap();
        assert!(matches!(chart.rasterize(45_000, 45_000), Err(Error::InvalidArgument(_))));
        assert!(matches!(chart.rasterize(u32::MAX, u32::MAX), Err(Error::InvalidArgument(_))));
        assert!(matches!(chart.to_svg(200_000, 1_000), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_minor_gridlines_are_drawn() {
        let base = ChartSpec::new().x("x").y("y").geom(Geometry::Point);
        let polylines = |spec: ChartSpec| {
            let svg = render_chart(&spec, &data()).unwrap().to_svg(400, 300).unwrap();
            svg.matches("<polyline").count()
        };
        let major_only = polylines(base.clone().gridlines(Axes::Both, Axes::None));
        let with_minor = polylines(base.clone().gridlines(Axes::Both, Axes::Both));
        let bare = polylines(base.gridlines(Axes::None, Axes::None));
        assert!(with_minor > major_only);
        assert!(major_only > bare);
    }
}
