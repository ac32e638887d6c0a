//! Writing rendered charts to disk.

use crate::error::{Error, Result};
use crate::runtime::{encode_png, Chart, MAX_PIXELS};
use image::{imageops, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Physical output size and post-processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactOptions {
    /// Inches
    pub width: f64,
    /// Inches
    pub height: f64,
    pub dpi: u32,
    /// Crop surrounding whitespace (PNG only)
    pub trim: bool,
    /// Pixels kept around trimmed content
    pub margin: u32,
}

impl Default for ArtifactOptions {
    fn default() -> Self {
        Self {
            width: 6.0,
            height: 4.0,
            dpi: 150,
            trim: true,
            margin: 8,
        }
    }
}

impl ArtifactOptions {
    /// Pixel size of the drawing canvas.
    pub fn pixel_size(&self) -> Result<(u32, u32)> {
        let to_px = |inches: f64| (inches * self.dpi as f64).round();
        let (w, h) = (to_px(self.width), to_px(self.height));
        if !(w >= 1.0 && h >= 1.0) || w * h > MAX_PIXELS as f64 {
            return Err(Error::InvalidArgument(format!(
                "output size {}x{} in at {} dpi is not drawable",
                self.width, self.height, self.dpi
            )));
        }
        Ok((w as u32, h as u32))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Svg,
}

impl OutputFormat {
    /// Format from a file extension, case-insensitive.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => Ok(OutputFormat::Png),
            "svg" => Ok(OutputFormat::Svg),
            _ => Err(Error::UnsupportedFormat(ext)),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

/// What happened to the whitespace around the chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrimOutcome {
    /// Cropped from the original pixel size
    Trimmed { original: (u32, u32) },
    /// Trimming disabled or nothing to crop
    Untrimmed,
    /// Trimming requested but not possible for this format
    Unavailable(String),
}

/// A chart written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub width_px: u32,
    pub height_px: u32,
    pub trim: TrimOutcome,
}

/// Persist a chart. The format follows the file extension; missing parent
/// directories are created and an existing file is overwritten.
pub fn save(chart: &Chart, path: impl AsRef<Path>, options: &ArtifactOptions) -> Result<Artifact> {
    let path = path.as_ref();
    let format = OutputFormat::from_path(path)?;
    let (width, height) = options.pixel_size()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let (bytes, size, trim) = match format {
        OutputFormat::Png => {
            let image = chart.rasterize(width, height)?;
            let (image, trim) = if options.trim {
                match trim_whitespace(&image, Rgb([255, 255, 255]), options.margin) {
                    Some(cropped) => (cropped, TrimOutcome::Trimmed { original: (width, height) }),
                    None => (image, TrimOutcome::Untrimmed),
                }
            } else {
                (image, TrimOutcome::Untrimmed)
            };
            let size = image.dimensions();
            (encode_png(&image)?, size, trim)
        }
        OutputFormat::Svg => {
            let svg = chart.to_svg(width, height)?;
            let trim = if options.trim {
                let degraded = Error::PostProcessUnavailable {
                    path: path.to_path_buf(),
                    reason: "vector output has no pixel bounds to crop".to_string(),
                };
                warn!("{}", degraded);
                TrimOutcome::Unavailable(degraded.to_string())
            } else {
                TrimOutcome::Untrimmed
            };
            (svg.into_bytes(), (width, height), trim)
        }
    };

    fs::write(path, bytes).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), width = size.0, height = size.1, "saved chart");

    Ok(Artifact {
        path: path.to_path_buf(),
        format,
        width_px: size.0,
        height_px: size.1,
        trim,
    })
}

/// Bounding box `(x, y, width, height)` of pixels differing from
/// `background`, grown by `margin` and clamped to the image.
pub fn content_bounds(image: &RgbImage, background: Rgb<u8>, margin: u32) -> Option<(u32, u32, u32, u32)> {
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0, 0);
    for (x, y, pixel) in image.enumerate_pixels() {
        if *pixel != background {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if min_x == u32::MAX {
        return None;
    }
    let left = min_x.saturating_sub(margin);
    let top = min_y.saturating_sub(margin);
    let right = (max_x + margin).min(image.width() - 1);
    let bottom = (max_y + margin).min(image.height() - 1);
    Some((left, top, right - left + 1, bottom - top + 1))
}

/// Crop to content; `None` when there is nothing to remove.
pub fn trim_whitespace(image: &RgbImage, background: Rgb<u8>, margin: u32) -> Option<RgbImage> {
    let (x, y, w, h) = content_bounds(image, background, margin)?;
    if (w, h) == image.dimensions() {
        return None;
    }
    Some(imageops::crop_imm(image, x, y, w, h).to_image())
}
