//! Colour and typography resolution.
//!
//! Turns the optional, string-typed style values of a chart spec into
//! concrete plotters colours and pixel sizes.

use plotters::style::RGBColor;

/// Colour of de-emphasised series under a highlight.
pub const MUTED_GREY: RGBColor = RGBColor(190, 190, 190);

pub const DEFAULT_MARK: RGBColor = RGBColor(70, 130, 180); // steelblue

/// Qualitative palette for series, cycled by series index.
pub const PALETTE: [RGBColor; 8] = [
    RGBColor(0, 114, 178),
    RGBColor(230, 159, 0),
    RGBColor(0, 158, 115),
    RGBColor(204, 121, 167),
    RGBColor(86, 180, 233),
    RGBColor(213, 94, 0),
    RGBColor(240, 228, 66),
    RGBColor(0, 0, 0),
];

pub fn palette_color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

/// Text sizes and neutral colours, in pixels for a reference 600 px tall
/// image. [`ResolvedTheme::scaled`] adapts them to the output size.
#[derive(Debug, Clone)]
pub struct ResolvedTheme {
    pub font_family: String,
    pub title_size: f64,
    pub subtitle_size: f64,
    pub axis_title_size: f64,
    pub axis_text_size: f64,
    pub caption_size: f64,
    pub legend_text_size: f64,
    pub inline_label_size: f64,
    pub text_color: RGBColor,
    pub subtle_text_color: RGBColor,
    pub grid_major: RGBColor,
    pub grid_minor: RGBColor,
    pub axis_line: RGBColor,
    pub background: RGBColor,
}

impl Default for ResolvedTheme {
    fn default() -> Self {
        ResolvedTheme {
            font_family: "sans-serif".to_string(),
            title_size: 26.0,
            subtitle_size: 19.0,
            axis_title_size: 18.0,
            axis_text_size: 15.0,
            caption_size: 14.0,
            legend_text_size: 15.0,
            inline_label_size: 15.0,
            text_color: RGBColor(30, 30, 30),
            subtle_text_color: RGBColor(90, 90, 90),
            grid_major: RGBColor(215, 215, 215),
            grid_minor: RGBColor(238, 238, 238),
            axis_line: RGBColor(60, 60, 60),
            background: RGBColor(255, 255, 255),
        }
    }
}

const REFERENCE_HEIGHT: f64 = 600.0;

impl ResolvedTheme {
    /// Theme with text sizes scaled to an image `height` pixels tall.
    pub fn scaled(height: u32) -> Self {
        let factor = (height as f64 / REFERENCE_HEIGHT).max(0.5);
        let base = Self::default();
        ResolvedTheme {
            title_size: base.title_size * factor,
            subtitle_size: base.subtitle_size * factor,
            axis_title_size: base.axis_title_size * factor,
            axis_text_size: base.axis_text_size * factor,
            caption_size: base.caption_size * factor,
            legend_text_size: base.legend_text_size * factor,
            inline_label_size: base.inline_label_size * factor,
            ..base
        }
    }
}

/// Resolve an optional colour string, falling back to `default` for unset or
/// unknown values.
pub fn resolve_color(color: Option<&str>, default: RGBColor) -> RGBColor {
    color.and_then(parse_color).unwrap_or(default)
}

/// Parse a color string into RGBColor, supporting hex (#RRGGBB, #RGB) and named colors
pub fn parse_color(color_str: &str) -> Option<RGBColor> {
    let color_str = color_str.trim();

    if color_str.starts_with('#') {
        return parse_hex_color(color_str);
    }

    match color_str.to_lowercase().as_str() {
        "white" => Some(RGBColor(255, 255, 255)),
        "black" => Some(RGBColor(0, 0, 0)),
        "red" => Some(RGBColor(255, 0, 0)),
        "firebrick" => Some(RGBColor(178, 34, 34)),
        "green" => Some(RGBColor(0, 128, 0)),
        "blue" => Some(RGBColor(0, 0, 255)),
        "steelblue" => Some(RGBColor(70, 130, 180)),
        "navy" => Some(RGBColor(0, 0, 128)),
        "yellow" => Some(RGBColor(255, 255, 0)),
        "cyan" => Some(RGBColor(0, 255, 255)),
        "magenta" => Some(RGBColor(255, 0, 255)),
        "orange" => Some(RGBColor(255, 165, 0)),
        "purple" => Some(RGBColor(128, 0, 128)),
        "pink" => Some(RGBColor(255, 192, 203)),
        "brown" => Some(RGBColor(139, 69, 19)),
        "gray" | "grey" => Some(RGBColor(128, 128, 128)),
        "darkgray" | "darkgrey" => Some(RGBColor(64, 64, 64)),
        "lightgray" | "lightgrey" => Some(RGBColor(192, 192, 192)),
        // gray0 (black) to gray100 (white)
        s if s.starts_with("gray") || s.starts_with("grey") => {
            let n = s[4..].parse::<u8>().ok().filter(|n| *n <= 100)?;
            let v = ((n as u32 * 255 + 50) / 100) as u8;
            Some(RGBColor(v, v, v))
        }
        _ => None,
    }
}

/// Parse hex color (#RRGGBB or #RGB)
fn parse_hex_color(hex: &str) -> Option<RGBColor> {
    let hex = hex.trim_start_matches('#');
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some(RGBColor(r, g, b))
        }
        3 => {
            let r = u8::from_str_radix(&hex[0..1], 16).ok()? * 17;
            let g = u8::from_str_radix(&hex[1..2], 16).ok()? * 17;
            let b = u8::from_str_radix(&hex[2..3], 16).ok()? * 17;
            Some(RGBColor(r, g, b))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_color("#ff8000"), Some(RGBColor(255, 128, 0)));
        assert_eq!(parse_color("#fff"), Some(RGBColor(255, 255, 255)));
        assert_eq!(parse_color("#12"), None);
        assert_eq!(parse_color("#+f+f+f"), None);
    }

    #[test]
    fn test_non_ascii_hex_is_rejected() {
        assert_eq!(parse_color("#aéaé"), None);
        assert_eq!(parse_color("#é1"), None);
    }

    #[test]
    fn test_parse_named_and_grey_scale() {
        assert_eq!(parse_color("SteelBlue"), Some(RGBColor(70, 130, 180)));
        assert_eq!(parse_color("grey50"), Some(RGBColor(128, 128, 128)));
        assert_eq!(parse_color("grey70"), Some(RGBColor(179, 179, 179)));
        assert_eq!(parse_color("gray100"), Some(RGBColor(255, 255, 255)));
        assert_eq!(parse_color("grey200"), None);
        assert_eq!(parse_color("chartreuse-ish"), None);
    }

    #[test]
    fn test_resolve_color_fallback() {
        assert_eq!(resolve_color(Some("nope"), MUTED_GREY), MUTED_GREY);
        assert_eq!(resolve_color(None, DEFAULT_MARK), DEFAULT_MARK);
    }

    #[test]
    fn test_palette_cycles() {
        assert_eq!(palette_color(0), palette_color(PALETTE.len()));
    }

    #[test]
    fn test_scaled_theme() {
        let small = ResolvedTheme::scaled(300);
        let big = ResolvedTheme::scaled(1200);
        assert!(big.title_size > small.title_size);
    }
}
