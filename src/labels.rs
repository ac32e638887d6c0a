//! Collision-avoiding placement of inline series labels.
//!
//! Works purely in pixel space so it can be tested without a backend.

/// Vertical offsets tried for each label, in label heights, topmost first
/// (screen y grows downwards).
const CANDIDATE_OFFSETS: [f64; 7] = [-1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5];

/// Horizontal gap between the anchor point and the label's left edge.
const ANCHOR_GAP: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl PixelRect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        PixelRect { left, top, right, bottom }
    }

    pub fn contains(&self, other: &PixelRect) -> bool {
        other.left >= self.left && other.right <= self.right && other.top >= self.top && other.bottom <= self.bottom
    }

    pub fn overlaps(&self, other: &PixelRect) -> bool {
        self.left < other.right && other.left < self.right && self.top < other.bottom && other.top < self.bottom
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelRequest {
    pub text: String,
    /// Pixel position of the point being labelled
    pub anchor: (f64, f64),
    /// Higher is placed first
    pub priority: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel {
    /// Index into the request slice
    pub request: usize,
    pub rect: PixelRect,
}

/// Rough extent of a single line of text.
pub fn text_extent(text: &str, font_px: f64) -> (f64, f64) {
    (text.chars().count() as f64 * font_px * 0.6, font_px * 1.2)
}

/// Place labels highest priority first; each takes the topmost candidate
/// that fits inside `bounds` without overlapping a placed label. Labels with
/// no free candidate are left out of the result.
pub fn place_labels(requests: &[LabelRequest], bounds: PixelRect, font_px: f64) -> Vec<PlacedLabel> {
    let mut order: Vec<usize> = (0..requests.len()).collect();
    order.sort_by(|&a, &b| requests[b].priority.total_cmp(&requests[a].priority));

    let mut placed: Vec<PlacedLabel> = Vec::with_capacity(requests.len());
    for idx in order {
        let request = &requests[idx];
        let (width, height) = text_extent(&request.text, font_px);
        let left = request.anchor.0 + ANCHOR_GAP;

        let slot = CANDIDATE_OFFSETS.iter().find_map(|offset| {
            let top = request.anchor.1 + offset * height - height / 2.0;
            let rect = PixelRect::new(left, top, left + width, top + height);
            let free = bounds.contains(&rect) && !placed.iter().any(|p| p.rect.overlaps(&rect));
            free.then_some(rect)
        });

        match slot {
            Some(rect) => placed.push(PlacedLabel { request: idx, rect }),
            None => tracing::debug!(label = %request.text, "dropped inline label, no free position"),
        }
    }
    placed
}
