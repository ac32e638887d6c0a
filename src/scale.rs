use crate::chart::AxisLimits;
use crate::ir::{AxisKind, GroupData, RenderData, ResolvedSpec, Scale, Scales};
use tracing::debug;

/// Build data-orientation scales (before any flip).
///
/// Unpinned bounds come from the data padded by 5%. A single pinned bound is
/// kept exactly and the other side is padded away from it. Categorical x
/// always spans the category slots and ignores limits.
pub fn build_scales(data: &RenderData, spec: &ResolvedSpec) -> Scales {
    let groups = || data.layers.iter().flat_map(|l| l.groups.iter());

    let x = if data.x_kind == AxisKind::Categorical {
        if !spec.x_limits.is_auto() {
            debug!("ignoring x limits on a categorical axis");
        }
        let n = data.categories.len().max(1) as f64;
        Scale {
            domain: (-0.5, n - 0.5),
            kind: AxisKind::Categorical,
            categories: data.categories.clone(),
        }
    } else {
        Scale {
            domain: resolve_domain(x_extent(groups()), spec.x_limits),
            kind: data.x_kind,
            categories: Vec::new(),
        }
    };

    let y = Scale {
        domain: resolve_domain(y_extent(groups()), spec.y_limits),
        kind: AxisKind::Continuous,
        categories: Vec::new(),
    };

    debug!(x = ?x.domain, y = ?y.domain, "built scales");
    Scales { x, y }
}

fn x_extent<'a>(groups: impl Iterator<Item = &'a GroupData>) -> Option<(f64, f64)> {
    extent(groups.flat_map(|g| {
        let half = g.x_width.unwrap_or(0.0) / 2.0;
        g.x.iter().flat_map(move |&x| [x - half, x + half])
    }))
}

fn y_extent<'a>(groups: impl Iterator<Item = &'a GroupData>) -> Option<(f64, f64)> {
    extent(groups.flat_map(|g| g.y_min.iter().chain(g.y_max.iter()).copied()))
}

fn extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    (min <= max).then_some((min, max))
}

/// Combine the data extent with the pinned bounds.
pub fn resolve_domain(extent: Option<(f64, f64)>, limits: AxisLimits) -> (f64, f64) {
    match (limits.lower, limits.upper) {
        (Some(lo), Some(hi)) => (lo, hi),
        (Some(lo), None) => {
            let max = extent.map_or(lo, |(_, max)| max);
            if max <= lo {
                (lo, lo + 1.0)
            } else {
                (lo, max + (max - lo) * 0.05)
            }
        }
        (None, Some(hi)) => {
            let min = extent.map_or(hi, |(min, _)| min);
            if min >= hi {
                (hi - 1.0, hi)
            } else {
                (min - (hi - min) * 0.05, hi)
            }
        }
        (None, None) => extent.map_or((0.0, 1.0), |(min, max)| pad_range(min, max)),
    }
}

fn pad_range(min: f64, max: f64) -> (f64, f64) {
    if min == max {
        (min - 1.0, max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding, max + padding)
    }
}
