//! Summary statistics behind the distribution geometries and the
//! aggregation reducers.

/// Type-7 quantile of already-sorted data (linear interpolation between
/// order statistics). `p` is clamped to `[0, 1]`.
pub fn percentile(sorted_data: &[f64], p: f64) -> Option<f64> {
    let n = sorted_data.len();
    if n == 0 {
        return None;
    }
    if n == 1 {
        return Some(sorted_data[0]);
    }

    let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;

    if lower_idx == upper_idx {
        Some(sorted_data[lower_idx])
    } else {
        let weight = rank - lower_idx as f64;
        Some(sorted_data[lower_idx] * (1.0 - weight) + sorted_data[upper_idx] * weight)
    }
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

pub fn quantile(values: &[f64], p: f64) -> Option<f64> {
    percentile(&sorted(values), p)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1 denominator). Needs two values.
pub fn sample_sd(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some(variance.sqrt())
}

/// Five-number summary with Tukey whiskers.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    /// Smallest value not below `q1 - 1.5 IQR`
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Largest value not above `q3 + 1.5 IQR`
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    let ys = sorted(values);
    let q1 = percentile(&ys, 0.25)?;
    let median = percentile(&ys, 0.50)?;
    let q3 = percentile(&ys, 0.75)?;
    let iqr = q3 - q1;

    let lower_fence = q1 - 1.5 * iqr;
    let upper_fence = q3 + 1.5 * iqr;

    // ys is sorted, so the first/last value inside the fences are the whiskers
    let lower_whisker = ys.iter().copied().find(|&v| v >= lower_fence).unwrap_or(q1);
    let upper_whisker = ys.iter().rev().copied().find(|&v| v <= upper_fence).unwrap_or(q3);

    let outliers = ys
        .iter()
        .copied()
        .filter(|&v| v < lower_fence || v > upper_fence)
        .collect();

    Some(BoxStats {
        lower_whisker,
        q1,
        median,
        q3,
        upper_whisker,
        outliers,
    })
}

/// Silverman's rule of thumb: `0.9 * min(sd, IQR / 1.34) * n^(-1/5)`.
///
/// Falls back to whichever scale is positive, and to 1.0 for degenerate
/// samples so the kernel never divides by zero.
pub fn silverman_bandwidth(data: &[f64]) -> f64 {
    let n = data.len() as f64;
    let Some(std_dev) = sample_sd(data) else {
        return 1.0;
    };

    let ys = sorted(data);
    let iqr = match (percentile(&ys, 0.25), percentile(&ys, 0.75)) {
        (Some(q1), Some(q3)) => q3 - q1,
        _ => 0.0,
    };

    let scale = if iqr > 0.0 { std_dev.min(iqr / 1.34) } else { std_dev };
    if scale <= 0.0 {
        return 1.0;
    }
    0.9 * scale * n.powf(-0.2)
}

fn gaussian_kernel(u: f64) -> f64 {
    const SQRT_2PI: f64 = 2.5066282746310002;
    (-0.5 * u * u).exp() / SQRT_2PI
}

/// Resolution of density curves
pub const KDE_GRID_POINTS: usize = 128;

/// A density curve evaluated on an evenly spaced grid.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityCurve {
    pub x: Vec<f64>,
    pub density: Vec<f64>,
}

impl DensityCurve {
    pub fn max_density(&self) -> f64 {
        self.density.iter().fold(0.0f64, |a, &b| a.max(b))
    }
}

/// Gaussian KDE over `[min - 3h, max + 3h]`.
pub fn kde(data: &[f64], bandwidth: f64) -> DensityCurve {
    if data.is_empty() {
        return DensityCurve {
            x: Vec::new(),
            density: Vec::new(),
        };
    }
    let min_y = data.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max_y = data.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let extend = 3.0 * bandwidth;
    kde_on_range(data, bandwidth, min_y - extend, max_y + extend)
}

/// Gaussian KDE evaluated at [`KDE_GRID_POINTS`] points spanning `[start, end]`.
pub fn kde_on_range(data: &[f64], bandwidth: f64, start: f64, end: f64) -> DensityCurve {
    let n = data.len() as f64;
    let range = end - start;
    if data.is_empty() || range <= 0.0 || bandwidth <= 0.0 {
        return DensityCurve {
            x: vec![start],
            density: vec![if data.is_empty() { 0.0 } else { 1.0 }],
        };
    }

    let step = range / (KDE_GRID_POINTS - 1) as f64;
    let mut grid = Vec::with_capacity(KDE_GRID_POINTS);
    let mut density = Vec::with_capacity(KDE_GRID_POINTS);

    for i in 0..KDE_GRID_POINTS {
        let y = start + i as f64 * step;
        let d: f64 = data.iter().map(|&xi| gaussian_kernel((y - xi) / bandwidth)).sum();
        grid.push(y);
        density.push(d / (n * bandwidth));
    }

    DensityCurve { x: grid, density }
}

/// One histogram bin, `[lower, upper)` except the last which is closed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

impl Bin {
    pub fn center(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }
}

/// Equal-width bins across `[min, max]`. A zero-width range gets unit-wide
/// bins starting at `min`.
pub fn histogram(data: &[f64], bins: usize, min: f64, max: f64) -> Vec<Bin> {
    let bins = bins.max(1);
    let range = max - min;
    let width = if range > 0.0 { range / bins as f64 } else { 1.0 };

    let mut counts = vec![0usize; bins];
    for &v in data {
        if v < min || v > max {
            continue;
        }
        let idx = (((v - min) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bin {
            lower: min + i as f64 * width,
            upper: min + (i + 1) as f64 * width,
            count,
        })
        .collect()
}

/// Empirical CDF as steps: each distinct value and the fraction of data at
/// or below it.
pub fn ecdf(data: &[f64]) -> Vec<(f64, f64)> {
    let ys = sorted(data);
    let n = ys.len() as f64;
    let mut steps: Vec<(f64, f64)> = Vec::new();
    for (i, &v) in ys.iter().enumerate() {
        let frac = (i + 1) as f64 / n;
        match steps.last_mut() {
            Some(last) if last.0 == v => last.1 = frac,
            _ => steps.push((v, frac)),
        }
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_percentile_type7() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile(&data, 0.25).unwrap(), 1.75);
        assert_relative_eq!(percentile(&data, 0.5).unwrap(), 2.5);
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn test_sample_sd() {
        let sd = sample_sd(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_relative_eq!(sd, 2.138089935299395, epsilon = 1e-12);
        assert_eq!(sample_sd(&[1.0]), None);
    }

    #[test]
    fn test_box_stats_outliers() {
        let stats = box_stats(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]).unwrap();
        assert_eq!(stats.outliers, vec![100.0]);
        assert_relative_eq!(stats.upper_whisker, 5.0);
        assert_relative_eq!(stats.lower_whisker, 1.0);
        assert_relative_eq!(stats.median, 3.5);
    }

    #[test]
    fn test_kde_integrates_to_one() {
        let data = [1.0, 2.0, 2.5, 3.0, 4.5];
        let curve = kde(&data, silverman_bandwidth(&data));
        let step = curve.x[1] - curve.x[0];
        let area: f64 = curve.density.iter().sum::<f64>() * step;
        assert_relative_eq!(area, 1.0, epsilon = 0.02);
    }

    #[test]
    fn test_histogram_counts_everything() {
        let data = [0.0, 0.5, 1.0, 1.5, 2.0];
        let bins = histogram(&data, 2, 0.0, 2.0);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 5);
        assert_eq!(bins[1].count, 3);
    }

    #[test]
    fn test_ecdf_steps() {
        let steps = ecdf(&[3.0, 1.0, 1.0, 2.0]);
        assert_eq!(steps, vec![(1.0, 0.5), (2.0, 0.75), (3.0, 1.0)]);
    }
}
