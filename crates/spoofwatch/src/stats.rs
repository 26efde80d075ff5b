//! Small statistics helpers backing the detection methods

use rand::Rng;

#[inline]
#[must_use]
fn median(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Online min/max accumulator used by the calibration paths
#[derive(Clone, Copy, Debug)]
pub struct MinMax {
    min: f64,
    max: f64,
    num: usize,
}

#[allow(clippy::new_without_default)]
impl MinMax {
    pub fn new() -> Self {
        Self {
            min: f64::MAX,
            max: f64::MIN,
            num: 0,
        }
    }

    pub fn update(&mut self, sample: f64) {
        if sample.is_nan() {
            return;
        }
        self.min = self.min.min(sample);
        self.max = self.max.max(sample);
        self.num += 1;
    }

    pub fn min(&self) -> Option<f64> {
        (self.num > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.num > 0).then_some(self.max)
    }
}

/// A fitted regression line `y = slope * x + intercept`
#[derive(Clone, Copy, Debug)]
pub struct Line {
    pub slope: f64,
    pub intercept: f64,
}

impl Line {
    #[inline]
    #[must_use]
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least-squares line fit
///
/// `None` when there are fewer than two points or the x values are degenerate.
pub fn least_squares_line(points: &[(f64, f64)]) -> Option<Line> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in points {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some(Line {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

/// Robust line fit: RANSAC with a least-squares refit over the consensus set
///
/// The residual threshold is the median absolute deviation of the targets, so
/// a handful of outliers cannot drag the fit. Perfectly flat input is fine;
/// degenerate input (fewer than two points, or no two distinct x values)
/// yields `None`.
pub fn ransac_line<R: Rng + ?Sized>(points: &[(f64, f64)], rng: &mut R) -> Option<Line> {
    const ITERATIONS: usize = 100;

    if points.len() < 2 {
        return None;
    }

    let mut targets: Vec<f64> = points.iter().map(|(_, y)| *y).collect();
    targets.sort_by(f64::total_cmp);
    let median_target = median(&targets);
    let mut deviations: Vec<f64> = targets.iter().map(|y| (y - median_target).abs()).collect();
    deviations.sort_by(f64::total_cmp);
    let threshold = median(&deviations).max(1e-12);

    let mut best: Option<(usize, Line)> = None;
    for _ in 0..ITERATIONS {
        let i = rng.random_range(0..points.len());
        let j = rng.random_range(0..points.len());
        if i == j || points[i].0 == points[j].0 {
            continue;
        }
        let slope = (points[j].1 - points[i].1) / (points[j].0 - points[i].0);
        let line = Line {
            slope,
            intercept: points[i].1 - slope * points[i].0,
        };
        let inliers = points
            .iter()
            .filter(|(x, y)| (y - line.predict(*x)).abs() <= threshold)
            .count();
        if best.is_none_or(|(most, _)| inliers > most) {
            best = Some((inliers, line));
        }
    }

    let (_, candidate) = best?;
    let consensus: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(x, y)| (y - candidate.predict(*x)).abs() <= threshold)
        .collect();
    least_squares_line(&consensus).or(Some(candidate))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_min_max() {
        let mut acc = MinMax::new();
        assert_eq!(acc.min(), None);
        assert_eq!(acc.max(), None);
        for sample in [3.0, -1.0, f64::NAN, 2.0] {
            acc.update(sample);
        }
        assert_eq!(acc.min(), Some(-1.0));
        assert_eq!(acc.max(), Some(3.0));
    }

    #[test]
    fn test_least_squares_recovers_a_line() {
        let points: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 2.0 * i as f64 + 1.0)).collect();
        let line = least_squares_line(&points).unwrap();
        assert_relative_eq!(line.slope, 2.0, epsilon = 1e-9);
        assert_relative_eq!(line.intercept, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_least_squares_degenerate() {
        assert!(least_squares_line(&[(1.0, 1.0)]).is_none());
        assert!(least_squares_line(&[(1.0, 1.0), (1.0, 2.0)]).is_none());
    }

    #[test]
    fn test_ransac_on_flat_data() {
        let mut rng = StdRng::seed_from_u64(7);
        let points: Vec<(f64, f64)> = (0..20).map(|i| (i as f64, 0.0)).collect();
        let line = ransac_line(&points, &mut rng).unwrap();
        assert_relative_eq!(line.slope, 0.0, epsilon = 1e-9);
        assert_relative_eq!(line.predict(25.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ransac_ignores_outliers() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut points: Vec<(f64, f64)> =
            (0..20).map(|i| (i as f64, 0.5 * i as f64 + 2.0)).collect();
        points.push((20.0, 500.0));
        points.push((21.0, -300.0));
        let line = ransac_line(&points, &mut rng).unwrap();
        assert_relative_eq!(line.slope, 0.5, epsilon = 1e-6);
        assert_relative_eq!(line.intercept, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_ransac_degenerate() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(ransac_line(&[], &mut rng).is_none());
        assert!(ransac_line(&[(0.0, 1.0)], &mut rng).is_none());
        let vertical = [(1.0, 0.0), (1.0, 1.0), (1.0, 2.0)];
        assert!(ransac_line(&vertical, &mut rng).is_none());
    }
}
