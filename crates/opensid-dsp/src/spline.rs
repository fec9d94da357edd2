//! Monotone cubic interpolation (Fritsch-Carlson) over measured data points.
//!
//! Used at calibration time to resample the measured op-amp voltage transfer
//! curve onto a uniform lookup-table grid. The measured curve is monotone
//! with closely spaced knots around its knee; an ordinary cubic spline
//! overshoots there, a Fritsch-Carlson spline does not.

/// A measured sample point.
#[derive(Clone, Copy)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Monotone cubic spline through a set of points sorted by ascending x.
pub struct MonotoneSpline {
    /// Knot abscissas. Segment `i` covers `[xs[i], xs[i + 1]]`.
    xs: Vec<f64>,
    /// Per-segment cubic coefficients `[y, c1, c2, c3]`:
    /// `y(x) = y + c1*d + c2*d^2 + c3*d^3` with `d = x - xs[i]`.
    coeffs: Vec<[f64; 4]>,
}

impl MonotoneSpline {
    /// Builds the spline. Points must be sorted by strictly ascending x.
    pub fn new(points: &[Point]) -> Self {
        assert!(points.len() >= 3, "spline needs at least 3 points");

        let n = points.len() - 1;
        let h: Vec<f64> = (0..n).map(|i| points[i + 1].x - points[i].x).collect();
        let m: Vec<f64> = (0..n)
            .map(|i| (points[i + 1].y - points[i].y) / h[i])
            .collect();

        // Knot tangents: one-sided slopes at the ends, weighted harmonic mean
        // of adjacent secant slopes inside. A sign change or flat secant
        // forces a zero tangent, which is what keeps the curve monotone.
        let mut t = vec![0.0; n + 1];
        t[0] = m[0];
        t[n] = m[n - 1];
        for i in 1..n {
            if m[i - 1] * m[i] <= 0.0 {
                t[i] = 0.0;
            } else {
                let w1 = 2.0 * h[i] + h[i - 1];
                let w2 = h[i] + 2.0 * h[i - 1];
                t[i] = (w1 + w2) / (w1 / m[i - 1] + w2 / m[i]);
            }
        }

        let mut xs = Vec::with_capacity(n);
        let mut coeffs = Vec::with_capacity(n);
        for i in 0..n {
            let c2 = (3.0 * m[i] - 2.0 * t[i] - t[i + 1]) / h[i];
            let c3 = (t[i] + t[i + 1] - 2.0 * m[i]) / (h[i] * h[i]);
            xs.push(points[i].x);
            coeffs.push([points[i].y, t[i], c2, c3]);
        }

        MonotoneSpline { xs, coeffs }
    }

    /// Evaluates the spline at `x`. Outside the knot range the end segments
    /// extend, so callers clamp the result to their physical range.
    pub fn evaluate(&self, x: f64) -> f64 {
        let i = self.xs.partition_point(|&x0| x0 <= x);
        let i = i.saturating_sub(1).min(self.coeffs.len() - 1);

        let d = x - self.xs[i];
        let [y, c1, c2, c3] = self.coeffs[i];
        ((c3 * d + c2) * d + c1) * d + y
    }
}
