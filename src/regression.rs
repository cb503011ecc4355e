//! Ordinary least squares for the scatter plots.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Residual standard error, sqrt(SSE / (n - 2)). Zero when n == 2.
    pub residual_se: f64,
    pub n: usize,
    pub mean_x: f64,
    /// Sum of squared deviations of x.
    pub sxx: f64,
}

/// Fit y = intercept + slope * x.
///
/// Returns `None` for fewer than two points or when every x is the same.
pub fn fit(points: &[(f64, f64)]) -> Option<LinearFit> {
    let n = points.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / nf;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for &(x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    if sxx <= f64::EPSILON * nf {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let sse = points
        .iter()
        .map(|&(x, y)| {
            let r = y - (intercept + slope * x);
            r * r
        })
        .sum::<f64>();
    let r_squared = if syy > 0.0 { 1.0 - sse / syy } else { 1.0 };
    let residual_se = if n > 2 {
        (sse / (nf - 2.0)).sqrt()
    } else {
        0.0
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
        residual_se,
        n,
        mean_x,
        sxx,
    })
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// 95% confidence interval of the mean prediction at `x`.
    pub fn confidence_band(&self, x: f64) -> (f64, f64) {
        let y = self.predict(x);
        if self.n <= 2 {
            return (y, y);
        }
        let nf = self.n as f64;
        let dx = x - self.mean_x;
        let se = self.residual_se * (1.0 / nf + dx * dx / self.sxx).sqrt();
        let half = t_critical_95(self.n - 2) * se;
        (y - half, y + half)
    }
}

/// Two-sided 95% Student-t critical value.
pub fn t_critical_95(df: usize) -> f64 {
    const TABLE: [f64; 30] = [
        12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, 2.201, 2.179,
        2.160, 2.145, 2.131, 2.120, 2.110, 2.101, 2.093, 2.086, 2.080, 2.074, 2.069, 2.064,
        2.060, 2.056, 2.052, 2.048, 2.045, 2.042,
    ];
    match df {
        0 => f64::INFINITY,
        1..=30 => TABLE[df - 1],
        31..=60 => 2.000,
        61..=120 => 1.980,
        _ => 1.960,
    }
}
