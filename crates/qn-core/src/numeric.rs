use crate::QnError;

/// Floating point type used throughout the workspace
pub type Real = f64;

/// Absolute/relative tolerance pair
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

impl Tolerances {
    /// Error weight for a component whose magnitude is `scale`.
    pub fn weight(&self, scale: Real) -> Real {
        self.abs + self.rel * scale.abs()
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, QnError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(QnError::NonFinite { what, value: v })
    }
}

/// Finite and strictly positive.
pub fn ensure_positive(v: Real, what: &'static str) -> Result<Real, QnError> {
    let v = ensure_finite(v, what)?;
    if v > 0.0 {
        Ok(v)
    } else {
        Err(QnError::InvalidParameter {
            what: format!("{what} must be positive (got {v})"),
        })
    }
}

/// Evenly spaced points over `[start, end]`, endpoints exact.
pub fn linspace(start: Real, end: Real, num_points: usize) -> Vec<Real> {
    match num_points {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let delta = (end - start) / (num_points - 1) as Real;
            let mut points: Vec<Real> = (0..num_points)
                .map(|i| start + i as Real * delta)
                .collect();
            points[num_points - 1] = end;
            points
        }
    }
}
