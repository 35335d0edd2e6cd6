//! Tridiagonal matrices and factorizations of their implicit-step systems.
//!
//! A birth-death generator only couples neighbouring states, so its
//! transpose is stored as three bands. Products cost O(n) and the systems
//! `(I - hA) x = b` of an implicit step are factored once in O(n) and then
//! solved any number of times by forward and back substitution.

use nalgebra::DVector;

use crate::error::{CtmcError, CtmcResult};

/// Square matrix with nonzeros only on the main diagonal and its neighbours.
#[derive(Debug, Clone, PartialEq)]
pub struct Tridiagonal {
    /// `a[i + 1][i]`, length n - 1
    lower: Vec<f64>,
    diag: Vec<f64>,
    /// `a[i][i + 1]`, length n - 1
    upper: Vec<f64>,
}

impl Tridiagonal {
    pub fn new(lower: Vec<f64>, diag: Vec<f64>, upper: Vec<f64>) -> CtmcResult<Self> {
        let n = diag.len();
        if n == 0 {
            return Err(CtmcError::invalid("tridiagonal matrix must not be empty"));
        }
        if lower.len() != n - 1 || upper.len() != n - 1 {
            return Err(CtmcError::invalid(format!(
                "off-diagonal bands must have length {} (got {} and {})",
                n - 1,
                lower.len(),
                upper.len()
            )));
        }
        Ok(Self { lower, diag, upper })
    }

    pub fn dim(&self) -> usize {
        self.diag.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn diag(&self) -> &[f64] {
        &self.diag
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// `A x`
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        let n = self.dim();
        DVector::from_fn(n, |i, _| {
            let mut y = self.diag[i] * x[i];
            if i > 0 {
                y += self.lower[i - 1] * x[i - 1];
            }
            if i + 1 < n {
                y += self.upper[i] * x[i + 1];
            }
            y
        })
    }

    /// Factor `I - h A` without pivoting.
    ///
    /// Stable when `I - hA` is diagonally dominant by rows or columns, which
    /// holds for the transpose of a generator and any `h >= 0`.
    pub fn factor_shifted(&self, h: f64) -> CtmcResult<ShiftedFactor> {
        let n = self.dim();
        let upper: Vec<f64> = self.upper.iter().map(|u| -h * u).collect();
        let mut multipliers = Vec::with_capacity(n - 1);
        let mut pivots = Vec::with_capacity(n);

        let mut pivot = 1.0 - h * self.diag[0];
        for i in 1..n {
            check_pivot(pivot, i - 1)?;
            let m = -h * self.lower[i - 1] / pivot;
            multipliers.push(m);
            pivots.push(pivot);
            pivot = 1.0 - h * self.diag[i] - m * upper[i - 1];
        }
        check_pivot(pivot, n - 1)?;
        pivots.push(pivot);

        Ok(ShiftedFactor {
            h,
            multipliers,
            pivots,
            upper,
        })
    }
}

fn check_pivot(pivot: f64, row: usize) -> CtmcResult<()> {
    if pivot == 0.0 || !pivot.is_finite() {
        return Err(CtmcError::failure(format!(
            "singular implicit system (pivot {pivot} at row {row})"
        )));
    }
    Ok(())
}

/// LU factors of `I - hA` for a [`Tridiagonal`] `A`.
#[derive(Debug, Clone)]
pub struct ShiftedFactor {
    h: f64,
    multipliers: Vec<f64>,
    pivots: Vec<f64>,
    upper: Vec<f64>,
}

impl ShiftedFactor {
    /// Step size the factorization was built for.
    pub fn step(&self) -> f64 {
        self.h
    }

    /// Solve `(I - hA) x = b`.
    pub fn solve(&self, b: &DVector<f64>) -> DVector<f64> {
        let n = self.pivots.len();
        let mut x = b.clone();
        for i in 1..n {
            x[i] -= self.multipliers[i - 1] * x[i - 1];
        }
        x[n - 1] /= self.pivots[n - 1];
        for i in (0..n - 1).rev() {
            x[i] = (x[i] - self.upper[i] * x[i + 1]) / self.pivots[i];
        }
        x
    }
}
