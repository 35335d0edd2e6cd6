//! Transient model traits and the forward Kolmogorov equations.

use nalgebra::DVector;

use crate::error::{CtmcError, CtmcResult};
use crate::generator::GeneratorMatrix;
use crate::tridiagonal::Tridiagonal;

/// Autonomous or time-dependent system `dx/dt = f(t, x)`.
///
/// A TransientModel must provide:
/// - the state dimension
/// - the initial state at t=0
/// - the right-hand side, evaluated without mutating the model
pub trait TransientModel {
    fn dim(&self) -> usize;

    /// Return the initial state at t=0.
    fn initial_state(&self) -> DVector<f64>;

    /// Compute the state derivative dx/dt = f(t, x).
    fn rhs(&self, t: f64, x: &DVector<f64>) -> DVector<f64>;
}

/// Linear constant-coefficient system `dx/dt = A x` with tridiagonal `A`.
pub trait LinearModel: TransientModel {
    fn system_matrix(&self) -> &Tridiagonal;
}

/// Forward equations `dπ/dt = Qᵗ π` started from a unit mass.
#[derive(Debug, Clone)]
pub struct ForwardEquations {
    qt: Tridiagonal,
    initial_state: usize,
}

impl ForwardEquations {
    pub fn new(q: &GeneratorMatrix, initial_state: usize) -> CtmcResult<Self> {
        if initial_state >= q.dim() {
            return Err(CtmcError::invalid(format!(
                "initial_state {initial_state} outside [0, {}]",
                q.dim() - 1
            )));
        }
        // Qᵗ couples state i only with i - 1 and i + 1
        let n = q.dim();
        let lower = (0..n - 1).map(|i| q.rate(i, i + 1)).collect();
        let diag = (0..n).map(|i| q.rate(i, i)).collect();
        let upper = (0..n - 1).map(|i| q.rate(i + 1, i)).collect();
        Ok(Self {
            qt: Tridiagonal::new(lower, diag, upper)?,
            initial_state,
        })
    }
}

impl TransientModel for ForwardEquations {
    fn dim(&self) -> usize {
        self.qt.dim()
    }

    fn initial_state(&self) -> DVector<f64> {
        let mut pi = DVector::zeros(self.dim());
        pi[self.initial_state] = 1.0;
        pi
    }

    fn rhs(&self, _t: f64, x: &DVector<f64>) -> DVector<f64> {
        self.qt.mul_vec(x)
    }
}

impl LinearModel for ForwardEquations {
    fn system_matrix(&self) -> &Tridiagonal {
        &self.qt
    }
}
