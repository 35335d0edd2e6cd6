//! Adaptive time integrators.
//!
//! Both integrators carry their step size (and cached work) across calls to
//! [`Integrator::advance`], so a trajectory sampled on a fine output grid does
//! not restart step selection at every sample.

use nalgebra::DVector;
use qn_core::Tolerances;
use tracing::{trace, warn};

use crate::error::{CtmcError, CtmcResult};
use crate::model::{LinearModel, TransientModel};
use crate::tridiagonal::{ShiftedFactor, Tridiagonal};

/// Counters accumulated over one integration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IntegrationStats {
    pub accepted: usize,
    pub rejected: usize,
    pub rhs_evals: usize,
    pub factorizations: usize,
}

impl IntegrationStats {
    pub fn attempts(&self) -> usize {
        self.accepted + self.rejected
    }
}

/// Error tolerances and step budget shared by the integrators.
#[derive(Clone, Copy, Debug)]
pub struct StepControl {
    pub tolerances: Tolerances,
    /// Maximum number of attempted steps (accepted + rejected)
    pub max_steps: usize,
}

impl Default for StepControl {
    fn default() -> Self {
        Self {
            tolerances: Tolerances {
                abs: 1e-10,
                rel: 1e-8,
            },
            max_steps: 1_000_000,
        }
    }
}

impl StepControl {
    fn check_budget(&self, stats: &IntegrationStats, t: f64) -> CtmcResult<()> {
        if stats.attempts() >= self.max_steps {
            warn!(t, max_steps = self.max_steps, "step budget exhausted");
            return Err(CtmcError::failure(format!(
                "step budget of {} exhausted at t = {t}",
                self.max_steps
            )));
        }
        Ok(())
    }
}

/// Trait for adaptive integrators over linear models.
pub trait Integrator {
    /// Advance `x` from `t0` to exactly `t1`.
    fn advance<M: LinearModel>(
        &mut self,
        model: &M,
        t0: f64,
        t1: f64,
        x: &DVector<f64>,
        stats: &mut IntegrationStats,
    ) -> CtmcResult<DVector<f64>>;
}

/// Weighted RMS norm of `err` against the larger of `x_old` and `x_new`.
fn error_norm(
    err: &DVector<f64>,
    x_old: &DVector<f64>,
    x_new: &DVector<f64>,
    tol: Tolerances,
) -> f64 {
    let n = err.len().max(1) as f64;
    let sum_sq: f64 = err
        .iter()
        .zip(x_old.iter().zip(x_new.iter()))
        .map(|(e, (a, b))| {
            let w = tol.weight(a.abs().max(b.abs()));
            (e / w).powi(2)
        })
        .sum();
    (sum_sq / n).sqrt()
}

fn all_finite(x: &DVector<f64>) -> bool {
    x.iter().all(|v| v.is_finite())
}

// Dormand-Prince 5(4) tableau
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// 5th minus embedded 4th order weights
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Explicit embedded Runge-Kutta 5(4) with first-same-as-last reuse.
///
/// Only evaluates `rhs`, so it works for any [`TransientModel`]; it is
/// exposed through [`Integrator`] for uniform dispatch.
#[derive(Clone, Debug)]
pub struct DormandPrince {
    control: StepControl,
    h: Option<f64>,
    fsal: Option<(f64, DVector<f64>)>,
}

impl DormandPrince {
    pub fn new(control: StepControl) -> Self {
        Self {
            control,
            h: None,
            fsal: None,
        }
    }

    /// Current step size proposal, if any step has been taken.
    pub fn step_size(&self) -> Option<f64> {
        self.h
    }

    /// Starting step heuristic (Hairer, Nørsett & Wanner, II.4).
    fn initial_step<M: TransientModel>(
        &self,
        model: &M,
        t0: f64,
        x0: &DVector<f64>,
        f0: &DVector<f64>,
        stats: &mut IntegrationStats,
    ) -> f64 {
        let tol = self.control.tolerances;
        let zeros = DVector::zeros(x0.len());
        let d0 = error_norm(x0, x0, &zeros, tol);
        let d1 = error_norm(f0, x0, &zeros, tol);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        };

        let x1 = x0 + f0 * h0;
        let f1 = model.rhs(t0 + h0, &x1);
        stats.rhs_evals += 1;
        let d2 = error_norm(&(f1 - f0), x0, &zeros, tol) / h0;

        let dmax = d1.max(d2);
        let h1 = if dmax <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / dmax).powf(1.0 / 5.0)
        };
        (100.0 * h0).min(h1)
    }

    fn derivative_at<M: TransientModel>(
        &mut self,
        model: &M,
        t: f64,
        x: &DVector<f64>,
        stats: &mut IntegrationStats,
    ) -> DVector<f64> {
        match self.fsal.take() {
            Some((ts, k)) if ts == t => k,
            _ => {
                stats.rhs_evals += 1;
                model.rhs(t, x)
            }
        }
    }
}

impl Integrator for DormandPrince {
    fn advance<M: LinearModel>(
        &mut self,
        model: &M,
        t0: f64,
        t1: f64,
        x: &DVector<f64>,
        stats: &mut IntegrationStats,
    ) -> CtmcResult<DVector<f64>> {
        let tol = self.control.tolerances;
        let mut t = t0;
        let mut x = x.clone();
        let mut k1 = self.derivative_at(model, t, &x, stats);
        let mut h = match self.h {
            Some(h) => h,
            None => self.initial_step(model, t, &x, &k1, stats),
        };

        while t < t1 {
            self.control.check_budget(stats, t)?;

            let remaining = t1 - t;
            let last = h >= remaining;
            let step = if last { remaining } else { h };
            if step <= f64::EPSILON * t.abs().max(1.0) {
                warn!(t, step, "step size underflow");
                return Err(CtmcError::failure(format!(
                    "step size underflow ({step:e}) at t = {t}"
                )));
            }

            let k2 = model.rhs(t + C2 * step, &(&x + &k1 * (A21 * step)));
            let k3 = model.rhs(
                t + C3 * step,
                &(&x + (&k1 * A31 + &k2 * A32) * step),
            );
            let k4 = model.rhs(
                t + C4 * step,
                &(&x + (&k1 * A41 + &k2 * A42 + &k3 * A43) * step),
            );
            let k5 = model.rhs(
                t + C5 * step,
                &(&x + (&k1 * A51 + &k2 * A52 + &k3 * A53 + &k4 * A54) * step),
            );
            let k6 = model.rhs(
                t + step,
                &(&x + (&k1 * A61 + &k2 * A62 + &k3 * A63 + &k4 * A64 + &k5 * A65) * step),
            );
            let x_new = &x + (&k1 * A71 + &k3 * A73 + &k4 * A74 + &k5 * A75 + &k6 * A76) * step;
            let k7 = model.rhs(t + step, &x_new);
            stats.rhs_evals += 6;

            let err = (&k1 * E1 + &k3 * E3 + &k4 * E4 + &k5 * E5 + &k6 * E6 + &k7 * E7) * step;
            let norm = error_norm(&err, &x, &x_new, tol);

            if !norm.is_finite() || !all_finite(&x_new) {
                return Err(CtmcError::failure(format!(
                    "non-finite state at t = {t} (step {step:e})"
                )));
            }

            if norm <= 1.0 {
                let factor = if norm == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * norm.powf(-1.0 / 5.0)).clamp(MIN_FACTOR, MAX_FACTOR)
                };
                t = if last { t1 } else { t + step };
                x = x_new;
                k1 = k7;
                stats.accepted += 1;
                let proposal = step * factor;
                h = if last { proposal.max(h) } else { proposal };
            } else {
                let factor = (SAFETY * norm.powf(-1.0 / 5.0)).clamp(MIN_FACTOR, 1.0);
                stats.rejected += 1;
                trace!(t, step, norm, "rejected step");
                h = step * factor;
            }
        }

        self.h = Some(h);
        self.fsal = Some((t1, k1));
        Ok(x)
    }
}

/// Finest subdivision of an interval, as a power of two.
const MAX_LEVEL: u32 = 40;
/// Factorizations kept alive at once.
const FACTOR_CACHE_CAPACITY: usize = 4;

/// Implicit Euler with Richardson extrapolation (order 2, L-stable).
///
/// Steps are `(t1 - t0) / 2^level` of the interval being advanced, so every
/// interval ends exactly on a step. Each step needs factorizations of
/// `I - hA` and `I - (h/2)A`; they are cached by step size, so a uniform
/// output grid keeps reusing them.
pub struct ExtrapolatedEuler {
    control: StepControl,
    level: u32,
    cache: Vec<ShiftedFactor>,
}

impl ExtrapolatedEuler {
    pub fn new(control: StepControl) -> Self {
        Self {
            control,
            level: 0,
            cache: Vec::with_capacity(FACTOR_CACHE_CAPACITY),
        }
    }

    /// Level of the most recent step proposal.
    pub fn level(&self) -> u32 {
        self.level
    }

    fn ensure_factored(
        &mut self,
        a: &Tridiagonal,
        h: f64,
        keep: f64,
        stats: &mut IntegrationStats,
    ) -> CtmcResult<()> {
        if self.cache.iter().any(|f| f.step() == h) {
            return Ok(());
        }
        if self.cache.len() >= FACTOR_CACHE_CAPACITY {
            if let Some(pos) = self.cache.iter().position(|f| f.step() != keep) {
                self.cache.remove(pos);
            }
        }
        self.cache.push(a.factor_shifted(h)?);
        stats.factorizations += 1;
        Ok(())
    }

    fn implicit_solve(&self, h: f64, rhs: &DVector<f64>) -> CtmcResult<DVector<f64>> {
        self.cache
            .iter()
            .find(|f| f.step() == h)
            .map(|f| f.solve(rhs))
            .ok_or_else(|| CtmcError::failure(format!("missing factorization for step {h:e}")))
    }
}

impl Integrator for ExtrapolatedEuler {
    fn advance<M: LinearModel>(
        &mut self,
        model: &M,
        t0: f64,
        t1: f64,
        x: &DVector<f64>,
        stats: &mut IntegrationStats,
    ) -> CtmcResult<DVector<f64>> {
        let tol = self.control.tolerances;
        let span = t1 - t0;
        let mut x = x.clone();
        if span <= 0.0 {
            return Ok(x);
        }
        let total: u64 = 1 << MAX_LEVEL;
        let mut done: u64 = 0;

        while done < total {
            let t = t0 + span * (done as f64 / total as f64);
            self.control.check_budget(stats, t)?;

            // never overshoot the interval end
            let mut level = self.level;
            while level < MAX_LEVEL && (1u64 << (MAX_LEVEL - level)) > total - done {
                level += 1;
            }
            if level >= MAX_LEVEL {
                warn!(t, level, "step size underflow");
                return Err(CtmcError::failure(format!(
                    "step size underflow at t = {t} (level {level})"
                )));
            }

            // exact: scaling by a power of two
            let h = span / 2f64.powi(level as i32);
            let a = model.system_matrix();
            self.ensure_factored(a, h, h / 2.0, stats)?;
            self.ensure_factored(a, h / 2.0, h, stats)?;

            let full = self.implicit_solve(h, &x)?;
            let mid = self.implicit_solve(h / 2.0, &x)?;
            let half = self.implicit_solve(h / 2.0, &mid)?;

            let extrapolated = &half * 2.0 - &full;
            let err = &half - &full;
            let norm = error_norm(&err, &x, &extrapolated, tol);

            if !norm.is_finite() || !all_finite(&extrapolated) {
                return Err(CtmcError::failure(format!(
                    "non-finite state at t = {t} (level {level})"
                )));
            }

            if norm <= 1.0 {
                x = extrapolated;
                done += 1u64 << (MAX_LEVEL - level);
                stats.accepted += 1;
                // local error of the estimate scales with h^2
                self.level = if norm < 0.2 { level.saturating_sub(1) } else { level };
            } else {
                stats.rejected += 1;
                trace!(t, level, norm, "rejected step");
                self.level = level + if norm > 16.0 { 2 } else { 1 };
            }
        }

        Ok(x)
    }
}
