//! Transient solution of the forward Kolmogorov equations.

use nalgebra::DVector;
use qn_core::{Real, Tolerances, ensure_positive, linspace};
use tracing::debug;

use crate::error::{CtmcError, CtmcResult};
use crate::generator::GeneratorMatrix;
use crate::integrator::{DormandPrince, ExtrapolatedEuler, IntegrationStats, Integrator, StepControl};
use crate::model::{ForwardEquations, LinearModel, TransientModel};

/// Integrator selection for transient solves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntegratorType {
    /// Explicit Runge-Kutta 5(4) (default, cheap per step).
    #[default]
    DormandPrince,
    /// Implicit extrapolated Euler, for chains with widely spread rates.
    ExtrapolatedEuler,
}

/// Options for a transient solve.
#[derive(Clone, Debug)]
pub struct TransientOptions {
    /// Integration horizon
    pub t_max: Real,
    /// State holding all probability mass at t=0
    pub initial_state: usize,
    /// Number of equally spaced output samples, endpoints included
    pub num_samples: usize,
    pub integrator: IntegratorType,
    pub tolerances: Tolerances,
    /// Maximum attempted steps over the whole horizon
    pub max_steps: usize,
}

impl Default for TransientOptions {
    fn default() -> Self {
        let control = StepControl::default();
        Self {
            t_max: 200.0,
            initial_state: 0,
            num_samples: 100,
            integrator: IntegratorType::default(),
            tolerances: control.tolerances,
            max_steps: control.max_steps,
        }
    }
}

impl TransientOptions {
    fn step_control(&self) -> StepControl {
        StepControl {
            tolerances: self.tolerances,
            max_steps: self.max_steps,
        }
    }

    fn validate(&self) -> CtmcResult<()> {
        ensure_positive(self.t_max, "t_max")?;
        if self.num_samples < 2 {
            return Err(CtmcError::invalid(format!(
                "num_samples must be at least 2 (got {})",
                self.num_samples
            )));
        }
        ensure_positive(self.tolerances.rel, "relative tolerance")?;
        ensure_positive(self.tolerances.abs, "absolute tolerance")?;
        if self.max_steps == 0 {
            return Err(CtmcError::invalid("max_steps must be positive"));
        }
        Ok(())
    }
}

/// Sampled state probabilities π(t), in increasing time order.
#[derive(Clone, Debug)]
pub struct ProbabilityTrajectory {
    times: Vec<f64>,
    states: Vec<DVector<f64>>,
    stats: IntegrationStats,
}

impl ProbabilityTrajectory {
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn states(&self) -> &[DVector<f64>] {
        &self.states
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &DVector<f64>)> {
        self.times.iter().copied().zip(self.states.iter())
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Distribution at t_max, the steady-state approximation.
    pub fn terminal(&self) -> &DVector<f64> {
        // a trajectory always holds at least the t=0 and t_max samples
        &self.states[self.states.len() - 1]
    }

    pub fn stats(&self) -> IntegrationStats {
        self.stats
    }
}

/// Integrate dπ/dt = Qᵗπ from a unit mass at `opts.initial_state`.
pub fn solve(q: &GeneratorMatrix, opts: &TransientOptions) -> CtmcResult<ProbabilityTrajectory> {
    opts.validate()?;
    let model = ForwardEquations::new(q, opts.initial_state)?;
    let times = linspace(0.0, opts.t_max, opts.num_samples);
    let control = opts.step_control();

    let mut stats = IntegrationStats::default();
    let states = match opts.integrator {
        IntegratorType::DormandPrince => {
            let mut integrator = DormandPrince::new(control);
            sample(&mut integrator, &model, &times, &mut stats)?
        }
        IntegratorType::ExtrapolatedEuler => {
            let mut integrator = ExtrapolatedEuler::new(control);
            sample(&mut integrator, &model, &times, &mut stats)?
        }
    };

    debug!(
        clients = q.clients(),
        servers = q.servers(),
        integrator = ?opts.integrator,
        accepted = stats.accepted,
        rejected = stats.rejected,
        rhs_evals = stats.rhs_evals,
        factorizations = stats.factorizations,
        "transient solve complete"
    );

    Ok(ProbabilityTrajectory {
        times,
        states,
        stats,
    })
}

fn sample<I: Integrator, M: LinearModel>(
    integrator: &mut I,
    model: &M,
    times: &[f64],
    stats: &mut IntegrationStats,
) -> CtmcResult<Vec<DVector<f64>>> {
    let mut states = Vec::with_capacity(times.len());
    let mut x = model.initial_state();
    states.push(x.clone());
    for window in times.windows(2) {
        x = integrator.advance(model, window[0], window[1], &x, stats)?;
        states.push(x.clone());
    }
    Ok(states)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_defaults() {
        let opts = TransientOptions::default();
        assert_eq!(opts.t_max, 200.0);
        assert_eq!(opts.initial_state, 0);
        assert_eq!(opts.num_samples, 100);
        assert_eq!(opts.integrator, IntegratorType::DormandPrince);
    }

    #[test]
    fn options_invalid() {
        let q = GeneratorMatrix::build(2, 1.0, 1.0, 1).unwrap();

        let opts = TransientOptions {
            t_max: 0.0,
            ..TransientOptions::default()
        };
        assert!(matches!(solve(&q, &opts), Err(CtmcError::InvalidParameter { .. })));

        let opts = TransientOptions {
            num_samples: 1,
            ..TransientOptions::default()
        };
        assert!(solve(&q, &opts).is_err());

        let opts = TransientOptions {
            initial_state: 3,
            ..TransientOptions::default()
        };
        let err = solve(&q, &opts).unwrap_err();
        assert!(err.to_string().contains("initial_state"));
    }

    #[test]
    fn samples_are_equally_spaced_with_endpoints() {
        let q = GeneratorMatrix::build(2, 1.0, 1.0, 1).unwrap();
        let opts = TransientOptions {
            t_max: 10.0,
            num_samples: 11,
            ..TransientOptions::default()
        };
        let traj = solve(&q, &opts).unwrap();
        assert_eq!(traj.len(), 11);
        assert_eq!(traj.times()[0], 0.0);
        assert_eq!(traj.times()[10], 10.0);
        assert_eq!(traj.states()[0].as_slice(), &[1.0, 0.0, 0.0]);
        assert!(traj.stats().accepted > 0);
    }

    #[test]
    fn two_state_chain_matches_closed_form() {
        // p1(t) = (1 - exp(-2t)) / 2 for Q = [[-1, 1], [1, -1]] from state 0
        let q = GeneratorMatrix::build(1, 1.0, 1.0, 1).unwrap();
        for integrator in [IntegratorType::DormandPrince, IntegratorType::ExtrapolatedEuler] {
            let opts = TransientOptions {
                t_max: 5.0,
                num_samples: 21,
                integrator,
                ..TransientOptions::default()
            };
            let traj = solve(&q, &opts).unwrap();
            for (t, pi) in traj.iter() {
                let expected = 0.5 * (1.0 - (-2.0 * t).exp());
                assert!(
                    (pi[1] - expected).abs() < 1e-6,
                    "{integrator:?} at t={t}: {} vs {expected}",
                    pi[1]
                );
            }
        }
    }

    #[test]
    fn zero_clients_stays_put() {
        let q = GeneratorMatrix::build(0, 1.0, 1.0, 1).unwrap();
        let traj = solve(&q, &TransientOptions::default()).unwrap();
        assert_eq!(traj.len(), 100);
        assert!(traj.states().iter().all(|pi| pi[0] == 1.0));
    }
}
