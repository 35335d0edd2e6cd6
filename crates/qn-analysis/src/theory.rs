//! Theoretical metrics of a closed M/M/c network.
//!
//! For a distribution π over states `0..=N`:
//! - `L = Σ i·π[i]` (mean clients at the facility)
//! - `X = Σ min(i, c)·μ·π[i]` (throughput)
//! - `R = L / X` by Little's law, `+∞` when `X = 0`
//! - `U = Σ min(i, c)·π[i] / c` (fraction of busy servers)

use qn_core::{SystemConfiguration, Tolerances, ensure_positive};
use qn_ctmc::{GeneratorMatrix, IntegratorType, TransientOptions, solve};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnalysisError, AnalysisResult};

/// Allowed deviation of a distribution's total mass from 1.
const MASS_TOLERANCE: f64 = 1e-6;
/// Most negative entry accepted as integration noise.
const NEGATIVE_NOISE: f64 = -1e-9;
/// Fastest exit rate times horizon above which the implicit integrator is used.
const STIFFNESS_THRESHOLD: f64 = 1e5;
/// Step tolerances of the implicit integrator in a sweep. Its fixed point is
/// the stationary distribution at any step size, so these only bound the
/// error of the transient on the way there.
const IMPLICIT_TOLERANCES: Tolerances = Tolerances {
    abs: 1e-8,
    rel: 1e-5,
};

/// Response time and utilization predicted for one client population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TheoreticalMetric {
    /// Mean time a request spends queued or in service
    pub avg_response_time: f64,
    /// Mean fraction of servers busy, in [0, 1]
    pub utilization: f64,
    /// Mean number of clients at the facility (L)
    pub mean_clients: f64,
    /// Completed requests per time unit (X)
    pub throughput: f64,
}

/// Reduce a (steady-state) distribution to performance metrics.
///
/// Entries down to `-1e-9` are tolerated as integration noise; utilization is
/// clamped to [0, 1] to absorb that noise.
pub fn derive(
    steady_state: &[f64],
    clients: usize,
    servers: usize,
    service_rate: f64,
) -> AnalysisResult<TheoreticalMetric> {
    ensure_positive(service_rate, "service_rate")?;
    if servers == 0 {
        return Err(AnalysisError::invalid("number_of_servers must be at least 1"));
    }
    if steady_state.len() != clients + 1 {
        return Err(AnalysisError::invalid(format!(
            "distribution has {} states, expected {}",
            steady_state.len(),
            clients + 1
        )));
    }
    if let Some(i) = steady_state
        .iter()
        .position(|p| !p.is_finite() || *p < NEGATIVE_NOISE)
    {
        return Err(AnalysisError::invalid(format!(
            "distribution entry {i} is not a probability ({})",
            steady_state[i]
        )));
    }
    let mass: f64 = steady_state.iter().sum();
    if (mass - 1.0).abs() > MASS_TOLERANCE {
        return Err(AnalysisError::invalid(format!(
            "distribution sums to {mass}, expected 1"
        )));
    }

    let mut mean_clients = 0.0;
    let mut busy_servers = 0.0;
    for (i, p) in steady_state.iter().enumerate() {
        mean_clients += i as f64 * p;
        busy_servers += i.min(servers) as f64 * p;
    }
    let throughput = busy_servers * service_rate;

    let avg_response_time = if throughput > 0.0 {
        mean_clients / throughput
    } else {
        f64::INFINITY
    };
    let utilization = (busy_servers / servers as f64).clamp(0.0, 1.0);

    Ok(TheoreticalMetric {
        avg_response_time,
        utilization,
        mean_clients,
        throughput,
    })
}

/// Transient options for one population: the configured horizon, and the
/// implicit integrator when the chain is too stiff for explicit stepping.
pub fn transient_options_for(config: &SystemConfiguration, clients: usize) -> TransientOptions {
    let fastest_exit = clients as f64 * config.arrival_rate
        + clients.min(config.number_of_servers) as f64 * config.service_rate;
    let opts = TransientOptions {
        t_max: config.integration_horizon,
        ..TransientOptions::default()
    };
    if fastest_exit * config.integration_horizon > STIFFNESS_THRESHOLD {
        TransientOptions {
            integrator: IntegratorType::ExtrapolatedEuler,
            tolerances: IMPLICIT_TOLERANCES,
            ..opts
        }
    } else {
        opts
    }
}

/// Build, solve and reduce the chain for `clients`.
pub fn compute_theoretical_metric(
    config: &SystemConfiguration,
    clients: usize,
) -> AnalysisResult<TheoreticalMetric> {
    compute_theoretical_metric_with(config, clients, &transient_options_for(config, clients))
}

pub fn compute_theoretical_metric_with(
    config: &SystemConfiguration,
    clients: usize,
    opts: &TransientOptions,
) -> AnalysisResult<TheoreticalMetric> {
    config.validate()?;
    let servers = config.number_of_servers;

    let q = GeneratorMatrix::build(clients, config.arrival_rate, config.service_rate, servers)
        .map_err(|e| AnalysisError::from_ctmc(e, clients))?;
    let trajectory = solve(&q, opts).map_err(|e| AnalysisError::from_ctmc(e, clients))?;
    let metric = derive(
        trajectory.terminal().as_slice(),
        clients,
        servers,
        config.service_rate,
    )?;

    debug!(
        clients,
        response_time = metric.avg_response_time,
        utilization = metric.utilization,
        "theoretical metric"
    );
    Ok(metric)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_half_two_state() {
        let m = derive(&[0.5, 0.5], 1, 1, 1.0).unwrap();
        assert_eq!(m.utilization, 0.5);
        assert_eq!(m.mean_clients, 0.5);
        assert_eq!(m.throughput, 0.5);
        assert_eq!(m.avg_response_time, 1.0);
    }

    #[test]
    fn all_thinking_gives_infinite_response_time() {
        let m = derive(&[1.0, 0.0, 0.0, 0.0], 3, 2, 4.0).unwrap();
        assert!(m.avg_response_time.is_infinite());
        assert_eq!(m.utilization, 0.0);
        assert_eq!(m.throughput, 0.0);
    }

    #[test]
    fn response_time_finite_while_any_server_busy() {
        for eps in [1e-2, 1e-4, 1e-6, 1e-8] {
            let m = derive(&[1.0 - eps, eps], 1, 1, 1.0).unwrap();
            assert!(m.avg_response_time.is_finite());
            // a lone client in service leaves at rate μ
            assert!((m.avg_response_time - 1.0).abs() < 1e-12);
        }

        // two clients queued behind one server wait for each other
        let m = derive(&[1e-9, 0.0, 1.0 - 1e-9], 2, 1, 1.0).unwrap();
        assert!(m.avg_response_time > 1.9);
    }

    #[test]
    fn servers_cap_busy_count() {
        // all 4 clients present, 2 servers: both busy
        let m = derive(&[0.0, 0.0, 0.0, 0.0, 1.0], 4, 2, 3.0).unwrap();
        assert_eq!(m.utilization, 1.0);
        assert_eq!(m.throughput, 6.0);
        assert!((m.avg_response_time - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_malformed_distributions() {
        assert!(derive(&[0.5, 0.5], 2, 1, 1.0).is_err());
        assert!(derive(&[0.7, 0.7], 1, 1, 1.0).is_err());
        assert!(derive(&[1.1, -0.1], 1, 1, 1.0).is_err());
        assert!(derive(&[f64::NAN, 1.0], 1, 1, 1.0).is_err());
        assert!(derive(&[0.5, 0.5], 1, 0, 1.0).is_err());
        assert!(derive(&[0.5, 0.5], 1, 1, 0.0).is_err());
    }

    #[test]
    fn tiny_negative_noise_is_tolerated() {
        let m = derive(&[1.0, -1e-12], 1, 1, 2.0).unwrap();
        assert_eq!(m.utilization, 0.0);
    }

    #[test]
    fn stiff_populations_use_implicit_integrator() {
        let cfg = SystemConfiguration::new(10.0, 5.0, 4, vec![10, 1000]);
        assert_eq!(
            transient_options_for(&cfg, 10).integrator,
            IntegratorType::DormandPrince
        );
        assert_eq!(
            transient_options_for(&cfg, 1000).integrator,
            IntegratorType::ExtrapolatedEuler
        );
        assert_eq!(transient_options_for(&cfg, 10).t_max, cfg.integration_horizon);
        assert_eq!(transient_options_for(&cfg, 1000).tolerances, IMPLICIT_TOLERANCES);
        assert_eq!(
            transient_options_for(&cfg, 10).tolerances,
            TransientOptions::default().tolerances
        );
    }
}
