//! Closed-form stationary distribution of the closed M/M/c birth-death chain.
//!
//! Detailed balance gives
//! `π[i] / π[i-1] = (N - i + 1) λ / (min(i, c) μ)`;
//! products are accumulated as logarithms so populations near 1000 do not
//! overflow.

use qn_core::ensure_positive;

use crate::error::{CtmcError, CtmcResult};

pub fn stationary_distribution(
    clients: usize,
    arrival_rate: f64,
    service_rate: f64,
    servers: usize,
) -> CtmcResult<Vec<f64>> {
    ensure_positive(arrival_rate, "arrival_rate")?;
    ensure_positive(service_rate, "service_rate")?;
    if servers == 0 {
        return Err(CtmcError::invalid("number_of_servers must be at least 1"));
    }

    let mut log_weights = Vec::with_capacity(clients + 1);
    let mut acc = 0.0_f64;
    log_weights.push(acc);
    for i in 1..=clients {
        let up = (clients - i + 1) as f64 * arrival_rate;
        let down = i.min(servers) as f64 * service_rate;
        acc += up.ln() - down.ln();
        log_weights.push(acc);
    }

    let max = log_weights
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let weights: Vec<f64> = log_weights.iter().map(|w| (w - max).exp()).collect();
    let total: f64 = weights.iter().sum();

    Ok(weights.into_iter().map(|w| w / total).collect())
}
