//! Theoretical metrics across a sweep of client populations.
//!
//! Each client count is solved independently from the same configuration, so
//! the sweep can run sequentially or on the rayon pool with identical results.
//! Results are always returned in the configuration's client order.

use qn_core::SystemConfiguration;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::AnalysisResult;
use crate::theory::{TheoreticalMetric, compute_theoretical_metric};

/// Metric computed for one client population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TheoreticalPoint {
    pub clients: usize,
    #[serde(flatten)]
    pub metric: TheoreticalMetric,
}

/// Evaluate every client count in order, stopping at the first failure.
pub fn compute_theoretical_metrics(
    config: &SystemConfiguration,
) -> AnalysisResult<Vec<TheoreticalPoint>> {
    config.validate()?;
    debug!(
        counts = config.client_counts.len(),
        servers = config.number_of_servers,
        "theoretical sweep"
    );

    config
        .client_counts
        .iter()
        .map(|&clients| point(config, clients))
        .collect()
}

/// Same as [`compute_theoretical_metrics`], with client counts solved in parallel.
pub fn compute_theoretical_metrics_parallel(
    config: &SystemConfiguration,
) -> AnalysisResult<Vec<TheoreticalPoint>> {
    config.validate()?;
    debug!(
        counts = config.client_counts.len(),
        servers = config.number_of_servers,
        threads = rayon::current_num_threads(),
        "parallel theoretical sweep"
    );

    config
        .client_counts
        .par_iter()
        .map(|&clients| point(config, clients))
        .collect()
}

/// Evaluate every client count, keeping failures next to their population.
///
/// Only an invalid configuration fails the whole call.
pub fn compute_theoretical_metrics_each(
    config: &SystemConfiguration,
) -> AnalysisResult<Vec<(usize, AnalysisResult<TheoreticalMetric>)>> {
    config.validate()?;

    let results: Vec<_> = config
        .client_counts
        .iter()
        .map(|&clients| (clients, compute_theoretical_metric(config, clients)))
        .collect();

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    if failed > 0 {
        warn!(failed, total = results.len(), "theoretical sweep had failures");
    }
    Ok(results)
}

fn point(config: &SystemConfiguration, clients: usize) -> AnalysisResult<TheoreticalPoint> {
    compute_theoretical_metric(config, clients).map(|metric| TheoreticalPoint { clients, metric })
}
