//! Pairing of theoretical predictions with measured results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::measured::MeasuredMetric;
use crate::sweep::TheoreticalPoint;

/// Prediction and measurement for one client population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub clients: usize,
    pub theoretical: TheoreticalPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measured: Option<MeasuredMetric>,
}

impl Comparison {
    /// Relative error of the measured mean response time against theory.
    ///
    /// `None` without a measurement or when the prediction is zero or infinite.
    pub fn response_time_error(&self) -> Option<f64> {
        let predicted = self.theoretical.metric.avg_response_time;
        if !predicted.is_finite() || predicted == 0.0 {
            return None;
        }
        self.measured
            .map(|m| (m.avg_response_time - predicted) / predicted)
    }

    /// Whether the prediction falls inside the measured confidence interval.
    pub fn within_interval(&self) -> Option<bool> {
        self.measured
            .map(|m| m.contains(self.theoretical.metric.avg_response_time))
    }

    /// Measured minus predicted utilization.
    pub fn utilization_error(&self) -> Option<f64> {
        self.measured
            .and_then(|m| m.utilization)
            .map(|u| u - self.theoretical.metric.utilization)
    }
}

/// Join measurements onto theoretical points by client count, in theoretical order.
///
/// Measurements for populations missing from `theoretical` are dropped; a
/// repeated population keeps its last measurement.
pub fn compare(
    theoretical: &[TheoreticalPoint],
    measured: &[(usize, MeasuredMetric)],
) -> Vec<Comparison> {
    let by_clients: HashMap<usize, MeasuredMetric> = measured.iter().copied().collect();
    theoretical
        .iter()
        .map(|point| Comparison {
            clients: point.clients,
            theoretical: *point,
            measured: by_clients.get(&point.clients).copied(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::TheoreticalMetric;

    fn point(clients: usize, avg_response_time: f64, utilization: f64) -> TheoreticalPoint {
        TheoreticalPoint {
            clients,
            metric: TheoreticalMetric {
                avg_response_time,
                utilization,
                mean_clients: 0.0,
                throughput: 0.0,
            },
        }
    }

    fn measured(avg: f64, half_width: f64, utilization: Option<f64>) -> MeasuredMetric {
        MeasuredMetric {
            avg_response_time: avg,
            lower_bound: avg - half_width,
            upper_bound: avg + half_width,
            utilization,
        }
    }

    #[test]
    fn joins_in_theoretical_order() {
        let theory = [point(1, 1.0, 0.5), point(2, 1.5, 0.8), point(4, 3.0, 1.0)];
        let runs = [(4, measured(3.3, 0.5, None)), (1, measured(1.1, 0.2, Some(0.45)))];
        let rows = compare(&theory, &runs);

        assert_eq!(rows.iter().map(|r| r.clients).collect::<Vec<_>>(), vec![1, 2, 4]);
        assert!(rows[1].measured.is_none());
        assert_eq!(rows[1].response_time_error(), None);
        assert_eq!(rows[1].within_interval(), None);

        assert!((rows[0].response_time_error().unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(rows[0].within_interval(), Some(true));
        assert!((rows[0].utilization_error().unwrap() + 0.05).abs() < 1e-12);

        assert_eq!(rows[2].within_interval(), Some(true));
        assert_eq!(rows[2].utilization_error(), None);
    }

    #[test]
    fn prediction_outside_interval() {
        let rows = compare(&[point(3, 2.0, 0.7)], &[(3, measured(3.0, 0.5, None))]);
        assert_eq!(rows[0].within_interval(), Some(false));
        assert!((rows[0].response_time_error().unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn infinite_prediction_has_no_relative_error() {
        let rows = compare(
            &[point(2, f64::INFINITY, 0.0)],
            &[(2, measured(4.0, 1.0, None))],
        );
        assert_eq!(rows[0].response_time_error(), None);
        assert_eq!(rows[0].within_interval(), Some(false));
    }
}
