//! Performance metrics of closed M/M/c networks.
//!
//! This crate reduces transient CTMC solutions to response time and
//! utilization, sweeps them over client populations, summarizes measured
//! samples, and lines both up for comparison.

pub mod compare;
pub mod error;
pub mod measured;
pub mod sweep;
pub mod theory;

pub use compare::{Comparison, compare};
pub use error::{AnalysisError, AnalysisResult};
pub use measured::{
    DEFAULT_CONFIDENCE, MeasuredMetric, confidence_interval, mean, student_t_quantile,
};
pub use sweep::{
    TheoreticalPoint, compute_theoretical_metrics, compute_theoretical_metrics_each,
    compute_theoretical_metrics_parallel,
};
pub use theory::{
    TheoreticalMetric, compute_theoretical_metric, compute_theoretical_metric_with, derive,
    transient_options_for,
};
