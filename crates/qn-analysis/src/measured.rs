//! Summary statistics of measured response times.
//!
//! Intervals follow the Student t construction `mean ± t·σ/√n`, with σ the
//! population standard deviation of the samples.

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

/// Confidence level used when none is given.
pub const DEFAULT_CONFIDENCE: f64 = 0.90;

fn ensure_finite_samples(samples: &[f64]) -> AnalysisResult<()> {
    match samples.iter().position(|s| !s.is_finite()) {
        Some(i) => Err(AnalysisError::invalid(format!(
            "sample {i} is not finite ({})",
            samples[i]
        ))),
        None => Ok(()),
    }
}

pub fn mean(samples: &[f64]) -> AnalysisResult<f64> {
    if samples.is_empty() {
        return Err(AnalysisError::InsufficientData {
            what: "mean",
            len: 0,
        });
    }
    ensure_finite_samples(samples)?;
    Ok(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Two-sided Student t interval for the mean of `samples`.
pub fn confidence_interval(samples: &[f64], confidence: f64) -> AnalysisResult<(f64, f64)> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(AnalysisError::invalid(format!(
            "confidence must be in (0, 1) (got {confidence})"
        )));
    }
    if samples.len() < 2 {
        return Err(AnalysisError::InsufficientData {
            what: "confidence interval",
            len: samples.len(),
        });
    }

    let n = samples.len() as f64;
    let m = mean(samples)?;
    let variance = samples.iter().map(|s| (s - m).powi(2)).sum::<f64>() / n;
    let t = student_t_quantile((1.0 + confidence) / 2.0, samples.len() - 1);
    let margin = variance.sqrt() / n.sqrt() * t;
    Ok((m - margin, m + margin))
}

/// Largest degrees of freedom polished against the exact distribution function.
const REFINE_MAX_DOF: usize = 1000;
const MAX_NEWTON_STEPS: usize = 50;

/// Quantile of the Student t distribution with `dof` degrees of freedom.
///
/// Exact for one and two degrees of freedom. Otherwise a fourth-order
/// Cornish-Fisher expansion around the normal quantile, polished by Newton
/// steps on the exact distribution function up to 1000 degrees of freedom;
/// beyond that the expansion alone is within 1e-8 relative for
/// `p` in `[1e-4, 1 - 1e-4]`.
pub fn student_t_quantile(p: f64, dof: usize) -> f64 {
    debug_assert!(p > 0.0 && p < 1.0);
    match dof {
        0 => f64::NAN,
        1 => (std::f64::consts::PI * (p - 0.5)).tan(),
        2 => {
            let a = 2.0 * p - 1.0;
            a * (2.0 / (1.0 - a * a)).sqrt()
        }
        _ => {
            let estimate = cornish_fisher(p, dof);
            if dof > REFINE_MAX_DOF {
                estimate
            } else {
                newton_refine(p, dof, estimate)
            }
        }
    }
}

fn cornish_fisher(p: f64, dof: usize) -> f64 {
    let v = dof as f64;
    let z = inv_norm_cdf(p);
    let z2 = z * z;
    let z3 = z2 * z;
    let z5 = z3 * z2;
    let z7 = z5 * z2;
    let z9 = z7 * z2;
    let g1 = (z3 + z) / 4.0;
    let g2 = (5.0 * z5 + 16.0 * z3 + 3.0 * z) / 96.0;
    let g3 = (3.0 * z7 + 19.0 * z5 + 17.0 * z3 - 15.0 * z) / 384.0;
    let g4 = (79.0 * z9 + 776.0 * z7 + 1482.0 * z5 - 1920.0 * z3 - 945.0 * z) / 92160.0;
    z + g1 / v + g2 / v.powi(2) + g3 / v.powi(3) + g4 / v.powi(4)
}

fn newton_refine(p: f64, dof: usize, mut t: f64) -> f64 {
    for _ in 0..MAX_NEWTON_STEPS {
        let step = (student_t_cdf(t, dof) - p) / student_t_pdf(t, dof);
        if !step.is_finite() {
            break;
        }
        t -= step;
        if step.abs() <= 1e-12 * t.abs().max(1.0) {
            break;
        }
    }
    t
}

/// Distribution function for integer `dof`, by the finite series in
/// θ = atan(t/√ν) (Abramowitz & Stegun 26.7.3 and 26.7.4).
fn student_t_cdf(t: f64, dof: usize) -> f64 {
    let theta = (t / (dof as f64).sqrt()).atan();
    let (sin, cos) = theta.sin_cos();
    let cos2 = cos * cos;

    // probability of |T| <= |t|, signed like t
    let central = if dof % 2 == 1 {
        let mut sum = 0.0;
        if dof > 1 {
            let mut term = cos;
            sum = cos;
            for k in 1..=(dof - 3) / 2 {
                term *= cos2 * (2 * k) as f64 / (2 * k + 1) as f64;
                sum += term;
            }
        }
        2.0 / std::f64::consts::PI * (theta + sin * sum)
    } else {
        let mut term = 1.0;
        let mut sum = 1.0;
        for k in 1..=(dof - 2) / 2 {
            term *= cos2 * (2 * k - 1) as f64 / (2 * k) as f64;
            sum += term;
        }
        sin * sum
    };
    0.5 + 0.5 * central
}

fn student_t_pdf(t: f64, dof: usize) -> f64 {
    let v = dof as f64;
    // Γ((ν+1)/2) / Γ(ν/2) by stepping ν up two at a time
    let (mut ratio, mut k) = if dof % 2 == 1 {
        (1.0 / std::f64::consts::PI.sqrt(), 1)
    } else {
        (std::f64::consts::PI.sqrt() / 2.0, 2)
    };
    while k < dof {
        ratio *= (k + 1) as f64 / k as f64;
        k += 2;
    }
    ratio / (v * std::f64::consts::PI).sqrt() * (1.0 + t * t / v).powf(-(v + 1.0) / 2.0)
}

/// Inverse CDF of the standard normal distribution (Acklam's rational approximation).
fn inv_norm_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e+01,
        2.209_460_984_245_205e+02,
        -2.759_285_104_469_687e+02,
        1.383_577_518_672_690e+02,
        -3.066_479_806_614_716e+01,
        2.506_628_277_459_239e+00,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e+01,
        1.615_858_368_580_409e+02,
        -1.556_989_798_598_866e+02,
        6.680_131_188_771_972e+01,
        -1.328_068_155_288_572e+01,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-03,
        -3.223_964_580_411_365e-01,
        -2.400_758_277_161_838e+00,
        -2.549_732_539_343_734e+00,
        4.374_664_141_464_968e+00,
        2.938_163_982_698_783e+00,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-03,
        3.224_671_290_700_398e-01,
        2.445_134_137_142_996e+00,
        3.754_408_661_907_416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    let tail = |q: f64| {
        let num = ((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5];
        let den = (((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0;
        num / den
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p > 1.0 - P_LOW {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    } else {
        let q = p - 0.5;
        let r = q * q;
        let num = (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q;
        let den = ((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0;
        num / den
    }
}

/// Measured response time with its confidence bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasuredMetric {
    pub avg_response_time: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Server utilization observed during the run, if recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization: Option<f64>,
}

impl MeasuredMetric {
    pub fn from_samples(
        response_times: &[f64],
        confidence: f64,
        utilization: Option<f64>,
    ) -> AnalysisResult<Self> {
        if let Some(u) = utilization {
            if !(0.0..=1.0).contains(&u) {
                return Err(AnalysisError::invalid(format!(
                    "utilization must be in [0, 1] (got {u})"
                )));
            }
        }
        let avg_response_time = mean(response_times)?;
        let (lower_bound, upper_bound) = confidence_interval(response_times, confidence)?;
        Ok(Self {
            avg_response_time,
            lower_bound,
            upper_bound,
            utilization,
        })
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.lower_bound..=self.upper_bound).contains(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_basic() {
        assert_eq!(mean(&[1.0, 2.0, 3.0, 6.0]).unwrap(), 3.0);
        assert!(matches!(
            mean(&[]),
            Err(AnalysisError::InsufficientData { len: 0, .. })
        ));
        assert!(mean(&[1.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn normal_quantile_reference_values() {
        assert!(inv_norm_cdf(0.5).abs() < 1e-12);
        assert!((inv_norm_cdf(0.975) - 1.959_963_985).abs() < 1e-6);
        assert!((inv_norm_cdf(0.01) + 2.326_347_874).abs() < 1e-6);
    }

    #[test]
    fn t_quantile_reference_values() {
        assert!((student_t_quantile(0.975, 1) - 12.706_204_736).abs() < 1e-6);
        assert!((student_t_quantile(0.975, 2) - 4.302_652_730).abs() < 1e-6);
        assert!((student_t_quantile(0.95, 2) - 2.919_985_580).abs() < 1e-6);
        assert!((student_t_quantile(0.975, 3) - 3.182_446_305).abs() < 1e-8);
        assert!((student_t_quantile(0.975, 10) - 2.228_138_852).abs() < 1e-8);
        assert!((student_t_quantile(0.95, 30) - 1.697_260_887).abs() < 1e-8);
        assert!((student_t_quantile(0.975, 10_000) - 1.960_201_263).abs() < 1e-5);
    }

    #[test]
    fn t_quantile_accurate_in_the_tails_for_few_samples() {
        assert!((student_t_quantile(0.995, 3) - 5.840_909_310).abs() < 1e-7);
        assert!((student_t_quantile(0.995, 4) - 4.604_094_871).abs() < 1e-7);
        assert!((student_t_quantile(0.005, 5) + 4.032_142_984).abs() < 1e-7);
    }

    #[test]
    fn t_distribution_function_reference_values() {
        assert!((student_t_cdf(0.0, 7) - 0.5).abs() < 1e-15);
        // t_{0.975, 3} and t_{0.975, 4}
        assert!((student_t_cdf(3.182_446_305, 3) - 0.975).abs() < 1e-9);
        assert!((student_t_cdf(2.776_445_105, 4) - 0.975).abs() < 1e-9);
        assert!((student_t_cdf(-2.776_445_105, 4) - 0.025).abs() < 1e-9);
    }

    #[test]
    fn t_quantile_is_symmetric() {
        for dof in [1, 2, 5, 40] {
            let hi = student_t_quantile(0.9, dof);
            let lo = student_t_quantile(0.1, dof);
            assert!((hi + lo).abs() < 1e-9, "dof {dof}: {hi} vs {lo}");
        }
    }

    #[test]
    fn interval_brackets_mean() {
        let samples = [0.9, 1.1, 1.0, 1.2, 0.8, 1.05, 0.95];
        let (lo, hi) = confidence_interval(&samples, 0.95).unwrap();
        let m = mean(&samples).unwrap();
        assert!(lo < m && m < hi);
        assert!(((hi - m) - (m - lo)).abs() < 1e-12);

        let (lo90, hi90) = confidence_interval(&samples, 0.90).unwrap();
        assert!(hi90 - lo90 < hi - lo);
    }

    #[test]
    fn interval_two_samples() {
        // σ = 1, n = 2, t(0.975, 1) = 12.706
        let (lo, hi) = confidence_interval(&[1.0, 3.0], 0.95).unwrap();
        let margin = 12.706_204_736 / 2f64.sqrt();
        assert!((lo - (2.0 - margin)).abs() < 1e-6);
        assert!((hi - (2.0 + margin)).abs() < 1e-6);
    }

    #[test]
    fn interval_rejects_bad_input() {
        assert!(matches!(
            confidence_interval(&[1.0], 0.9),
            Err(AnalysisError::InsufficientData { len: 1, .. })
        ));
        assert!(confidence_interval(&[1.0, 2.0], 1.0).is_err());
        assert!(confidence_interval(&[1.0, 2.0], 0.0).is_err());
    }

    #[test]
    fn constant_samples_collapse_interval() {
        let m = MeasuredMetric::from_samples(&[2.5; 8], DEFAULT_CONFIDENCE, Some(0.4)).unwrap();
        assert_eq!(m.avg_response_time, 2.5);
        assert_eq!(m.lower_bound, 2.5);
        assert_eq!(m.upper_bound, 2.5);
        assert!(m.contains(2.5));
        assert!(!m.contains(2.6));
    }

    #[test]
    fn measured_rejects_bad_utilization() {
        assert!(MeasuredMetric::from_samples(&[1.0, 2.0], 0.9, Some(1.5)).is_err());
    }
}
