//! Continuous-time Markov chain machinery for closed M/M/c networks.
//!
//! Provides:
//! - Generator (rate) matrix construction for N clients and c servers
//! - Closed-form stationary distribution of the birth-death chain
//! - Forward Kolmogorov equations as a linear transient model on a
//!   tridiagonal system matrix
//! - Adaptive integrators (explicit Dormand-Prince, extrapolated implicit Euler)
//! - Transient solver sampling π(t) over [0, t_max]

pub mod error;
pub mod generator;
pub mod integrator;
pub mod model;
pub mod stationary;
pub mod transient;
pub mod tridiagonal;

pub use error::{CtmcError, CtmcResult};
pub use generator::GeneratorMatrix;
pub use integrator::{DormandPrince, ExtrapolatedEuler, IntegrationStats, Integrator, StepControl};
pub use model::{ForwardEquations, LinearModel, TransientModel};
pub use stationary::stationary_distribution;
pub use transient::{IntegratorType, ProbabilityTrajectory, TransientOptions, solve};
pub use tridiagonal::{ShiftedFactor, Tridiagonal};
