//! System configuration for a closed M/M/c network sweep.
//!
//! The configuration is immutable once validated and is shared by every
//! per-client-count evaluation of a sweep.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{QnError, QnResult};
use crate::numeric::{Real, ensure_positive};

/// Integration horizon used when none is given.
pub const DEFAULT_INTEGRATION_HORIZON: Real = 200.0;

fn default_integration_horizon() -> Real {
    DEFAULT_INTEGRATION_HORIZON
}

/// Parameters of a closed network of `N` thinking clients and `c` identical servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfiguration {
    /// Per-client think rate λ.
    #[serde(alias = "lambda_rate")]
    pub arrival_rate: Real,
    /// Per-server service rate μ.
    #[serde(alias = "mu_rate")]
    pub service_rate: Real,
    /// Number of servers c.
    pub number_of_servers: usize,
    /// Client counts N₁..Nₖ, evaluated in this order.
    pub client_counts: Vec<usize>,
    /// Horizon of the transient integration that approximates steady state.
    ///
    /// Unrelated to how long a load generator runs against a live server.
    #[serde(default = "default_integration_horizon")]
    pub integration_horizon: Real,
}

impl SystemConfiguration {
    pub fn new(
        arrival_rate: Real,
        service_rate: Real,
        number_of_servers: usize,
        client_counts: Vec<usize>,
    ) -> Self {
        Self {
            arrival_rate,
            service_rate,
            number_of_servers,
            client_counts,
            integration_horizon: DEFAULT_INTEGRATION_HORIZON,
        }
    }

    /// Configuration sweeping every client count in `range`.
    pub fn with_client_range(
        arrival_rate: Real,
        service_rate: Real,
        number_of_servers: usize,
        range: RangeInclusive<usize>,
    ) -> Self {
        Self::new(
            arrival_rate,
            service_rate,
            number_of_servers,
            range.collect(),
        )
    }

    pub fn with_integration_horizon(mut self, horizon: Real) -> Self {
        self.integration_horizon = horizon;
        self
    }

    /// Eager parameter checks; run before any matrix is built.
    pub fn validate(&self) -> QnResult<()> {
        ensure_positive(self.arrival_rate, "arrival_rate")?;
        ensure_positive(self.service_rate, "service_rate")?;
        ensure_positive(self.integration_horizon, "integration_horizon")?;

        if self.number_of_servers == 0 {
            return Err(QnError::invalid("number_of_servers must be at least 1"));
        }
        if self.client_counts.is_empty() {
            return Err(QnError::invalid("client_counts must not be empty"));
        }
        if let Some(pos) = self.client_counts.iter().position(|&n| n == 0) {
            return Err(QnError::invalid(format!(
                "client_counts[{pos}] must be positive"
            )));
        }
        Ok(())
    }
}
