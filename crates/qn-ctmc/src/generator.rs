//! Generator (rate) matrix of a closed M/M/c network.
//!
//! State `i` counts the clients at the service facility (queued or in
//! service); the remaining `N - i` clients are thinking. Only neighbouring
//! states are connected:
//! - arrival `i -> i+1` at rate `(N - i) λ`
//! - departure `i -> i-1` at rate `min(i, c) μ`

use nalgebra::DMatrix;
use qn_core::ensure_positive;

use crate::error::{CtmcError, CtmcResult};

/// Validated CTMC generator for `N` clients and `c` servers.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorMatrix {
    clients: usize,
    servers: usize,
    q: DMatrix<f64>,
}

impl GeneratorMatrix {
    /// Build the `(N+1) x (N+1)` generator.
    ///
    /// The diagonal is the negated sum of the other entries of its row, so
    /// every row sums to zero up to rounding of that single sum.
    pub fn build(
        clients: usize,
        arrival_rate: f64,
        service_rate: f64,
        servers: usize,
    ) -> CtmcResult<Self> {
        ensure_positive(arrival_rate, "arrival_rate")?;
        ensure_positive(service_rate, "service_rate")?;
        if servers == 0 {
            return Err(CtmcError::invalid("number_of_servers must be at least 1"));
        }

        let dim = clients + 1;
        let mut q = DMatrix::zeros(dim, dim);

        for i in 0..dim {
            if i < clients {
                q[(i, i + 1)] = (clients - i) as f64 * arrival_rate;
            }
            if i > 0 {
                q[(i, i - 1)] = i.min(servers) as f64 * service_rate;
            }
            let off_diagonal: f64 = q
                .row(i)
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, rate)| rate)
                .sum();
            q[(i, i)] = -off_diagonal;
        }

        Ok(Self {
            clients,
            servers,
            q,
        })
    }

    /// Client population N.
    pub fn clients(&self) -> usize {
        self.clients
    }

    /// Server count c.
    pub fn servers(&self) -> usize {
        self.servers
    }

    /// Number of states, N + 1.
    pub fn dim(&self) -> usize {
        self.q.nrows()
    }

    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.q
    }

    /// Transition rate from state `i` to state `j` (diagonal included).
    pub fn rate(&self, i: usize, j: usize) -> f64 {
        self.q[(i, j)]
    }

    pub fn row_sum(&self, i: usize) -> f64 {
        self.q.row(i).sum()
    }

    /// Total rate of leaving state `i`.
    pub fn exit_rate(&self, i: usize) -> f64 {
        -self.q[(i, i)]
    }
}
