//! Error types for the analysis layer.

use qn_core::QnError;
use qn_ctmc::CtmcError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid parameter: {what}")]
    InvalidParameter { what: String },

    #[error("Computation failed for {clients} clients: {what}")]
    ComputationFailure { clients: usize, what: String },

    #[error("Insufficient data for {what}: {len} samples")]
    InsufficientData { what: &'static str, len: usize },
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

impl AnalysisError {
    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        AnalysisError::InvalidParameter { what: what.into() }
    }

    /// Attach the client population to a chain error.
    pub fn from_ctmc(e: CtmcError, clients: usize) -> Self {
        match e {
            CtmcError::InvalidParameter { what } => AnalysisError::InvalidParameter { what },
            CtmcError::ComputationFailure { what } => {
                AnalysisError::ComputationFailure { clients, what }
            }
        }
    }
}

impl From<QnError> for AnalysisError {
    fn from(e: QnError) -> Self {
        let what = match e {
            QnError::InvalidParameter { what } => what,
            other => other.to_string(),
        };
        AnalysisError::InvalidParameter { what }
    }
}
