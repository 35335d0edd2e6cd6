//! Error types for chain construction and transient integration.

use qn_core::QnError;
use thiserror::Error;

/// Errors raised while building or integrating a chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CtmcError {
    #[error("Invalid parameter: {what}")]
    InvalidParameter { what: String },

    #[error("Computation failed: {what}")]
    ComputationFailure { what: String },
}

pub type CtmcResult<T> = Result<T, CtmcError>;

impl CtmcError {
    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        CtmcError::InvalidParameter { what: what.into() }
    }

    pub(crate) fn failure(what: impl Into<String>) -> Self {
        CtmcError::ComputationFailure { what: what.into() }
    }
}

impl From<QnError> for CtmcError {
    fn from(e: QnError) -> Self {
        let what = match e {
            QnError::InvalidParameter { what } => what,
            other => other.to_string(),
        };
        CtmcError::InvalidParameter { what }
    }
}
