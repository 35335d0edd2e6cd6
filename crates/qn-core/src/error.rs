use thiserror::Error;

pub type QnResult<T> = Result<T, QnError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QnError {
    #[error("Invalid parameter: {what}")]
    InvalidParameter { what: String },

    #[error("Non-finite numeric value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },
}

impl QnError {
    pub fn invalid(what: impl Into<String>) -> Self {
        QnError::InvalidParameter { what: what.into() }
    }
}
