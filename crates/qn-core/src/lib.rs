//! qn-core: shared foundation for the closed-queue analysis crates.
//!
//! Contains:
//! - numeric (Real + tolerances + float helpers)
//! - config (system configuration + eager validation)
//! - error (shared error types)

pub mod config;
pub mod error;
pub mod numeric;

pub use config::SystemConfiguration;
pub use error::{QnError, QnResult};
pub use numeric::*;
