//! Utility functions and helpers

pub mod dn;
pub mod duration;
pub mod error;

pub use duration::parse_duration;
pub use error::{CertError, CertResult};
