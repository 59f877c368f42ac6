//! Data models

mod certificate;
mod desired;
mod diagnostic;
mod signing;

pub use certificate::*;
pub use desired::*;
pub use diagnostic::*;
pub use signing::*;
