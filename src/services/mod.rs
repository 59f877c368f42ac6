//! Business logic services

pub mod manager;
pub mod materializer;
pub mod reconciler;
pub mod renewal;
pub mod revocation;
pub mod sign_request;
pub mod signing;
pub mod signing_client;

pub use manager::CertificateManager;
pub use reconciler::{Action, Outcome, Reconciler, DEFAULT_SOURCE_TAG};
pub use renewal::{ready_for_renewal, Clock, SystemClock};
pub use signing::{OperationContext, SigningService};
pub use signing_client::HttpSigningClient;
