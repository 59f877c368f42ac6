//! Leafcert Reconciler Library
//!
//! Declarative lifecycle management for X.509 leaf certificates issued by an
//! external signing service. A desired configuration is reconciled against
//! the recorded state: certificates are issued, renewed ahead of expiry,
//! replaced when their identity changes, and revoked when removed.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod telemetry;
pub mod utils;

pub use config::AppConfig;
pub use db::{DbPool, StateStore};
pub use services::{CertificateManager, OperationContext, Reconciler, SigningService};
pub use utils::error::{CertError, CertResult};
