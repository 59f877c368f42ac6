//! State persistence
//!
//! Managed certificate state is stored per identity: the applied desired
//! configuration and the record of the certificate it produced. Two stores
//! are provided, SQLite for real deployments and an in-memory map.

pub mod memory;
pub mod state_repository;

use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

use crate::config::DatabaseConfig;
use crate::models::ManagedCertificate;
use crate::utils::error::CertResult;

pub use memory::MemoryStateStore;
pub use state_repository::SqliteStateStore;

/// Database connection pool type
pub type DbPool = Pool<Sqlite>;

/// Persistence sink for managed certificate state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the state recorded for `id`, if any
    async fn load(&self, id: &str) -> CertResult<Option<ManagedCertificate>>;

    /// Record `state` for `id`, replacing what was there
    async fn save(&self, id: &str, state: &ManagedCertificate) -> CertResult<()>;

    /// Discard the state for `id`; returns whether anything was removed
    async fn remove(&self, id: &str) -> CertResult<bool>;

    /// Identities with recorded state
    async fn list(&self) -> CertResult<Vec<String>>;
}

/// Initialize the database connection pool
pub async fn init_pool(config: &DatabaseConfig) -> CertResult<DbPool> {
    let options = sqlx::sqlite::SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
