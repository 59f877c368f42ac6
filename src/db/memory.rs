//! In-memory state store

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::db::StateStore;
use crate::models::ManagedCertificate;
use crate::utils::error::CertResult;

/// State store backed by a map, lost on drop
#[derive(Default)]
pub struct MemoryStateStore {
    entries: RwLock<BTreeMap<String, ManagedCertificate>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, id: &str) -> CertResult<Option<ManagedCertificate>> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn save(&self, id: &str, state: &ManagedCertificate) -> CertResult<()> {
        self.entries
            .write()
            .await
            .insert(id.to_string(), state.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> CertResult<bool> {
        Ok(self.entries.write().await.remove(id).is_some())
    }

    async fn list(&self) -> CertResult<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
