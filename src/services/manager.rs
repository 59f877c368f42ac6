//! Certificate manager
//!
//! Ties the reconciler to a state store: loads the recorded state for an
//! identity, reconciles it, and records the outcome. State is only written
//! after a reconciliation succeeds, so a failed call leaves the previous
//! record exactly as it was.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::db::StateStore;
use crate::models::{DesiredConfig, Diagnostic, ManagedCertificate};
use crate::services::reconciler::{Outcome, Reconciler};
use crate::services::signing::OperationContext;
use crate::utils::error::{CertError, CertResult};

pub struct CertificateManager {
    reconciler: Reconciler,
    store: Arc<dyn StateStore>,
}

impl CertificateManager {
    pub fn new(reconciler: Reconciler, store: Arc<dyn StateStore>) -> Self {
        Self { reconciler, store }
    }

    /// Recorded state for `id`
    pub async fn get(&self, id: &str) -> CertResult<Option<ManagedCertificate>> {
        self.store.load(id).await
    }

    /// Identities under management
    pub async fn list(&self) -> CertResult<Vec<String>> {
        self.store.list().await
    }

    /// Bring `id` to the desired configuration, creating it if unknown
    #[instrument(skip(self, ctx, desired))]
    pub async fn apply(
        &self,
        ctx: &OperationContext,
        id: &str,
        desired: DesiredConfig,
    ) -> CertResult<Outcome> {
        let outcome = match self.store.load(id).await? {
            Some(prior) => self.reconciler.update(ctx, desired, prior).await?,
            None => self.reconciler.create(ctx, desired).await?,
        };

        self.store.save(id, &outcome.state).await?;
        info!(action = ?outcome.action, "Recorded certificate state");
        Ok(outcome)
    }

    /// Recompute renewal readiness for `id`, renewing when due
    #[instrument(skip(self, ctx))]
    pub async fn refresh(&self, ctx: &OperationContext, id: &str) -> CertResult<Outcome> {
        let prior = self
            .store
            .load(id)
            .await?
            .ok_or_else(|| CertError::NotFound(format!("No managed certificate named {:?}", id)))?;

        let outcome = self.reconciler.refresh(ctx, prior).await?;
        self.store.save(id, &outcome.state).await?;
        Ok(outcome)
    }

    /// Revoke and forget `id`
    #[instrument(skip(self, ctx))]
    pub async fn destroy(&self, ctx: &OperationContext, id: &str) -> CertResult<Vec<Diagnostic>> {
        let prior = self
            .store
            .load(id)
            .await?
            .ok_or_else(|| CertError::NotFound(format!("No managed certificate named {:?}", id)))?;

        let diagnostics = self.reconciler.delete(ctx, &prior).await?;
        self.store.remove(id).await?;
        Ok(diagnostics)
    }
}
