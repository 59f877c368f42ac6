//! Signing service contract and call context

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::models::{AuthorityRef, SignedChain, SigningOptions, Thumbprint};
use crate::utils::error::{CertError, CertResult};

/// External certificate authority able to sign CSRs and revoke certificates
///
/// Implementations report sign failures as [`CertError::Signing`] and revoke
/// failures as [`CertError::Revocation`].
#[async_trait]
pub trait SigningService: Send + Sync {
    /// Sign a DER encoded CSR, returning the issued chain leaf first
    async fn sign(
        &self,
        authority: &AuthorityRef,
        csr_der: &[u8],
        options: &SigningOptions,
    ) -> CertResult<SignedChain>;

    /// Revoke the certificate with the given thumbprint
    async fn revoke(&self, authority: &AuthorityRef, thumbprint: &Thumbprint) -> CertResult<()>;
}

/// Cancellation and deadline shared by every external call of one operation
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    cancel: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the whole operation to `limit` from now
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.deadline = Some((Instant::now() + limit, limit));
        self
    }

    /// Use a caller-owned cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Await an external call, giving up on cancellation or deadline
    pub async fn run<F, T>(&self, call: F) -> CertResult<T>
    where
        F: Future<Output = CertResult<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(CertError::Cancelled);
        }

        let guarded = async {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(CertError::Cancelled),
                result = call => result,
            }
        };

        match self.deadline {
            Some((deadline, limit)) => tokio::time::timeout_at(deadline, guarded)
                .await
                .map_err(|_| CertError::TimedOut(limit))?,
            None => guarded.await,
        }
    }
}
