//! Revocation invoker
//!
//! Revocation is keyed by the persisted thumbprint. A thumbprint that does not
//! decode to exactly 20 bytes means the stored record is damaged, so it fails
//! the call outright; a failure reported by the signing service is returned as
//! [`CertError::Revocation`] and left to the caller to degrade.

use tracing::{debug, warn};

use crate::models::{AuthorityRef, Diagnostic, Thumbprint};
use crate::services::signing::{OperationContext, SigningService};
use crate::utils::error::{CertError, CertResult};

/// Issues revoke calls against a signing service
pub struct RevocationInvoker<'a> {
    service: &'a dyn SigningService,
}

impl<'a> RevocationInvoker<'a> {
    pub fn new(service: &'a dyn SigningService) -> Self {
        Self { service }
    }

    /// Revoke the certificate identified by a hex encoded thumbprint
    pub async fn revoke(
        &self,
        ctx: &OperationContext,
        authority: &AuthorityRef,
        thumbprint_hex: &str,
    ) -> CertResult<()> {
        let thumbprint: Thumbprint = thumbprint_hex.parse()?;
        debug!(%authority, %thumbprint, "Revoking certificate");

        ctx.run(self.service.revoke(authority, &thumbprint))
            .await
            .map_err(|e| match e {
                CertError::Signing(msg) => CertError::Revocation(msg),
                other => other,
            })
    }
}

/// Run a step whose non-fatal failure should only be reported
///
/// Fatal errors still propagate; a non-fatal one becomes a warning diagnostic
/// so the caller can carry on with its next step.
pub fn best_effort(result: CertResult<()>, summary: &str) -> CertResult<Option<Diagnostic>> {
    match result {
        Ok(()) => Ok(None),
        Err(e) if !e.is_fatal() => {
            warn!(error = %e, "{}", summary);
            Ok(Some(Diagnostic::from_non_fatal(summary, &e)))
        }
        Err(e) => Err(e),
    }
}
