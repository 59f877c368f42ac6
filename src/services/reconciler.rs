//! Leaf certificate reconciliation engine
//!
//! Decides, for one managed certificate, whether the desired configuration
//! calls for issuing, renewing in place, replacing, or revoking, and carries
//! out that decision against the signing service.
//!
//! Calls to the signing service are strictly sequential. Whenever a path both
//! revokes and issues, the revoke is attempted first and its failure is only
//! reported: the new certificate is still requested, and a successful revoke
//! is never undone if issuing then fails.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::models::{
    CertificateRecord, DesiredConfig, Diagnostic, ManagedCertificate, SignRequest,
};
use crate::services::materializer::materialize;
use crate::services::renewal::{ready_for_renewal, Clock, SystemClock};
use crate::services::revocation::{best_effort, RevocationInvoker};
use crate::services::sign_request::build_sign_request;
use crate::services::signing::{OperationContext, SigningService};
use crate::utils::duration::parse_duration;
use crate::utils::error::{CertError, CertResult};

/// Default tag identifying this caller to the signing service
pub const DEFAULT_SOURCE_TAG: &str = "leafcert reconciler";

const REVOKE_FAILED: &str = "Error Revoking Certificate";

/// What a reconciliation did to the managed certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// First certificate issued
    Created,
    /// New certificate issued for the same identity
    Renewed,
    /// Identity changed; old certificate revoked and a new one issued
    Replaced,
    /// Renewal flag recomputed, certificate kept
    Refreshed,
    /// Configuration applied without touching the certificate
    Unchanged,
}

/// Result of a successful reconciliation
#[derive(Debug, Clone)]
pub struct Outcome {
    pub state: ManagedCertificate,
    pub action: Action,
    pub diagnostics: Vec<Diagnostic>,
}

/// Reconciliation engine bound to one signing service
#[derive(Clone)]
pub struct Reconciler {
    service: Arc<dyn SigningService>,
    clock: Arc<dyn Clock>,
    source_tag: String,
}

impl Reconciler {
    pub fn new(service: Arc<dyn SigningService>) -> Self {
        Self {
            service,
            clock: Arc::new(SystemClock),
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_source_tag(mut self, tag: impl Into<String>) -> Self {
        self.source_tag = tag.into();
        self
    }

    fn revoker(&self) -> RevocationInvoker<'_> {
        RevocationInvoker::new(self.service.as_ref())
    }

    /// Sign the request and materialize the resulting record
    async fn issue(
        &self,
        ctx: &OperationContext,
        request: &SignRequest,
    ) -> CertResult<CertificateRecord> {
        let chain = ctx
            .run(
                self.service
                    .sign(&request.authority, &request.csr_der, &request.options),
            )
            .await
            .map_err(|e| match e {
                CertError::Revocation(msg) => CertError::Signing(msg),
                other => other,
            })?;

        let leaf = chain.leaf().ok_or_else(|| {
            CertError::Signing("Signing service returned no certificates".to_string())
        })?;
        let record = materialize(leaf, request.early_renewal, self.clock.now())?;

        trace!(
            authority = %request.authority,
            thumbprint = %record.cert_thumbprint_hex,
            serial = %record.cert_serial_number,
            "signed certificate request"
        );
        Ok(record)
    }

    /// Revoke `previous` (best effort), then issue for `request`
    async fn revoke_then_issue(
        &self,
        ctx: &OperationContext,
        previous: &ManagedCertificate,
        revoke_with: &DesiredConfig,
        request: &SignRequest,
    ) -> CertResult<(CertificateRecord, Vec<Diagnostic>)> {
        let mut diagnostics = Vec::new();

        let revoked = self
            .revoker()
            .revoke(
                ctx,
                &revoke_with.authority(),
                &previous.certificate.cert_thumbprint_hex,
            )
            .await;
        diagnostics.extend(best_effort(revoked, REVOKE_FAILED)?);

        let certificate = self.issue(ctx, request).await?;
        Ok((certificate, diagnostics))
    }

    /// Issue the first certificate for a desired configuration
    pub async fn create(
        &self,
        ctx: &OperationContext,
        desired: DesiredConfig,
    ) -> CertResult<Outcome> {
        let config = desired.resolved();
        let request = build_sign_request(&config, &self.source_tag)?;
        let certificate = self.issue(ctx, &request).await?;

        info!(
            authority = %request.authority,
            serial = %certificate.cert_serial_number,
            action = "create",
            "created a resource"
        );

        Ok(Outcome {
            state: ManagedCertificate {
                config,
                certificate,
            },
            action: Action::Created,
            diagnostics: Vec::new(),
        })
    }

    /// Recompute renewal readiness and renew in place when due
    pub async fn refresh(
        &self,
        ctx: &OperationContext,
        prior: ManagedCertificate,
    ) -> CertResult<Outcome> {
        let not_after = prior.certificate.not_after()?;
        let early_renewal = parse_duration(prior.config.early_renewal_period_str()).map_err(|e| {
            CertError::CorruptedState(format!("Invalid certificate early renewal period: {}", e))
        })?;

        if !ready_for_renewal(not_after, early_renewal, self.clock.now()) {
            let mut state = prior;
            state.certificate.ready_for_renewal = false;
            trace!(serial = %state.certificate.cert_serial_number, "read and updated the resource");
            return Ok(Outcome {
                state,
                action: Action::Refreshed,
                diagnostics: Vec::new(),
            });
        }

        let request = build_sign_request(&prior.config, &self.source_tag)?;
        trace!("fetched existing CSR and sign options");
        let certificate = self.issue(ctx, &request).await?;

        info!(
            authority = %request.authority,
            previous = %prior.certificate.cert_serial_number,
            serial = %certificate.cert_serial_number,
            action = "renew",
            "renewed certificate"
        );

        Ok(Outcome {
            state: ManagedCertificate {
                config: prior.config,
                certificate,
            },
            action: Action::Renewed,
            diagnostics: Vec::new(),
        })
    }

    /// Move a managed certificate from its applied configuration to `desired`
    pub async fn update(
        &self,
        ctx: &OperationContext,
        desired: DesiredConfig,
        prior: ManagedCertificate,
    ) -> CertResult<Outcome> {
        let config = desired.resolved();
        let request = build_sign_request(&config, &self.source_tag)?;

        if config.requires_new_certificate(&prior.config) {
            debug!(
                from = %prior.config.authority(),
                to = %config.authority(),
                "Identity-affecting change, replacing certificate"
            );
            let (certificate, diagnostics) = self
                .revoke_then_issue(ctx, &prior, &prior.config, &request)
                .await?;

            info!(
                authority = %request.authority,
                previous = %prior.certificate.cert_serial_number,
                serial = %certificate.cert_serial_number,
                action = "replace",
                "updated the resource with new certificate"
            );

            return Ok(Outcome {
                state: ManagedCertificate {
                    config,
                    certificate,
                },
                action: Action::Replaced,
                diagnostics,
            });
        }

        let not_after = prior.certificate.not_after()?;
        if ready_for_renewal(not_after, request.early_renewal, self.clock.now()) {
            let (certificate, diagnostics) = self
                .revoke_then_issue(ctx, &prior, &config, &request)
                .await?;

            info!(
                authority = %request.authority,
                previous = %prior.certificate.cert_serial_number,
                serial = %certificate.cert_serial_number,
                action = "renew",
                "renewed certificate"
            );

            return Ok(Outcome {
                state: ManagedCertificate {
                    config,
                    certificate,
                },
                action: Action::Renewed,
                diagnostics,
            });
        }

        let mut certificate = prior.certificate;
        certificate.ready_for_renewal = false;
        trace!(serial = %certificate.cert_serial_number, "updated the resource");

        Ok(Outcome {
            state: ManagedCertificate {
                config,
                certificate,
            },
            action: Action::Unchanged,
            diagnostics: Vec::new(),
        })
    }

    /// Revoke the managed certificate before its record is discarded
    ///
    /// A failed revoke is reported and does not block deletion; a damaged
    /// thumbprint or a cancelled call does.
    pub async fn delete(
        &self,
        ctx: &OperationContext,
        prior: &ManagedCertificate,
    ) -> CertResult<Vec<Diagnostic>> {
        let revoked = self
            .revoker()
            .revoke(
                ctx,
                &prior.config.authority(),
                &prior.certificate.cert_thumbprint_hex,
            )
            .await;
        let diagnostics: Vec<Diagnostic> = best_effort(revoked, REVOKE_FAILED)?.into_iter().collect();

        info!(
            authority = %prior.config.authority(),
            serial = %prior.certificate.cert_serial_number,
            action = "delete",
            revoked = diagnostics.is_empty(),
            "deleted the resource"
        );
        Ok(diagnostics)
    }
}
