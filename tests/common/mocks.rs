//! Mock services for testing
//!
//! Provides an in-process signing service that issues real (self-signed)
//! certificates and records every call it receives, in order.

use async_trait::async_trait;
use chrono::TimeDelta;
use rcgen::{CertificateParams, KeyPair, SanType, SerialNumber};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use time::OffsetDateTime;

use leafcert_reconciler::models::{AuthorityRef, SignedChain, SigningOptions, Thumbprint};
use leafcert_reconciler::services::{Clock, SigningService};
use leafcert_reconciler::{CertError, CertResult};

use super::fixtures::FixedClock;

/// One call received by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningCall {
    Sign {
        authority: AuthorityRef,
        options: SigningOptions,
    },
    Revoke {
        authority: AuthorityRef,
        thumbprint: String,
    },
}

impl SigningCall {
    pub fn is_sign(&self) -> bool {
        matches!(self, SigningCall::Sign { .. })
    }

    pub fn is_revoke(&self) -> bool {
        matches!(self, SigningCall::Revoke { .. })
    }
}

/// Types of errors the mock can simulate
#[derive(Debug, Clone)]
pub enum MockError {
    /// Sign calls fail
    SignFailure(String),
    /// Revoke calls fail
    RevokeFailure(String),
    /// Sign succeeds with no certificates
    EmptyChain,
}

/// Mock signing service for testing
pub struct MockSigningService {
    clock: Arc<FixedClock>,
    calls: RwLock<Vec<SigningCall>>,
    next_serial: AtomicU64,
    /// Simulate errors when set
    pub error_mode: RwLock<Option<MockError>>,
    /// Hold every call for this long before answering
    pub delay: RwLock<Option<Duration>>,
}

impl MockSigningService {
    /// Create a mock issuing certificates valid from `clock.now()`
    pub fn new(clock: Arc<FixedClock>) -> Self {
        Self {
            clock,
            calls: RwLock::new(Vec::new()),
            next_serial: AtomicU64::new(4096),
            error_mode: RwLock::new(None),
            delay: RwLock::new(None),
        }
    }

    /// Set error mode to simulate failures
    pub fn set_error_mode(&self, error: MockError) {
        *self.error_mode.write().unwrap() = Some(error);
    }

    /// Clear error mode
    pub fn clear_error_mode(&self) {
        *self.error_mode.write().unwrap() = None;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write().unwrap() = Some(delay);
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<SigningCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn sign_calls(&self) -> Vec<SigningOptions> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SigningCall::Sign { options, .. } => Some(options),
                SigningCall::Revoke { .. } => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    async fn pause(&self) {
        let delay = *self.delay.read().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn error(&self) -> Option<MockError> {
        self.error_mode.read().unwrap().clone()
    }

    fn issue(&self, options: &SigningOptions) -> Vec<u8> {
        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst);
        let not_before = self.clock.now();
        let not_after = not_before + TimeDelta::from_std(options.duration).unwrap();

        let mut params = CertificateParams::new(options.dns_names.clone()).unwrap();
        for ip in &options.ip_addresses {
            params.subject_alt_names.push(SanType::IpAddress(*ip));
        }
        params.not_before = OffsetDateTime::from_unix_timestamp(not_before.timestamp()).unwrap();
        params.not_after = OffsetDateTime::from_unix_timestamp(not_after.timestamp()).unwrap();
        params.serial_number = Some(SerialNumber::from_slice(&serial.to_be_bytes()[6..]));

        let key = KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().der().to_vec()
    }

    fn issuer() -> Vec<u8> {
        let key = KeyPair::generate().unwrap();
        let params = CertificateParams::new(vec!["issuing-ca.example.test".to_string()]).unwrap();
        params.self_signed(&key).unwrap().der().to_vec()
    }
}

#[async_trait]
impl SigningService for MockSigningService {
    async fn sign(
        &self,
        authority: &AuthorityRef,
        _csr_der: &[u8],
        options: &SigningOptions,
    ) -> CertResult<SignedChain> {
        self.calls.write().unwrap().push(SigningCall::Sign {
            authority: *authority,
            options: options.clone(),
        });
        self.pause().await;

        match self.error() {
            Some(MockError::SignFailure(msg)) => Err(CertError::Signing(msg)),
            Some(MockError::EmptyChain) => Ok(SignedChain {
                certificates: vec![],
            }),
            _ => Ok(SignedChain {
                certificates: vec![self.issue(options), Self::issuer()],
            }),
        }
    }

    async fn revoke(&self, authority: &AuthorityRef, thumbprint: &Thumbprint) -> CertResult<()> {
        self.calls.write().unwrap().push(SigningCall::Revoke {
            authority: *authority,
            thumbprint: thumbprint.to_hex(),
        });
        self.pause().await;

        match self.error() {
            Some(MockError::RevokeFailure(msg)) => Err(CertError::Revocation(msg)),
            _ => Ok(()),
        }
    }
}
