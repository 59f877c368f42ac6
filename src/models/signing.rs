//! Signing service request models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::models::desired::{ExtendedKeyUsage, KeyUsage};

/// Authority and template a sign or revoke call is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorityRef {
    pub authority_id: Uuid,
    pub template_id: Uuid,
}

impl fmt::Display for AuthorityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.authority_id, self.template_id)
    }
}

/// Validated options for one sign call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningOptions {
    /// Identifies the caller to the signing service
    pub source_tag: String,
    /// Requested certificate lifetime
    pub duration: Duration,
    pub key_usages: Vec<KeyUsage>,
    pub extended_key_usages: Vec<ExtendedKeyUsage>,
    /// Subject override; `None` keeps the service default
    pub subject_name: Option<String>,
    pub dns_names: Vec<String>,
    pub email_addresses: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub uris: Vec<Url>,
}

/// Everything needed to issue a certificate for one desired configuration
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub authority: AuthorityRef,
    /// DER bytes of the certificate signing request
    pub csr_der: Vec<u8>,
    pub options: SigningOptions,
    /// Parsed early renewal period, never longer than `options.duration`
    pub early_renewal: Duration,
}

/// Certificate chain returned by the signing service, leaf first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedChain {
    pub certificates: Vec<Vec<u8>>,
}

impl SignedChain {
    pub fn leaf(&self) -> Option<&[u8]> {
        self.certificates.first().map(Vec::as_slice)
    }
}
