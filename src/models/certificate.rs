//! Issued certificate records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::desired::DesiredConfig;
use crate::utils::error::{CertError, CertResult};

/// Length of a SHA-1 certificate thumbprint in bytes
pub const THUMBPRINT_LEN: usize = 20;

/// SHA-1 digest of a certificate's DER encoding
///
/// The revocation key for an issued certificate.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Thumbprint([u8; THUMBPRINT_LEN]);

impl Thumbprint {
    pub fn from_bytes(bytes: [u8; THUMBPRINT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; THUMBPRINT_LEN] {
        &self.0
    }

    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Thumbprint {
    type Err = CertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| {
            CertError::Validation(format!(
                "Error retrieving certificate thumbprint: thumbprint {:?}: {}",
                s, e
            ))
        })?;
        let bytes: [u8; THUMBPRINT_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            CertError::Validation(format!(
                "Error retrieving certificate thumbprint: thumbprint {:?}: expected {} bytes, got {}",
                s,
                THUMBPRINT_LEN,
                b.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Thumbprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Thumbprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thumbprint({})", self.to_hex())
    }
}

/// Persisted identity of an issued certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    /// Certificate data in PEM format
    pub cert_pem: String,
    /// SHA-1 of the raw certificate, lowercase hex
    pub cert_thumbprint_hex: String,
    /// Serial number assigned by the authority, decimal
    pub cert_serial_number: String,
    /// True when expired or inside the early renewal period
    pub ready_for_renewal: bool,
    /// Validity start, RFC3339
    pub validity_not_before: String,
    /// Validity end, RFC3339
    pub validity_not_after: String,
}

impl CertificateRecord {
    /// Thumbprint decoded for revocation
    pub fn thumbprint(&self) -> CertResult<Thumbprint> {
        self.cert_thumbprint_hex.parse()
    }

    /// Validity end as stored
    pub fn not_after(&self) -> CertResult<DateTime<Utc>> {
        parse_timestamp("expiration", &self.validity_not_after)
    }

    /// Validity start as stored
    pub fn not_before(&self) -> CertResult<DateTime<Utc>> {
        parse_timestamp("start", &self.validity_not_before)
    }
}

fn parse_timestamp(what: &str, value: &str) -> CertResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            CertError::CorruptedState(format!(
                "Invalid certificate {} time stamp: {:?}: {}",
                what, value, e
            ))
        })
}

/// Applied configuration together with the certificate it produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedCertificate {
    pub config: DesiredConfig,
    pub certificate: CertificateRecord,
}
