//! Certificate record materialization
//!
//! Derives the persisted identity of an issued certificate from its DER
//! encoding. The serial number and validity bounds are read from the
//! certificate itself and never computed locally.

use chrono::{DateTime, SecondsFormat, Utc};
use pem::{EncodeConfig, LineEnding, Pem};
use sha1::{Digest, Sha1};
use std::time::Duration;
use x509_parser::time::ASN1Time;

use crate::models::{CertificateRecord, Thumbprint};
use crate::services::renewal::ready_for_renewal;
use crate::utils::error::{CertError, CertResult};

/// SHA-1 thumbprint of raw certificate DER
pub fn thumbprint(der: &[u8]) -> Thumbprint {
    Thumbprint::from_bytes(Sha1::digest(der).into())
}

/// PEM `CERTIFICATE` encoding of raw DER
pub fn encode_certificate_pem(der: &[u8]) -> String {
    pem::encode_config(
        &Pem::new("CERTIFICATE", der.to_vec()),
        EncodeConfig::new().set_line_ending(LineEnding::LF),
    )
}

fn to_datetime(time: &ASN1Time) -> CertResult<DateTime<Utc>> {
    DateTime::from_timestamp(time.timestamp(), 0).ok_or_else(|| {
        CertError::Signing(format!("Certificate time stamp out of range: {}", time))
    })
}

fn rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Build the persisted record for a freshly signed certificate
pub fn materialize(
    der: &[u8],
    early_renewal: Duration,
    now: DateTime<Utc>,
) -> CertResult<CertificateRecord> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).map_err(|e| {
        CertError::Signing(format!(
            "Signing service returned an unparsable certificate: {}",
            e
        ))
    })?;

    let validity = cert.validity();
    let not_before = to_datetime(&validity.not_before)?;
    let not_after = to_datetime(&validity.not_after)?;

    Ok(CertificateRecord {
        cert_pem: encode_certificate_pem(der),
        cert_thumbprint_hex: thumbprint(der).to_hex(),
        cert_serial_number: cert.tbs_certificate.serial.to_string(),
        ready_for_renewal: ready_for_renewal(not_after, early_renewal, now),
        validity_not_before: rfc3339(not_before),
        validity_not_after: rfc3339(not_after),
    })
}
