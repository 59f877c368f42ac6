//! Signing request builder
//!
//! Turns a [`DesiredConfig`] into the CSR bytes and [`SigningOptions`] handed
//! to the signing service. All validation happens here, before any call to
//! the service is made.

use std::net::IpAddr;
use tracing::{debug, trace};
use url::Url;

use crate::models::{
    AdditionalSans, DesiredConfig, ExtendedKeyUsage, KeyUsage, SignRequest, SigningOptions,
    StructuredSubjectName, SubjectNameOverride,
};
use crate::utils::dn::DistinguishedNameBuilder;
use crate::utils::duration::parse_duration;
use crate::utils::error::{CertError, CertResult};

/// PEM label a certificate signing request must carry
pub const CSR_PEM_LABEL: &str = "CERTIFICATE REQUEST";

/// Additional SANs after per-entry parsing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSans {
    pub dns_names: Vec<String>,
    pub email_addresses: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub uris: Vec<Url>,
}

/// Decode a PEM encoded certificate signing request to DER
pub fn decode_csr(csr_pem: &str) -> CertResult<Vec<u8>> {
    let block = pem::parse(csr_pem).map_err(|e| {
        CertError::Validation(format!(
            "Invalid Certificate Request PEM: no valid PEM block passed as certificate request: {}",
            e
        ))
    })?;

    if block.tag() != CSR_PEM_LABEL {
        return Err(CertError::Validation(format!(
            "Invalid Certificate Request PEM: passed PEM block is not of certificate request type, got {:?}",
            block.tag()
        )));
    }

    Ok(block.into_contents())
}

/// Parse every additional SAN entry independently
///
/// Returns everything that parsed together with one message per entry that
/// did not; a bad entry never hides the entries after it.
pub fn parse_additional_sans(sans: &AdditionalSans) -> (ParsedSans, Vec<String>) {
    let mut parsed = ParsedSans {
        dns_names: sans.dns_names.clone().unwrap_or_default(),
        email_addresses: sans.email_addresses.clone().unwrap_or_default(),
        ..Default::default()
    };
    let mut errors = Vec::new();

    for ip in sans.ip_addresses.iter().flatten() {
        match ip.parse::<IpAddr>() {
            Ok(addr) => parsed.ip_addresses.push(addr),
            Err(_) => errors.push(format!("Invalid IP string: {:?}", ip)),
        }
    }

    for uri in sans.uris.iter().flatten() {
        match Url::parse(uri) {
            Ok(url) => parsed.uris.push(url),
            Err(e) => errors.push(format!("Invalid URI string: {:?}: {}", uri, e)),
        }
    }

    (parsed, errors)
}

fn structured_subject(name: &StructuredSubjectName) -> String {
    DistinguishedNameBuilder::new()
        .common_name(name.common_name.as_deref())
        .country(&name.country)
        .organization(&name.organization)
        .organizational_unit(&name.organizational_unit)
        .locality(&name.locality)
        .province(&name.province)
        .street_address(&name.street_address)
        .postal_code(&name.postal_code)
        .build()
}

fn subject_name(subject: &SubjectNameOverride) -> Option<String> {
    let name = match subject {
        SubjectNameOverride::Unset => return None,
        SubjectNameOverride::Structural(s) => structured_subject(s),
        SubjectNameOverride::Literal(l) => l.clone(),
    };
    Some(name).filter(|n| !n.is_empty())
}

/// Build the signing options for a desired configuration
pub fn build_signing_options(
    config: &DesiredConfig,
    source_tag: &str,
) -> CertResult<SigningOptions> {
    let duration = parse_duration(&config.validity_period)?;

    let (sans, errors) = match &config.additional_sans {
        Some(sans) => parse_additional_sans(sans),
        None => (ParsedSans::default(), Vec::new()),
    };
    if !errors.is_empty() {
        debug!(count = errors.len(), "Rejected subject alternative names");
        return Err(CertError::ValidationErrors(errors));
    }

    Ok(SigningOptions {
        source_tag: source_tag.to_string(),
        duration,
        key_usages: config.key_usages.clone().unwrap_or_else(KeyUsage::defaults),
        extended_key_usages: config
            .extended_key_usages
            .clone()
            .unwrap_or_else(ExtendedKeyUsage::defaults),
        subject_name: subject_name(&config.subject_name),
        dns_names: sans.dns_names,
        email_addresses: sans.email_addresses,
        ip_addresses: sans.ip_addresses,
        uris: sans.uris,
    })
}

/// Decode, build and cross-check everything a sign call needs
pub fn build_sign_request(config: &DesiredConfig, source_tag: &str) -> CertResult<SignRequest> {
    let csr_der = decode_csr(&config.cert_request_pem)?;
    let options = build_signing_options(config, source_tag)?;

    let early_renewal = parse_duration(config.early_renewal_period_str())?;
    if early_renewal > options.duration {
        return Err(CertError::Validation(
            "Invalid Early Renewal Period: early renewal period greater than certificate duration"
                .to_string(),
        ));
    }

    trace!(authority = %config.authority(), "validated inputs");

    Ok(SignRequest {
        authority: config.authority(),
        csr_der,
        options,
        early_renewal,
    })
}
